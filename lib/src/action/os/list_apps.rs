// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use ledger_dmk_apdu::os::{AppEntry, ListApps as ListAppsCommand};

use super::GoToDashboard;
use crate::{
    action::{
        machine::{
            finish, not_invoked, run_sub, Cancelled, Context, MachineContext, Observer,
            StateMachine, Terminal, Transition,
        },
        map_refused, Interaction, UserInteractionRequired,
    },
    api::InternalApi,
    Error,
};

/// Entries per full page, a full page may be followed by more entries
pub const LIST_APPS_PAGE_LEN: usize = 2;

/// List installed applications from the dashboard
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ListApps {
    pub unlock_timeout: Option<Duration>,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
    GoToDashboard,
    ListApps,
    ListAppsCheck,
    ListAppsContinue,
    Success,
    Error,
}

#[derive(Debug, Default)]
pub struct Internal {
    installed_apps: Vec<AppEntry>,
    last_page_len: usize,
    error: Option<Error>,
}

impl ListApps {
    pub fn new(unlock_timeout: Option<Duration>) -> Self {
        Self { unlock_timeout }
    }
}

#[async_trait]
impl StateMachine for ListApps {
    type Output = Vec<AppEntry>;
    type Intermediate = Interaction;
    type Internal = Internal;
    type State = State;

    fn name(&self) -> &'static str {
        "ListApps"
    }

    fn initial(&self, _api: &InternalApi) -> (State, MachineContext<Self>) {
        (State::GoToDashboard, Context::default())
    }

    fn enter(&self, state: State, ctx: &mut MachineContext<Self>) -> Transition<State> {
        let i = &ctx.internal;

        match state {
            State::ListApps => {
                ctx.intermediate.required_user_interaction = UserInteractionRequired::AllowListApps;
                Transition::Invoke
            }
            State::ListAppsCheck if i.error.is_some() => Transition::Goto(State::Error),
            State::ListAppsCheck if i.last_page_len == LIST_APPS_PAGE_LEN => {
                Transition::Goto(State::ListAppsContinue)
            }
            State::ListAppsCheck => Transition::Goto(State::Success),
            State::GoToDashboard | State::ListAppsContinue => Transition::Invoke,
            State::Success => Transition::Success,
            State::Error => Transition::Error,
        }
    }

    async fn invoke(
        &self,
        state: State,
        ctx: &mut MachineContext<Self>,
        api: &InternalApi,
        observer: &mut Observer<'_, Interaction>,
    ) -> Result<State, Cancelled> {
        let next = match state {
            State::GoToDashboard => {
                let sub = GoToDashboard::new(self.unlock_timeout);
                match run_sub(&sub, api, observer, &mut ctx.intermediate, |p, s| *p = *s).await? {
                    Ok(_) => State::ListApps,
                    Err(e) => {
                        ctx.internal.error = Some(e);
                        State::Error
                    }
                }
            }
            State::ListApps | State::ListAppsContinue => {
                let is_continue = state == State::ListAppsContinue;

                let r = match is_continue {
                    true => api.send_command(&ListAppsCommand::new(true)).await,
                    false => api.send_user_command(&ListAppsCommand::new(false)).await,
                };

                ctx.intermediate.required_user_interaction = UserInteractionRequired::None;

                match r {
                    Ok(mut page) => {
                        debug!("Listed {} applications", page.len());

                        ctx.internal.last_page_len = page.len();
                        ctx.internal.installed_apps.append(&mut page);
                    }
                    Err(e) => ctx.internal.error = Some(map_refused(e)),
                }
                State::ListAppsCheck
            }
            _ => {
                ctx.internal.error = Some(not_invoked(self.name(), state));
                State::Error
            }
        };

        Ok(next)
    }

    fn output(&self, ctx: MachineContext<Self>, terminal: Terminal) -> Result<Vec<AppEntry>, Error> {
        let out = match terminal {
            Terminal::Success => Some(ctx.internal.installed_apps),
            Terminal::Error => None,
        };

        finish(self.name(), terminal, out, ctx.internal.error)
    }
}
