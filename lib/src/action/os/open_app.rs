// Copyright (c) 2022-2023 The MobileCoin Foundation

use async_trait::async_trait;
use log::debug;

use ledger_dmk_apdu::os::{CloseApp, GetAppAndVersion, OpenApp as OpenAppCommand};

use super::dashboard_app;
use crate::{
    action::{
        machine::{
            finish, not_invoked, Cancelled, Context, MachineContext, Observer, StateMachine,
            Terminal, Transition,
        },
        map_refused, Interaction, UserInteractionRequired,
    },
    api::InternalApi,
    session::DeviceStatus,
    Error,
};

/// Open an application by name, closing any other running application
#[derive(Clone, PartialEq, Debug)]
pub struct OpenApp {
    pub app_name: String,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
    OnboardingCheck,
    LockingCheck,
    GetAppAndVersion,
    ApplicationCheck,
    CloseApp,
    OpenApplication,
    Success,
    Error,
}

#[derive(Debug)]
pub struct Internal {
    onboarded: bool,
    locked: bool,
    current_app: Option<String>,
    opened: bool,
    error: Option<Error>,
}

impl OpenApp {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

#[async_trait]
impl StateMachine for OpenApp {
    type Output = ();
    type Intermediate = Interaction;
    type Internal = Internal;
    type State = State;

    fn name(&self) -> &'static str {
        "OpenApp"
    }

    fn initial(&self, api: &InternalApi) -> (State, MachineContext<Self>) {
        let s = api.state();

        let internal = Internal {
            onboarded: s.is_onboarded(),
            locked: s.status == DeviceStatus::Locked,
            current_app: None,
            opened: false,
            error: None,
        };

        (
            State::OnboardingCheck,
            Context::new(Interaction::default(), internal),
        )
    }

    fn enter(&self, state: State, ctx: &mut MachineContext<Self>) -> Transition<State> {
        let i = &mut ctx.internal;

        match state {
            State::OnboardingCheck if !i.onboarded => {
                i.error = Some(Error::DeviceNotOnboarded);
                Transition::Goto(State::Error)
            }
            State::OnboardingCheck => Transition::Goto(State::LockingCheck),
            State::LockingCheck if i.locked => {
                i.error = Some(Error::DeviceLocked);
                Transition::Goto(State::Error)
            }
            State::LockingCheck => Transition::Goto(State::GetAppAndVersion),
            State::ApplicationCheck if i.error.is_some() => Transition::Goto(State::Error),
            State::ApplicationCheck => match i.current_app.as_deref() {
                Some(a) if a == self.app_name => Transition::Goto(State::Success),
                Some(_) if i.opened => {
                    i.error = Some(Error::InvalidState(format!(
                        "Application {} did not open",
                        self.app_name
                    )));
                    Transition::Goto(State::Error)
                }
                Some(a) if a == ledger_dmk_apdu::DASHBOARD_APP_NAME => {
                    Transition::Goto(State::OpenApplication)
                }
                _ => Transition::Goto(State::CloseApp),
            },
            State::OpenApplication => {
                ctx.intermediate.required_user_interaction = UserInteractionRequired::ConfirmOpenApp;
                Transition::Invoke
            }
            State::GetAppAndVersion | State::CloseApp => Transition::Invoke,
            State::Success => Transition::Success,
            State::Error => Transition::Error,
        }
    }

    async fn invoke(
        &self,
        state: State,
        ctx: &mut MachineContext<Self>,
        api: &InternalApi,
        _observer: &mut Observer<'_, Interaction>,
    ) -> Result<State, Cancelled> {
        let next = match state {
            State::GetAppAndVersion => {
                match api.send_command(&GetAppAndVersion).await {
                    Ok(app) => {
                        ctx.internal.current_app = Some(app.name.clone());
                        api.update_state(|s| s.current_app = Some(app));
                    }
                    Err(e) => ctx.internal.error = Some(e),
                }
                State::ApplicationCheck
            }
            State::CloseApp => match api.send_command(&CloseApp).await {
                Ok(_) => {
                    api.update_state(|s| s.current_app = Some(dashboard_app()));
                    State::OpenApplication
                }
                Err(e) => {
                    ctx.internal.error = Some(e);
                    State::Error
                }
            },
            State::OpenApplication => {
                debug!("Opening {}", self.app_name);

                let r = api
                    .send_user_command(&OpenAppCommand::new(&self.app_name))
                    .await;

                ctx.intermediate.required_user_interaction = UserInteractionRequired::None;

                match r {
                    Ok(_) => {
                        ctx.internal.opened = true;
                        State::GetAppAndVersion
                    }
                    Err(e) => {
                        ctx.internal.error = Some(map_refused(e));
                        State::Error
                    }
                }
            }
            _ => {
                ctx.internal.error = Some(not_invoked(self.name(), state));
                State::Error
            }
        };

        Ok(next)
    }

    fn output(&self, ctx: MachineContext<Self>, terminal: Terminal) -> Result<(), Error> {
        let out = match terminal {
            Terminal::Success => Some(()),
            Terminal::Error => None,
        };

        finish(self.name(), terminal, out, ctx.internal.error)
    }
}
