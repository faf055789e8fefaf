// Copyright (c) 2022-2023 The MobileCoin Foundation

use core::fmt::Debug;

use async_trait::async_trait;

use ledger_dmk_apdu::Command;

use super::OpenApp;
use crate::{
    action::{
        machine::{
            finish, not_invoked, run_sub, Cancelled, Context, MachineContext, Observer,
            StateMachine, Terminal, Transition,
        },
        map_refused, UserInteractionRequired,
    },
    api::InternalApi,
    Error,
};

/// Unit of work run within an application
#[async_trait]
pub trait AppTask: Send + Sync {
    type Output: Debug + Send + 'static;

    async fn run(&self, api: &InternalApi) -> Result<Self::Output, Error>;
}

/// Task sending a single command
#[derive(Clone, PartialEq, Debug)]
pub struct CommandTask<C> {
    pub command: C,
    /// Command awaits user input, using the user interaction timeout
    pub awaits_user: bool,
}

#[async_trait]
impl<C> AppTask for CommandTask<C>
where
    C: Command,
    C::Response: Debug,
{
    type Output = C::Response;

    async fn run(&self, api: &InternalApi) -> Result<C::Response, Error> {
        let r = match self.awaits_user {
            true => api.send_user_command(&self.command).await,
            false => api.send_command(&self.command).await,
        };
        r.map_err(map_refused)
    }
}

/// Step reported while running [CallTaskInApp]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CallTaskStep {
    OpenApp,
    CallTask,
}

/// Intermediate value for [CallTaskInApp]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct CallTaskIntermediate {
    pub required_user_interaction: UserInteractionRequired,
    pub step: Option<CallTaskStep>,
}

/// Open an application then run a task within it
#[derive(Clone, PartialEq, Debug)]
pub struct CallTaskInApp<T> {
    pub app_name: String,
    pub task: T,
    /// Interaction reported while the task runs
    pub required_user_interaction: UserInteractionRequired,
    /// Skip opening the application, for callers that know it is running
    pub skip_open_app: bool,
}

impl<T: AppTask> CallTaskInApp<T> {
    pub fn new(
        app_name: impl Into<String>,
        task: T,
        required_user_interaction: UserInteractionRequired,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            task,
            required_user_interaction,
            skip_open_app: false,
        }
    }

    pub fn skip_open_app(mut self, skip: bool) -> Self {
        self.skip_open_app = skip;
        self
    }
}

/// Open an application then send a single command
pub type SendCommandInApp<C> = CallTaskInApp<CommandTask<C>>;

impl<C> SendCommandInApp<C>
where
    C: Command,
    C::Response: Debug,
{
    pub fn command(
        app_name: impl Into<String>,
        command: C,
        required_user_interaction: UserInteractionRequired,
    ) -> Self {
        let task = CommandTask {
            command,
            awaits_user: required_user_interaction != UserInteractionRequired::None,
        };
        Self::new(app_name, task, required_user_interaction)
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
    OpenAppCheck,
    OpenApp,
    CallTask,
    Success,
    Error,
}

#[derive(Debug)]
pub struct Internal<O> {
    output: Option<O>,
    error: Option<Error>,
}

#[async_trait]
impl<T: AppTask> StateMachine for CallTaskInApp<T> {
    type Output = T::Output;
    type Intermediate = CallTaskIntermediate;
    type Internal = Internal<T::Output>;
    type State = State;

    fn name(&self) -> &'static str {
        "CallTaskInApp"
    }

    fn initial(&self, _api: &InternalApi) -> (State, MachineContext<Self>) {
        let internal = Internal {
            output: None,
            error: None,
        };

        (
            State::OpenAppCheck,
            Context::new(CallTaskIntermediate::default(), internal),
        )
    }

    fn enter(&self, state: State, ctx: &mut MachineContext<Self>) -> Transition<State> {
        match state {
            State::OpenAppCheck if self.skip_open_app => Transition::Goto(State::CallTask),
            State::OpenAppCheck => Transition::Goto(State::OpenApp),
            State::OpenApp => {
                ctx.intermediate.step = Some(CallTaskStep::OpenApp);
                Transition::Invoke
            }
            State::CallTask => {
                ctx.intermediate.step = Some(CallTaskStep::CallTask);
                ctx.intermediate.required_user_interaction = self.required_user_interaction;
                Transition::Invoke
            }
            State::Success => Transition::Success,
            State::Error => Transition::Error,
        }
    }

    async fn invoke(
        &self,
        state: State,
        ctx: &mut MachineContext<Self>,
        api: &InternalApi,
        observer: &mut Observer<'_, CallTaskIntermediate>,
    ) -> Result<State, Cancelled> {
        let r = match state {
            State::OpenApp => {
                let sub = OpenApp::new(&self.app_name);
                run_sub(&sub, api, observer, &mut ctx.intermediate, |p, s| {
                    p.required_user_interaction = s.required_user_interaction
                })
                .await?
                .map(|_| State::CallTask)
            }
            State::CallTask => {
                let r = self.task.run(api).await;

                ctx.intermediate.required_user_interaction = UserInteractionRequired::None;

                r.map(|o| {
                    ctx.internal.output = Some(o);
                    State::Success
                })
            }
            _ => Err(not_invoked(self.name(), state)),
        };

        match r {
            Ok(s) => Ok(s),
            Err(e) => {
                ctx.internal.error = Some(e);
                Ok(State::Error)
            }
        }
    }

    fn output(&self, ctx: MachineContext<Self>, terminal: Terminal) -> Result<T::Output, Error> {
        finish(self.name(), terminal, ctx.internal.output, ctx.internal.error)
    }
}
