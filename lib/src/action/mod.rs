// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device actions
//!
//! Device actions are multi-step device interactions (opening an application,
//! installing dependencies, running a task within an application) built on
//! the [machine] runtime. Actions are started with [execute], returning an
//! [ActionHandle] that streams [DeviceActionState] values until exactly one
//! terminal state is reached.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use log::debug;
use strum::{Display, EnumString};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{api::InternalApi, Error};

pub mod machine;
use machine::{run, Cancelled, Observer, StateMachine};

pub mod os;

/// Interaction the user must perform on the device for the action to proceed
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Display, EnumString)]
pub enum UserInteractionRequired {
    #[default]
    None,
    UnlockDevice,
    AllowListApps,
    ConfirmOpenApp,
    AllowSecureConnection,
    SignTransaction,
    VerifyAddress,
    SignPersonalMessage,
    SignTypedData,
}

/// Basic intermediate value, reporting only the required interaction
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Interaction {
    pub required_user_interaction: UserInteractionRequired,
}

impl Interaction {
    pub fn new(required_user_interaction: UserInteractionRequired) -> Self {
        Self {
            required_user_interaction,
        }
    }
}

/// State reported by a running action
#[derive(Debug)]
pub enum DeviceActionState<O, V> {
    /// Action running, with the current intermediate value
    Pending(V),
    /// Action completed successfully
    Completed(O),
    /// Action failed
    Error(Error),
}

impl<O, V> DeviceActionState<O, V> {
    pub fn is_pending(&self) -> bool {
        matches!(self, DeviceActionState::Pending(_))
    }
}

/// Map a refusal status word to [Error::RefusedByUser]
pub(crate) fn map_refused(e: Error) -> Error {
    match &e {
        Error::Command(c) if c.is_refused() => Error::RefusedByUser,
        _ => e,
    }
}

/// Handle to a running action
///
/// Dropping the handle (or calling [ActionHandle::cancel]) stops the action
/// once any in-flight command settles, no further commands are sent.
#[derive(Debug)]
pub struct ActionHandle<O, V> {
    rx: mpsc::UnboundedReceiver<DeviceActionState<O, V>>,
    task: JoinHandle<()>,
}

impl<O, V> ActionHandle<O, V> {
    /// Await the next state, returning `None` once the action has finished
    pub async fn next_state(&mut self) -> Option<DeviceActionState<O, V>> {
        self.rx.recv().await
    }

    /// Await the terminal state, discarding intermediate values
    pub async fn result(mut self) -> Result<O, Error> {
        while let Some(s) = self.rx.recv().await {
            match s {
                DeviceActionState::Pending(_) => continue,
                DeviceActionState::Completed(o) => return Ok(o),
                DeviceActionState::Error(e) => return Err(e),
            }
        }

        Err(Error::Unknown("Action ended without a final state".to_string()))
    }

    /// Stop observing the action
    pub fn cancel(self) {
        drop(self.rx);
    }

    /// Check whether the action task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

// No pinned fields, the receiver is polled in place
impl<O, V> Unpin for ActionHandle<O, V> {}

impl<O, V> Stream for ActionHandle<O, V> {
    type Item = DeviceActionState<O, V>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Start an action, returning a handle streaming its states
pub fn execute<M>(machine: M, api: InternalApi) -> ActionHandle<M::Output, M::Intermediate>
where
    M: StateMachine + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        let name = machine.name();

        let mut f =
            |v: &M::Intermediate| tx.send(DeviceActionState::Pending(v.clone())).is_ok();
        let r = run(&machine, &api, &mut Observer::new(&mut f)).await;

        let s = match r {
            Ok(Ok(o)) => DeviceActionState::Completed(o),
            Ok(Err(e)) => DeviceActionState::Error(e),
            Err(Cancelled) => {
                debug!("{}: cancelled", name);
                return;
            }
        };

        if tx.send(s).is_err() {
            debug!("{}: finished with no observer", name);
        }
    });

    ActionHandle { rx, task }
}
