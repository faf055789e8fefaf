// Copyright (c) 2022-2023 The MobileCoin Foundation

//! State machine runtime for device actions
//!
//! A device action is a graph of states over a [Context] holding the
//! intermediate value (reported to callers) and an internal accumulator.
//! Entering a state either moves synchronously to another state, invokes
//! one asynchronous unit of work, or terminates the action.
//!
//! The intermediate value is reported once before each invocation (and may be
//! reported again by long running invocations), and sub-actions report through their parent so progress from nested actions
//! is forwarded in order. Once an observer declines a report the action is
//! cancelled and no further states are scheduled.

use core::fmt::Debug;

use async_trait::async_trait;
use log::{debug, trace, warn};

use crate::{api::InternalApi, Error};

/// Maximum synchronous transitions between invocations, exceeding this
/// indicates a transition loop
const MAX_TRANSITIONS: usize = 64;

/// Result of entering a state
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Transition<S> {
    /// Move immediately to another state
    Goto(S),
    /// Invoke the work attached to the current state
    Invoke,
    /// Terminate successfully
    Success,
    /// Terminate with the recorded error
    Error,
}

/// Terminal state reached by an action
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Terminal {
    Success,
    Error,
}

/// Action context, threaded through every state
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Context<V, I> {
    /// Value reported to callers
    pub intermediate: V,
    /// Private accumulator
    pub internal: I,
}

impl<V, I> Context<V, I> {
    pub fn new(intermediate: V, internal: I) -> Self {
        Self {
            intermediate,
            internal,
        }
    }
}

/// Context type for a given state machine
pub type MachineContext<M> =
    Context<<M as StateMachine>::Intermediate, <M as StateMachine>::Internal>;

/// Observer stopped accepting states
#[derive(Copy, Clone, PartialEq, Eq, Debug, thiserror::Error)]
#[error("Action cancelled")]
pub struct Cancelled;

/// Receives intermediate values, returning `false` to cancel the action
pub struct Observer<'a, V> {
    f: &'a mut (dyn FnMut(&V) -> bool + Send + 'a),
}

impl<'a, V> Observer<'a, V> {
    pub fn new(f: &'a mut (dyn FnMut(&V) -> bool + Send + 'a)) -> Self {
        Self { f }
    }

    /// Report an intermediate value
    pub fn notify(&mut self, v: &V) -> Result<(), Cancelled> {
        match (self.f)(v) {
            true => Ok(()),
            false => Err(Cancelled),
        }
    }
}

/// Device action state machine
#[async_trait]
pub trait StateMachine: Send + Sync + Sized {
    /// Value produced on success
    type Output: Debug + Send + 'static;
    /// Progress value reported while running
    type Intermediate: Clone + Debug + Send + 'static;
    /// Private accumulator
    type Internal: Debug + Send + 'static;
    /// State identifiers
    type State: Copy + Debug + PartialEq + Send + Sync + 'static;

    /// Action name, used for logging
    fn name(&self) -> &'static str;

    /// Initial state and context, snapshotting any required session state
    fn initial(&self, api: &InternalApi) -> (Self::State, MachineContext<Self>);

    /// Enter a state, applying entry actions and evaluating guards
    fn enter(&self, state: Self::State, ctx: &mut MachineContext<Self>)
        -> Transition<Self::State>;

    /// Run the work attached to an invoked state, returning the next state
    async fn invoke(
        &self,
        state: Self::State,
        ctx: &mut MachineContext<Self>,
        api: &InternalApi,
        observer: &mut Observer<'_, Self::Intermediate>,
    ) -> Result<Self::State, Cancelled>;

    /// Resolve the action output once a terminal state is reached
    fn output(&self, ctx: MachineContext<Self>, terminal: Terminal)
        -> Result<Self::Output, Error>;
}

/// Resolve an action output from the values recorded in its context
///
/// A terminal state with neither an output nor an error recorded is a defect
/// in the action and resolves to [Error::Unknown].
pub fn finish<O>(
    name: &str,
    terminal: Terminal,
    output: Option<O>,
    error: Option<Error>,
) -> Result<O, Error> {
    match (terminal, output, error) {
        (Terminal::Success, Some(o), _) => Ok(o),
        (_, _, Some(e)) => Err(e),
        (t, _, _) => {
            warn!("{}: no output or error in final state ({:?})", name, t);
            Err(Error::Unknown("No error in final state".to_string()))
        }
    }
}

/// Error for invoking a state with no attached work
pub fn not_invoked<S: Debug>(name: &str, state: S) -> Error {
    warn!("{}: {:?} has no attached work", name, state);
    Error::Unknown(format!("Invalid invocation of {state:?} in {name}"))
}

/// Run a state machine to completion
///
/// Returns the action result, or [Cancelled] if the observer stopped
/// accepting states.
pub async fn run<M: StateMachine>(
    machine: &M,
    api: &InternalApi,
    observer: &mut Observer<'_, M::Intermediate>,
) -> Result<Result<M::Output, Error>, Cancelled> {
    let name = machine.name();
    let (mut state, mut ctx) = machine.initial(api);

    debug!("{}: start ({:?})", name, state);

    loop {
        let mut transitions = 0;

        let terminal = loop {
            match machine.enter(state, &mut ctx) {
                Transition::Goto(s) => {
                    trace!("{}: {:?} -> {:?}", name, state, s);
                    state = s;
                }
                Transition::Invoke => break None,
                Transition::Success => break Some(Terminal::Success),
                Transition::Error => break Some(Terminal::Error),
            }

            transitions += 1;
            if transitions > MAX_TRANSITIONS {
                warn!("{}: transition loop at {:?}", name, state);
                return Ok(Err(Error::Unknown(format!(
                    "Transition loop in {name} at {state:?}"
                ))));
            }
        };

        if let Some(t) = terminal {
            debug!("{}: {:?}", name, t);
            return Ok(machine.output(ctx, t));
        }

        observer.notify(&ctx.intermediate)?;

        debug!("{}: {:?}", name, state);

        state = machine.invoke(state, &mut ctx, api, observer).await?;
    }
}

/// Run a sub-action, merging each of its intermediate values into the parent's
/// and forwarding the result to the parent observer
pub async fn run_sub<S, V, F>(
    sub: &S,
    api: &InternalApi,
    observer: &mut Observer<'_, V>,
    parent: &mut V,
    merge: F,
) -> Result<Result<S::Output, Error>, Cancelled>
where
    S: StateMachine,
    V: Send,
    F: Fn(&mut V, &S::Intermediate) + Send + Sync,
{
    let mut f = |v: &S::Intermediate| {
        merge(parent, v);
        observer.notify(parent).is_ok()
    };

    run(sub, api, &mut Observer::new(&mut f)).await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        session::DeviceSession,
        transport::{Transport, TransportError},
    };
    use ledger_dmk_apdu::DeviceModelId;

    struct NoTransport;

    #[async_trait]
    impl Transport for NoTransport {
        async fn exchange(&mut self, _frame: &[u8]) -> Result<Vec<u8>, TransportError> {
            Err(TransportError::msg("no device"))
        }
    }

    fn api() -> InternalApi {
        InternalApi::new(DeviceSession::new(NoTransport, DeviceModelId::NanoX))
    }

    /// Counts to a target, failing at an optional step
    struct Counter {
        target: u32,
        fail_at: Option<u32>,
        skip: bool,
    }

    #[derive(Copy, Clone, PartialEq, Debug)]
    enum CounterState {
        Check,
        Step,
        Done,
        Failed,
    }

    #[derive(Debug, Default)]
    struct CounterInternal {
        error: Option<Error>,
    }

    #[async_trait]
    impl StateMachine for Counter {
        type Output = u32;
        type Intermediate = u32;
        type Internal = CounterInternal;
        type State = CounterState;

        fn name(&self) -> &'static str {
            "Counter"
        }

        fn initial(&self, _api: &InternalApi) -> (Self::State, MachineContext<Self>) {
            (CounterState::Check, Context::default())
        }

        fn enter(
            &self,
            state: Self::State,
            ctx: &mut MachineContext<Self>,
        ) -> Transition<Self::State> {
            match state {
                CounterState::Check if self.skip => Transition::Goto(CounterState::Done),
                CounterState::Check if ctx.internal.error.is_some() => {
                    Transition::Goto(CounterState::Failed)
                }
                CounterState::Check if ctx.intermediate >= self.target => {
                    Transition::Goto(CounterState::Done)
                }
                CounterState::Check => Transition::Goto(CounterState::Step),
                CounterState::Step => Transition::Invoke,
                CounterState::Done => Transition::Success,
                CounterState::Failed => Transition::Error,
            }
        }

        async fn invoke(
            &self,
            _state: Self::State,
            ctx: &mut MachineContext<Self>,
            _api: &InternalApi,
            _observer: &mut Observer<'_, Self::Intermediate>,
        ) -> Result<Self::State, Cancelled> {
            match self.fail_at {
                Some(n) if n == ctx.intermediate => {
                    ctx.internal.error = Some(Error::InvalidState(format!("step {n}")))
                }
                _ => ctx.intermediate += 1,
            }
            Ok(CounterState::Check)
        }

        fn output(
            &self,
            ctx: MachineContext<Self>,
            terminal: Terminal,
        ) -> Result<Self::Output, Error> {
            let out = match terminal {
                Terminal::Success => Some(ctx.intermediate),
                Terminal::Error => None,
            };
            finish(self.name(), terminal, out, ctx.internal.error)
        }
    }

    /// Wraps a counter as a sub-action, doubling each reported value
    struct Doubler(Counter);

    #[async_trait]
    impl StateMachine for Doubler {
        type Output = u32;
        type Intermediate = u32;
        type Internal = Option<Result<u32, Error>>;
        type State = CounterState;

        fn name(&self) -> &'static str {
            "Doubler"
        }

        fn initial(&self, _api: &InternalApi) -> (Self::State, MachineContext<Self>) {
            (CounterState::Step, Context::default())
        }

        fn enter(
            &self,
            state: Self::State,
            ctx: &mut MachineContext<Self>,
        ) -> Transition<Self::State> {
            match (state, &ctx.internal) {
                (CounterState::Step, None) => Transition::Invoke,
                (_, Some(Ok(_))) => Transition::Success,
                _ => Transition::Error,
            }
        }

        async fn invoke(
            &self,
            _state: Self::State,
            ctx: &mut MachineContext<Self>,
            api: &InternalApi,
            observer: &mut Observer<'_, Self::Intermediate>,
        ) -> Result<Self::State, Cancelled> {
            let r = run_sub(&self.0, api, observer, &mut ctx.intermediate, |p, v| {
                *p = v * 2
            })
            .await?;

            ctx.internal = Some(r);
            Ok(CounterState::Check)
        }

        fn output(
            &self,
            ctx: MachineContext<Self>,
            terminal: Terminal,
        ) -> Result<Self::Output, Error> {
            match ctx.internal {
                Some(Ok(v)) => finish(self.name(), terminal, Some(v), None),
                Some(Err(e)) => finish(self.name(), terminal, None, Some(e)),
                None => finish(self.name(), terminal, None, None),
            }
        }
    }

    async fn collect<M: StateMachine>(
        m: &M,
    ) -> (Vec<M::Intermediate>, Result<Result<M::Output, Error>, Cancelled>) {
        let mut states = vec![];
        let mut f = |v: &M::Intermediate| {
            states.push(v.clone());
            true
        };
        let r = run(m, &api(), &mut Observer::new(&mut f)).await;
        (states, r)
    }

    #[tokio::test]
    async fn runs_to_completion() {
        let (states, r) = collect(&Counter {
            target: 3,
            fail_at: None,
            skip: false,
        })
        .await;

        assert_eq!(states, vec![0, 1, 2]);
        assert!(matches!(r, Ok(Ok(3))));
    }

    #[tokio::test]
    async fn failing_first_step() {
        let (states, r) = collect(&Counter {
            target: 3,
            fail_at: Some(0),
            skip: false,
        })
        .await;

        assert_eq!(states, vec![0]);
        assert!(matches!(r, Ok(Err(Error::InvalidState(_)))));
    }

    #[tokio::test]
    async fn guard_skips_steps() {
        let (states, r) = collect(&Counter {
            target: 3,
            fail_at: None,
            skip: true,
        })
        .await;

        assert!(states.is_empty());
        assert!(matches!(r, Ok(Ok(0))));
    }

    #[tokio::test]
    async fn sub_action_forwards_states() {
        let (states, r) = collect(&Doubler(Counter {
            target: 3,
            fail_at: None,
            skip: false,
        }))
        .await;

        // Parent entry, then each sub-action state merged
        assert_eq!(states, vec![0, 0, 2, 4]);
        assert!(matches!(r, Ok(Ok(3))));

        let (_, r) = collect(&Doubler(Counter {
            target: 3,
            fail_at: Some(1),
            skip: false,
        }))
        .await;
        assert!(matches!(r, Ok(Err(Error::InvalidState(m))) if m == "step 1"));
    }

    #[tokio::test]
    async fn observer_cancels() {
        let m = Doubler(Counter {
            target: 10,
            fail_at: None,
            skip: false,
        });

        let mut n = 0;
        let mut f = |_v: &u32| {
            n += 1;
            n < 3
        };
        let r = run(&m, &api(), &mut Observer::new(&mut f)).await;

        assert_eq!(r.unwrap_err(), Cancelled);
        assert_eq!(n, 3);
    }

    #[tokio::test]
    async fn missing_output_is_a_defect() {
        let r = finish::<()>("Test", Terminal::Error, None, None);
        assert!(matches!(r, Err(Error::Unknown(m)) if m == "No error in final state"));

        let r = finish::<()>("Test", Terminal::Success, None, None);
        assert!(matches!(r, Err(Error::Unknown(_))));
    }
}
