//! Out-of-band completion of an exchange.
//!
//! A handler may suspend the default finalize-on-return behavior with
//! [`crate::Exchange::start_async`], then later resume the exchange from
//! any task through the returned [`AsyncHandle`]. The state token is a
//! single atomic so that a `complete()` racing the original handler's
//! return resolves deterministically: the serve loop always performs the
//! one finalize, resumption requests travel to it over a channel minted
//! per cycle. The handle holds the cycle's only sender, so dropping it
//! unspent closes the channel and the serve loop finalizes instead of
//! waiting forever.

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use crate::error::AsyncError;

/// Lifecycle of one async cycle on an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncState {
    /// No async cycle outstanding: handler return finalizes the response
    None,
    /// `start_async` was called; handler return leaves the exchange open
    Started,
    /// The handler chain will be re-entered with the same output state
    Dispatched,
    /// The exchange will be finalized as if the handler chain returned
    Completed,
}

const STATE_NONE: u8 = 0;
const STATE_STARTED: u8 = 1;
const STATE_DISPATCHED: u8 = 2;
const STATE_COMPLETED: u8 = 3;

fn decode(state: u8) -> AsyncState {
    match state {
        STATE_STARTED => AsyncState::Started,
        STATE_DISPATCHED => AsyncState::Dispatched,
        STATE_COMPLETED => AsyncState::Completed,
        _ => AsyncState::None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AsyncEvent {
    Dispatch,
    Complete,
}

/// The serve-loop side of one cycle's channel. `recv` yielding `None`
/// means every handle for the cycle was dropped unspent.
pub(crate) type AsyncEvents = mpsc::UnboundedReceiver<AsyncEvent>;

/// What the serve loop should do once the handler has returned cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Finalize,
    Suspend,
}

/// The exchange-side half of the lifecycle: owns the state token and
/// mints [`AsyncHandle`]s against it.
pub(crate) struct AsyncGate {
    state: Arc<AtomicU8>,
    events: Option<AsyncEvents>,
}

impl AsyncGate {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(STATE_NONE)),
            events: None,
        }
    }

    /// At most one cycle may be outstanding per exchange. Each cycle gets
    /// a fresh channel; the minted handle holds its only sender.
    pub(crate) fn start(&mut self) -> Result<AsyncHandle, AsyncError> {
        match self.state.compare_exchange(
            STATE_NONE,
            STATE_STARTED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.events = Some(rx);
                Ok(AsyncHandle {
                    state: self.state.clone(),
                    tx,
                })
            }
            Err(actual) => Err(AsyncError::CycleOutstanding {
                actual: decode(actual),
            }),
        }
    }

    /// Exactly one of {the returning handler path, the resuming task}
    /// finalizes: anything other than `None` here means a cycle was
    /// started and the serve loop must wait for its event instead.
    pub(crate) fn verdict_on_return(&self) -> Verdict {
        match self.state.load(Ordering::SeqCst) {
            STATE_NONE => Verdict::Finalize,
            _ => Verdict::Suspend,
        }
    }

    /// A dispatched cycle is spent once the handler chain is re-entered;
    /// the second pass may start a fresh one.
    pub(crate) fn rearm(&self) {
        self.state.store(STATE_NONE, Ordering::SeqCst);
    }

    /// The receiver for the cycle minted by the last [`start`](Self::start).
    pub(crate) fn take_events(&mut self) -> Option<AsyncEvents> {
        self.events.take()
    }
}

/// Resumes a suspended exchange from anywhere. Obtained from
/// [`crate::Exchange::start_async`]; spent by [`dispatch`](Self::dispatch)
/// or [`complete`](Self::complete). Dropping it unspent abandons the
/// cycle and the exchange finalizes as if the handler chain had returned.
#[derive(Debug)]
pub struct AsyncHandle {
    state: Arc<AtomicU8>,
    tx: mpsc::UnboundedSender<AsyncEvent>,
}

impl AsyncHandle {
    /// Re-invoke the handler chain from its entry point with the same
    /// response state. The re-entered pass observes
    /// [`crate::Exchange::was_dispatched`] and is responsible for not
    /// starting another cycle unboundedly.
    pub fn dispatch(self) -> Result<(), AsyncError> {
        self.transition(STATE_DISPATCHED, AsyncEvent::Dispatch, "dispatch")
    }

    /// Finalize the response now, exactly as if the handler chain had
    /// returned with no cycle outstanding.
    pub fn complete(self) -> Result<(), AsyncError> {
        self.transition(STATE_COMPLETED, AsyncEvent::Complete, "complete")
    }

    fn transition(self, to: u8, event: AsyncEvent, op: &'static str) -> Result<(), AsyncError> {
        self.state
            .compare_exchange(STATE_STARTED, to, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|actual| AsyncError::NotStarted {
                op,
                actual: decode(actual),
            })?;
        self.tx
            .send(event)
            .map_err(|_| AsyncError::ExchangeGone { op })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_dispatch_rearm_start_complete() {
        let mut gate = AsyncGate::new();
        assert_eq!(gate.verdict_on_return(), Verdict::Finalize);

        let handle = gate.start().unwrap();
        let mut rx = gate.take_events().unwrap();
        assert_eq!(gate.verdict_on_return(), Verdict::Suspend);
        handle.dispatch().unwrap();
        assert_eq!(rx.try_recv().unwrap(), AsyncEvent::Dispatch);

        // still suspended until the serve loop rearms for the second pass
        assert_eq!(gate.verdict_on_return(), Verdict::Suspend);
        gate.rearm();
        assert_eq!(gate.verdict_on_return(), Verdict::Finalize);

        let handle = gate.start().unwrap();
        let mut rx = gate.take_events().unwrap();
        handle.complete().unwrap();
        assert_eq!(rx.try_recv().unwrap(), AsyncEvent::Complete);
    }

    #[test]
    fn dropped_handle_closes_the_cycle_channel() {
        let mut gate = AsyncGate::new();
        let handle = gate.start().unwrap();
        let mut rx = gate.take_events().unwrap();
        assert_eq!(gate.verdict_on_return(), Verdict::Suspend);

        drop(handle);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn second_start_while_outstanding_is_refused() {
        let mut gate = AsyncGate::new();
        let _handle = gate.start().unwrap();

        let err = gate.start().unwrap_err();
        assert!(matches!(
            err,
            AsyncError::CycleOutstanding {
                actual: AsyncState::Started
            }
        ));
    }

    #[test]
    fn complete_after_complete_is_refused() {
        let mut gate = AsyncGate::new();
        let first = gate.start().unwrap();
        let second = AsyncHandle {
            state: first.state.clone(),
            tx: first.tx.clone(),
        };
        first.complete().unwrap();

        let err = second.complete().unwrap_err();
        assert!(matches!(
            err,
            AsyncError::NotStarted {
                op: "complete",
                actual: AsyncState::Completed
            }
        ));
    }

    #[test]
    fn start_after_complete_is_refused() {
        let mut gate = AsyncGate::new();
        let handle = gate.start().unwrap();
        handle.complete().unwrap();

        let err = gate.start().unwrap_err();
        assert!(matches!(
            err,
            AsyncError::CycleOutstanding {
                actual: AsyncState::Completed
            }
        ));
    }
}
