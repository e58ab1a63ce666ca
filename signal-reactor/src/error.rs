//! Error types for signal-reactor.

use crate::bus::SubscriptionHandle;
use crate::config::ConfigError;
use crate::reactor::ReactorState;

use thiserror::Error;

/// Boxed error returned by application handlers and scheduled actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// All errors that can arise from the reactor and its collaborators.
///
/// A watchdog timeout is deliberately absent: it is reported through
/// [`Reactor::timed_out`](crate::Reactor::timed_out), not as a failure.
#[derive(Debug, Error)]
pub enum Error {
    /// `react_to` (or a transport subscription) was given an empty signal name.
    #[error("signal name must not be empty")]
    EmptySignalName,

    /// A lifecycle operation was called in a state that does not allow it.
    #[error("cannot {operation} a reactor in state {state}")]
    InvalidState {
        operation: &'static str,
        state: ReactorState,
    },

    /// The transport was asked to release a handle it does not know.
    #[error("unknown subscription {0}")]
    UnknownSubscription(SubscriptionHandle),

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// An application signal handler returned an error.
    #[error("handler for signal {signal} failed: {source}")]
    Handler {
        signal: String,
        #[source]
        source: BoxError,
    },

    /// A signal arrived while its handler was still running.
    #[error("re-entrant delivery of signal {signal}")]
    ReentrantDispatch { signal: String },

    /// A scheduled action returned an error.
    #[error("scheduled action failed: {0}")]
    Callback(#[source] BoxError),

    /// `run_blocking` was called on a loop that is already running.
    #[error("main loop is already running")]
    LoopAlreadyRunning,

    /// The main loop's command channel is gone.
    #[error("main loop is closed")]
    LoopClosed,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
