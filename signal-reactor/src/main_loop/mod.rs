//! The scheduler collaborator and its in-process implementation.
//!
//! The reactor never blocks or keeps time on its own. It relies on a
//! [`Scheduler`] to:
//! - run one-shot callbacks after a delay,
//! - cancel callbacks that have not fired yet,
//! - block the calling thread until told to stop.
//!
//! [`MainLoop`] is a single-threaded implementation of that contract.
//! Everything it dispatches runs on the thread that called
//! [`run_blocking`](Scheduler::run_blocking), one callback at a time.
//! Other threads reach it only through a [`LoopHandle`].

mod command;
mod core;
mod timer;

pub use self::core::{LoopHandle, MainLoop, Source};

use crate::error::Error;

use std::fmt;
use std::time::Duration;

/// A one-shot callback run by the scheduler.
///
/// Returning an error stops the loop; the error comes back out of
/// [`Scheduler::run_blocking`].
pub type Callback = Box<dyn FnOnce() -> Result<(), Error>>;

/// Identifies a pending timeout so it can be removed before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// The event loop a [`Reactor`](crate::Reactor) delegates its waiting to.
///
/// All methods take `&self`: callbacks run by the scheduler routinely call
/// back into it (to add or remove timeouts, or to stop it).
pub trait Scheduler {
    /// Dispatches callbacks until [`stop`](Self::stop) is called.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by a dispatched callback, or
    /// [`Error::LoopAlreadyRunning`] if the loop is already inside this call.
    fn run_blocking(&self) -> Result<(), Error>;

    /// Makes the current `run_blocking` call return once the callback
    /// being dispatched completes.
    fn stop(&self);

    /// Runs `callback` once, `after` from now.
    fn add_timeout(&self, after: Duration, callback: Callback) -> SourceId;

    /// Runs `callback` once, `millis` milliseconds from now.
    fn add_delay(&self, millis: u64, callback: Callback) -> SourceId {
        self.add_timeout(Duration::from_millis(millis), callback)
    }

    /// Cancels a pending callback.
    ///
    /// Returns `false` if the source already fired or was already removed.
    fn remove(&self, source: SourceId) -> bool;
}
