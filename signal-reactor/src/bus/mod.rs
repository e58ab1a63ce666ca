//! The transport collaborator and an in-process signal bus.
//!
//! A [`Transport`] delivers signals matching a [`MatchRule`] to a callback
//! until the subscription is released. The reactor only ever talks to this
//! trait; [`LocalBus`] is the implementation used by the tests and the demo
//! binary, and a template for adapters over a real message bus.

mod local;

pub use local::{BusRemote, LocalBus};

use crate::error::Error;
use crate::signal::{MatchRule, Signal};

use std::fmt;
use std::rc::Rc;

/// Callback invoked by a transport for every matching signal.
pub type SignalCallback = Rc<dyn Fn(&Signal) -> Result<(), Error>>;

/// Opaque handle identifying one subscription on a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription#{:#x}", self.0)
    }
}

/// Delivers signals from a remote service.
pub trait Transport {
    /// Registers interest in signals matching `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySignalName`] for a rule without a signal name,
    /// or any transport-specific registration failure.
    fn subscribe(&self, rule: &MatchRule, callback: SignalCallback)
    -> Result<SubscriptionHandle, Error>;

    /// Releases a subscription; its callback is never invoked again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSubscription`] if the handle is not (or no
    /// longer) registered.
    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), Error>;
}
