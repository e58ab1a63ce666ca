//! Reactor core.
//!
//! This module implements the reactor state machine. The reactor is
//! responsible for:
//! - registering interest in signals on a transport,
//! - routing delivered signals to handlers,
//! - keeping an inactivity watchdog armed while it waits,
//! - tearing everything down exactly once when the run ends.
//!
//! It owns no thread and no clock: waiting and timekeeping are delegated
//! to a [`Scheduler`](crate::Scheduler), delivery to a
//! [`Transport`](crate::Transport).

mod core;
mod dispatch;
mod registry;
mod watchdog;

pub use self::core::{DEFAULT_KICKOFF_DELAY_MS, DEFAULT_TIMEOUT, Kickoff, Reactor, ReactorState};
pub use dispatch::HandlerResult;
