//! # signal-reactor
//!
//! **signal-reactor** waits for asynchronous notifications from a remote
//! service. You subscribe to the signals you care about, hand the reactor
//! one action that sets the remote work in motion, and block until a
//! handler decides the work is done, or until the service has been silent
//! for longer than a watchdog allows.
//!
//! The crate offers:
//!
//! - A **[`Reactor`]** state machine (`Idle → Running → Terminated`) with
//!   exactly-once teardown of subscriptions and timers
//! - An **inactivity watchdog** that every delivered signal pushes back by
//!   its full interval
//! - **Explicit handler tables**: one closure per signal name plus an
//!   optional catch-all
//! - Two collaborator traits, [`Transport`] and [`Scheduler`], with
//!   in-process implementations ([`LocalBus`], [`MainLoop`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use signal_reactor::{LocalBus, MainLoop, Reactor, Signal};
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let main_loop = Rc::new(MainLoop::new());
//! let bus = LocalBus::new(&main_loop);
//! let remote = bus.remote();
//!
//! let reactor = Reactor::new(bus, main_loop);
//! reactor.react_to("Done")?;
//! reactor.on("Done", |reactor, _signal| Ok(reactor.quit()?));
//!
//! reactor.run(
//!     Some(Box::new(move || {
//!         std::thread::spawn(move || remote.emit(Signal::new("Done", "/job/1")));
//!         Ok(())
//!     })),
//!     Some(Duration::from_secs(5)),
//! )?;
//! assert!(!reactor.timed_out());
//! ```
//!
//! ## Threading
//!
//! Everything the reactor does happens on the thread that calls
//! [`Reactor::run`]. Handlers run to completion one at a time; a slow
//! handler delays every other signal and the watchdog itself. Other
//! threads talk to the loop only through [`LoopHandle`] and [`BusRemote`].
//!
//! ## Modules
//!
//! - [`bus`]: The transport trait and the in-process bus
//! - [`main_loop`]: The scheduler trait and the in-process loop
//! - [`config`]: TOML configuration
//! - [`signal`]: Signals and match rules

mod reactor;
mod utils;

pub mod bus;
pub mod config;
pub mod error;
pub mod main_loop;
pub mod signal;

pub use bus::{BusRemote, LocalBus, SignalCallback, SubscriptionHandle, Transport};
pub use config::{ConfigError, ReactorConfig};
pub use error::{BoxError, Error};
pub use main_loop::{Callback, LoopHandle, MainLoop, Scheduler, Source, SourceId};
pub use reactor::{
    DEFAULT_KICKOFF_DELAY_MS, DEFAULT_TIMEOUT, HandlerResult, Kickoff, Reactor, ReactorState,
};
pub use signal::{MatchRule, Signal};

pub use serde_json::Value;
