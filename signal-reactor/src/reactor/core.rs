use super::dispatch::{HandlerResult, HandlerTable};
use super::registry::SubscriptionRegistry;
use super::watchdog::{ExpiryFn, Watchdog};
use crate::bus::{SignalCallback, Transport};
use crate::config::ReactorConfig;
use crate::error::{BoxError, Error};
use crate::main_loop::Scheduler;
use crate::signal::{MatchRule, Signal};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Default watchdog interval.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default delay before the kickoff action given to [`Reactor::run`].
pub const DEFAULT_KICKOFF_DELAY_MS: u64 = 50;

/// The action [`Reactor::run`] schedules before it starts waiting.
pub type Kickoff = Box<dyn FnOnce() -> Result<(), BoxError>>;

/// Lifecycle of a reactor.
///
/// A reactor goes through `Idle → Running → Terminated` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorState {
    /// Created; `run` has not been called yet.
    Idle,
    /// Inside `run`, before `quit`.
    Running,
    /// `quit` has completed. Absorbing.
    Terminated,
}

impl fmt::Display for ReactorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReactorState::Idle => "idle",
            ReactorState::Running => "running",
            ReactorState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Waits for signals from a remote service under an inactivity watchdog.
///
/// A `Reactor` is a cheap, cloneable handle; handlers receive it so they
/// can [`quit`](Self::quit), boost the watchdog, or subscribe to more
/// signals. It is `!Send`: everything runs on the scheduler's thread.
///
/// # Examples
///
/// ```rust,ignore
/// let main_loop = Rc::new(MainLoop::new());
/// let bus = LocalBus::new(&main_loop);
/// let reactor = Reactor::new(bus.clone(), main_loop.clone());
///
/// reactor.react_to("Done")?;
/// reactor.on("Done", |reactor, signal| {
///     println!("finished with {:?}", signal.payload);
///     reactor.quit()?;
///     Ok(())
/// });
///
/// reactor.run(Some(Box::new(start_remote_job)), Some(Duration::from_secs(300)))?;
/// if reactor.timed_out() {
///     eprintln!("service never answered");
/// }
/// ```
#[derive(Clone)]
pub struct Reactor {
    pub(super) inner: Rc<Inner>,
}

pub(super) struct Inner {
    transport: Rc<dyn Transport>,
    scheduler: Rc<dyn Scheduler>,

    state: Cell<ReactorState>,

    /// Configured watchdog interval, used when `run` gets no override.
    timeout: Cell<Duration>,

    /// Interval of the run in progress; cleared by `quit`.
    active_timeout: Cell<Option<Duration>>,

    timed_out: Cell<bool>,
    kickoff_delay_ms: Cell<u64>,

    pub(super) watchdog: Watchdog,
    pub(super) handlers: RefCell<HandlerTable>,
    subscriptions: RefCell<SubscriptionRegistry>,
}

impl Reactor {
    /// Creates an idle reactor bound to its collaborators.
    pub fn new(transport: Rc<dyn Transport>, scheduler: Rc<dyn Scheduler>) -> Self {
        let watchdog = Watchdog::new(scheduler.clone());

        Self {
            inner: Rc::new(Inner {
                transport,
                scheduler,
                state: Cell::new(ReactorState::Idle),
                timeout: Cell::new(DEFAULT_TIMEOUT),
                active_timeout: Cell::new(None),
                timed_out: Cell::new(false),
                kickoff_delay_ms: Cell::new(DEFAULT_KICKOFF_DELAY_MS),
                watchdog,
                handlers: RefCell::new(HandlerTable::default()),
                subscriptions: RefCell::new(SubscriptionRegistry::default()),
            }),
        }
    }

    /// Creates a reactor from `config` and subscribes to its rules.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or a subscription is rejected
    /// by the transport.
    pub fn with_config(
        transport: Rc<dyn Transport>,
        scheduler: Rc<dyn Scheduler>,
        config: &ReactorConfig,
    ) -> Result<Self, Error> {
        config.validate()?;

        let reactor = Self::new(transport, scheduler);
        reactor.set_timeout(config.timeout());
        reactor.inner.kickoff_delay_ms.set(config.kickoff_delay_ms);

        for rule in &config.subscriptions {
            reactor.react_to(rule.clone())?;
        }

        Ok(reactor)
    }

    /// Registers the handler for signals named `signal`.
    ///
    /// Replaces any handler previously registered for that name.
    pub fn on<F>(&self, signal: impl Into<String>, handler: F) -> &Self
    where
        F: FnMut(&Reactor, &Signal) -> HandlerResult + 'static,
    {
        self.inner
            .handlers
            .borrow_mut()
            .insert(signal.into(), Rc::new(RefCell::new(handler)));
        self
    }

    /// Registers the handler for signals that have no handler of their own.
    pub fn on_default<F>(&self, handler: F) -> &Self
    where
        F: FnMut(&Reactor, &Signal) -> HandlerResult + 'static,
    {
        self.inner
            .handlers
            .borrow_mut()
            .set_default(Rc::new(RefCell::new(handler)));
        self
    }

    /// Subscribes to signals matching `rule`.
    ///
    /// Matching signals are routed to the handler registered for their
    /// name. Registering the same rule twice yields two independent
    /// subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySignalName`] for an empty name,
    /// [`Error::InvalidState`] after the reactor has terminated, or the
    /// transport's own registration error.
    pub fn react_to(&self, rule: impl Into<MatchRule>) -> Result<(), Error> {
        let rule = rule.into();

        if rule.signal.is_empty() {
            return Err(Error::EmptySignalName);
        }

        let state = self.state();
        if state == ReactorState::Terminated {
            return Err(Error::InvalidState {
                operation: "subscribe",
                state,
            });
        }

        let weak = Rc::downgrade(&self.inner);
        let callback: SignalCallback = Rc::new(move |signal: &Signal| match weak.upgrade() {
            Some(inner) => Reactor { inner }.on_event(signal),
            None => Ok(()),
        });

        let handle = self.inner.transport.subscribe(&rule, callback)?;
        self.inner.subscriptions.borrow_mut().track(rule, handle);

        Ok(())
    }

    /// Runs `action` once, `delay_ms` milliseconds from now.
    ///
    /// The action runs whatever state the reactor is in by then; an error
    /// it returns stops the scheduler's run.
    pub fn schedule<F>(&self, action: F, delay_ms: u64)
    where
        F: FnOnce() -> Result<(), BoxError> + 'static,
    {
        self.inner.scheduler.add_delay(
            delay_ms,
            Box::new(move || action().map_err(Error::Callback)),
        );
    }

    /// Runs the reactor until [`quit`](Self::quit) is called.
    ///
    /// `kickoff` is scheduled first, after the configured kickoff delay.
    /// `timeout` overrides [`timeout`](Self::timeout) for this run. If no
    /// signal arrives for that long, the watchdog quits the reactor and
    /// [`timed_out`](Self::timed_out) becomes `true`; that is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the reactor is idle, or the
    /// first error raised while dispatching (a failing handler, kickoff or
    /// transport). Subscriptions and the watchdog are released either way.
    pub fn run(&self, kickoff: Option<Kickoff>, timeout: Option<Duration>) -> Result<(), Error> {
        let state = self.state();
        if state != ReactorState::Idle {
            return Err(Error::InvalidState {
                operation: "run",
                state,
            });
        }

        let kickoff = kickoff.map(|kickoff| {
            self.inner.scheduler.add_delay(
                self.inner.kickoff_delay_ms.get(),
                Box::new(move || kickoff().map_err(Error::Callback)),
            )
        });

        let active = timeout.unwrap_or_else(|| self.timeout());
        self.inner.active_timeout.set(Some(active));

        let weak = Rc::downgrade(&self.inner);
        let on_expiry: ExpiryFn = Rc::new(move || match weak.upgrade() {
            Some(inner) => Reactor { inner }.expire(),
            None => Ok(()),
        });
        self.inner.watchdog.arm(active, on_expiry);
        self.inner.state.set(ReactorState::Running);

        tracing::info!(
            timeout_ms = active.as_millis() as u64,
            subscriptions = self.inner.subscriptions.borrow().len(),
            "reactor running"
        );

        let outcome = self.inner.scheduler.run_blocking();

        // The scheduler can also return on its own (an error, or a stop
        // from outside); the run still ends with a full teardown.
        if self.state() == ReactorState::Running {
            // Someone else owns the loop: leave it running and take back
            // only what this run put on it.
            let nested = matches!(outcome, Err(Error::LoopAlreadyRunning));

            if let Err(err) = &outcome {
                tracing::error!(error = %err, "dispatch failed, tearing down");
            }
            if nested {
                if let Some(source) = kickoff {
                    self.inner.scheduler.remove(source);
                }
            }

            let teardown = self.teardown(!nested);
            if outcome.is_ok() {
                teardown?;
            } else if let Err(err) = teardown {
                tracing::warn!(error = %err, "teardown after failed dispatch also failed");
            }
        }

        tracing::info!(timed_out = self.timed_out(), "reactor stopped");
        outcome
    }

    /// Ends the current run.
    ///
    /// In order: stops the scheduler, releases every subscription, disarms
    /// the watchdog, clears the active timeout, and marks the reactor
    /// terminated. Calling it again, or before `run`, does nothing.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the transport to release a
    /// subscription. The teardown completes regardless.
    pub fn quit(&self) -> Result<(), Error> {
        match self.state() {
            ReactorState::Running => {}
            ReactorState::Idle => {
                tracing::debug!("quit before run ignored");
                return Ok(());
            }
            ReactorState::Terminated => return Ok(()),
        }

        self.teardown(true)
    }

    fn teardown(&self, stop_scheduler: bool) -> Result<(), Error> {
        if stop_scheduler {
            self.inner.scheduler.stop();
        }

        // Out of the cell first: the transport may call back into us.
        let mut subscriptions = std::mem::take(&mut *self.inner.subscriptions.borrow_mut());
        let released = subscriptions.release_all(&*self.inner.transport);
        self.inner.watchdog.disarm();
        self.inner.active_timeout.set(None);
        self.inner.state.set(ReactorState::Terminated);

        tracing::debug!(timed_out = self.timed_out(), "reactor quit");
        released
    }

    /// Pushes the watchdog deadline back by the full active timeout.
    ///
    /// Delivered signals already do this; call it when the handler knows
    /// of activity the transport does not see.
    pub fn reset_timeout(&self) {
        self.inner.watchdog.reset();
    }

    /// Watchdog expiry: the remote service went quiet for too long.
    fn expire(&self) -> Result<(), Error> {
        if self.state() != ReactorState::Running {
            return Ok(());
        }

        tracing::warn!(
            timeout_ms = self.active_timeout().map_or(0, |t| t.as_millis() as u64),
            "no activity before the watchdog expired"
        );
        self.inner.timed_out.set(true);
        self.quit()
    }

    pub fn state(&self) -> ReactorState {
        self.inner.state.get()
    }

    /// The configured watchdog interval.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout.get()
    }

    /// Sets the watchdog interval used by the next `run` without an override.
    pub fn set_timeout(&self, timeout: Duration) {
        self.inner.timeout.set(timeout);
    }

    /// The interval of the run in progress, if any.
    pub fn active_timeout(&self) -> Option<Duration> {
        self.inner.active_timeout.get()
    }

    /// Whether the run ended because the watchdog expired.
    pub fn timed_out(&self) -> bool {
        self.inner.timed_out.get()
    }

    /// Number of subscriptions currently held on the transport.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.borrow().len()
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor")
            .field("state", &self.state())
            .field("timeout", &self.timeout())
            .field("active_timeout", &self.active_timeout())
            .field("timed_out", &self.timed_out())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl Drop for Inner {
    /// Releases whatever a reactor that never terminated still holds.
    fn drop(&mut self) {
        if self.state.get() == ReactorState::Terminated {
            return;
        }

        self.watchdog.disarm();

        if let Err(err) = self.subscriptions.get_mut().release_all(&*self.transport) {
            tracing::warn!(error = %err, "failed to release subscriptions on drop");
        }
    }
}
