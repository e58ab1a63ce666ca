use crate::error::Error;
use crate::main_loop::{Scheduler, SourceId};

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Callback run when the watchdog deadline passes.
pub(crate) type ExpiryFn = Rc<dyn Fn() -> Result<(), Error>>;

/// A single inactivity deadline.
///
/// At most one deadline is outstanding at any time: every `arm` and
/// `reset` removes the previous one from the scheduler first. Each
/// scheduled deadline also carries a generation number, so one that a
/// scheduler delivers after it was replaced is ignored.
pub(crate) struct Watchdog {
    scheduler: Rc<dyn Scheduler>,

    /// Outstanding deadline; cleared by the deadline itself when it fires.
    deadline: Rc<Cell<Option<SourceId>>>,

    /// Generation of the outstanding deadline.
    generation: Rc<Cell<u64>>,

    /// Interval of the last `arm`, `None` once disarmed.
    interval: Cell<Option<Duration>>,

    on_expiry: RefCell<Option<ExpiryFn>>,
}

impl Watchdog {
    pub(crate) fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            deadline: Rc::new(Cell::new(None)),
            generation: Rc::new(Cell::new(0)),
            interval: Cell::new(None),
            on_expiry: RefCell::new(None),
        }
    }

    /// Replaces any outstanding deadline with one `interval` from now.
    pub(crate) fn arm(&self, interval: Duration, on_expiry: ExpiryFn) {
        self.interval.set(Some(interval));
        *self.on_expiry.borrow_mut() = Some(on_expiry);
        self.schedule(interval);
    }

    /// Pushes the deadline back by the full interval of the last `arm`.
    ///
    /// Only cancels once the watchdog has been disarmed.
    pub(crate) fn reset(&self) {
        match self.interval.get() {
            Some(interval) => self.schedule(interval),
            None => self.cancel(),
        }
    }

    pub(crate) fn disarm(&self) {
        self.cancel();
        self.interval.set(None);
        self.on_expiry.borrow_mut().take();
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.get().is_some()
    }

    fn schedule(&self, interval: Duration) {
        self.cancel();

        let Some(on_expiry) = self.on_expiry.borrow().clone() else {
            return;
        };

        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);

        let current = self.generation.clone();
        let deadline = self.deadline.clone();

        let source = self.scheduler.add_timeout(
            interval,
            Box::new(move || {
                if current.get() != generation {
                    return Ok(());
                }

                deadline.set(None);
                on_expiry()
            }),
        );

        tracing::trace!(%source, interval_ms = interval.as_millis() as u64, "watchdog armed");
        self.deadline.set(Some(source));
    }

    fn cancel(&self) {
        // Invalidate in-flight deliveries of the old deadline as well.
        self.generation.set(self.generation.get().wrapping_add(1));

        if let Some(source) = self.deadline.take() {
            self.scheduler.remove(source);
        }
    }
}
