use super::command::Command;
use super::timer::TimerEntry;
use super::{Callback, Scheduler, SourceId};
use crate::error::Error;

use std::cell::{Cell, RefCell};
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::time::{Duration, Instant};

/// Stale timer entries tolerated before the heap is compacted.
const STALE_TIMER_SLACK: usize = 64;

/// Something the loop polls on every iteration, besides its timers.
///
/// Transports attach themselves as sources to get their queued deliveries
/// dispatched on the loop thread.
pub trait Source {
    /// Dispatches at most one unit of pending work.
    ///
    /// Returns `Ok(true)` if work was done and more may be pending; the
    /// loop keeps calling until it gets `Ok(false)` or is stopped.
    ///
    /// # Errors
    ///
    /// Any error stops the loop and is returned from `run_blocking`.
    fn dispatch(&self) -> Result<bool, Error>;
}

/// The main loop.
///
/// The loop runs on the thread that calls [`Scheduler::run_blocking`] and
/// is responsible for:
/// - firing one-shot timeouts in deadline order,
/// - running closures submitted from other threads,
/// - dispatching attached [`Source`]s.
///
/// It communicates with other threads through [`Command`] messages sent
/// over a channel by a [`LoopHandle`].
pub struct MainLoop {
    /// Channel receiving commands from loop handles.
    receiver: Receiver<Command>,

    /// Handle given out to other threads.
    handle: LoopHandle,

    /// Min-heap of pending timers ordered by deadline.
    timers: RefCell<BinaryHeap<TimerEntry>>,

    /// Callbacks of the timeouts that have neither fired nor been removed.
    pending: RefCell<HashMap<SourceId, Callback>>,

    /// Sources polled on every iteration.
    sources: RefCell<Vec<Rc<dyn Source>>>,

    next_source: Cell<u64>,
    running: Cell<bool>,
}

/// A handle used to communicate with a main loop from any thread.
///
/// Cloning this handle allows multiple threads to:
/// - run closures on the loop thread,
/// - wake the loop so attached sources are polled,
/// - stop the loop.
#[derive(Clone, Debug)]
pub struct LoopHandle {
    /// Sender side of the command channel.
    sender: Sender<Command>,
}

impl LoopHandle {
    /// Runs `f` on the loop thread during its next iteration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoopClosed`] if the loop has been dropped.
    pub fn invoke<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnOnce() -> Result<(), Error> + Send + 'static,
    {
        self.send(Command::Invoke(Box::new(f)))
    }

    /// Interrupts the loop's wait.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoopClosed`] if the loop has been dropped.
    pub fn wake(&self) -> Result<(), Error> {
        self.send(Command::Wake)
    }

    /// Stops the loop from another thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoopClosed`] if the loop has been dropped.
    pub fn stop(&self) -> Result<(), Error> {
        self.send(Command::Stop)
    }

    fn send(&self, cmd: Command) -> Result<(), Error> {
        self.sender.send(cmd).map_err(|_| Error::LoopClosed)
    }
}

impl MainLoop {
    /// Creates a new, idle main loop.
    pub fn new() -> Self {
        let (sender, receiver) = channel();

        Self {
            receiver,
            handle: LoopHandle { sender },
            timers: RefCell::new(BinaryHeap::new()),
            pending: RefCell::new(HashMap::new()),
            sources: RefCell::new(Vec::new()),
            next_source: Cell::new(1),
            running: Cell::new(false),
        }
    }

    /// Returns a handle that other threads can use to reach this loop.
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Attaches a source polled on every iteration.
    pub fn attach(&self, source: Rc<dyn Source>) {
        self.sources.borrow_mut().push(source);
    }

    /// Whether the loop is currently inside `run_blocking`.
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Number of timeouts that have neither fired nor been removed.
    pub fn pending_timeouts(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Main loop body.
    ///
    /// Each iteration performs the following steps:
    /// 1. Dispatch attached sources
    /// 2. Fire expired timers
    /// 3. Wait for a command, bounded by the next timer deadline
    /// 4. Process every queued command
    fn drive(&self) -> Result<(), Error> {
        while self.running.get() {
            self.dispatch_sources()?;
            if !self.running.get() {
                break;
            }

            self.fire_expired()?;
            if !self.running.get() {
                break;
            }

            let timeout = self
                .timers
                .borrow()
                .peek()
                .map(|t| t.deadline.saturating_duration_since(Instant::now()));

            let first = match timeout {
                Some(timeout) => match self.receiver.recv_timeout(timeout) {
                    Ok(cmd) => Some(cmd),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return Err(Error::LoopClosed),
                },
                None => Some(self.receiver.recv().map_err(|_| Error::LoopClosed)?),
            };

            if let Some(cmd) = first {
                self.handle_command(cmd)?;
            }

            while self.running.get() {
                match self.receiver.try_recv() {
                    Ok(cmd) => self.handle_command(cmd)?,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return Err(Error::LoopClosed),
                }
            }
        }

        Ok(())
    }

    fn handle_command(&self, cmd: Command) -> Result<(), Error> {
        match cmd {
            Command::Invoke(f) => {
                tracing::trace!("running invoked closure");
                f()
            }
            Command::Wake => Ok(()),
            Command::Stop => {
                self.stop();
                Ok(())
            }
        }
    }

    fn dispatch_sources(&self) -> Result<(), Error> {
        let sources: Vec<Rc<dyn Source>> = self.sources.borrow().clone();

        for source in sources {
            while self.running.get() && source.dispatch()? {}
        }

        Ok(())
    }

    /// Fires every timer whose deadline has passed, earliest first.
    fn fire_expired(&self) -> Result<(), Error> {
        let now = Instant::now();

        while self.running.get() {
            let timer = {
                let mut timers = self.timers.borrow_mut();
                match timers.peek() {
                    Some(t) if t.deadline <= now => timers.pop(),
                    _ => None,
                }
            };

            let Some(timer) = timer else {
                break;
            };

            // Removed sources leave their entry behind; skip it.
            let Some(callback) = self.pending.borrow_mut().remove(&timer.source) else {
                continue;
            };

            tracing::trace!(source = %timer.source, "firing timeout");
            callback()?;
        }

        Ok(())
    }

    /// Drops stale heap entries once they clearly outnumber live ones.
    fn compact_timers(&self) {
        let pending = self.pending.borrow();
        let mut timers = self.timers.borrow_mut();

        if timers.len() > 2 * pending.len() + STALE_TIMER_SLACK {
            timers.retain(|t| pending.contains_key(&t.source));
        }
    }
}

impl Scheduler for MainLoop {
    fn run_blocking(&self) -> Result<(), Error> {
        if self.running.replace(true) {
            return Err(Error::LoopAlreadyRunning);
        }

        tracing::debug!("main loop started");
        let result = self.drive();
        self.running.set(false);
        tracing::debug!(ok = result.is_ok(), "main loop stopped");

        result
    }

    fn stop(&self) {
        self.running.set(false);
    }

    fn add_timeout(&self, after: Duration, callback: Callback) -> SourceId {
        let source = SourceId::from_raw(self.next_source.get());
        self.next_source.set(source.as_raw() + 1);

        self.pending.borrow_mut().insert(source, callback);

        // A deadline past the clock's range never comes; the callback stays
        // pending (and removable) without a heap entry.
        match Instant::now().checked_add(after) {
            Some(deadline) => self.timers.borrow_mut().push(TimerEntry { deadline, source }),
            None => tracing::trace!(%source, "timeout out of range, never fires"),
        }

        source
    }

    fn remove(&self, source: SourceId) -> bool {
        let removed = self.pending.borrow_mut().remove(&source).is_some();

        if removed {
            self.compact_timers();
        }

        removed
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}
