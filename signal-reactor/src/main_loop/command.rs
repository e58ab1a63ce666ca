use crate::error::Error;

/// Work submitted to a [`MainLoop`](super::MainLoop) through its handle.
pub(crate) enum Command {
    /// Run a closure on the loop thread.
    Invoke(Box<dyn FnOnce() -> Result<(), Error> + Send>),

    /// Interrupt the wait so attached sources are polled again.
    Wake,

    /// Stop the loop, as if [`Scheduler::stop`](super::Scheduler::stop)
    /// had been called on the loop thread.
    Stop,
}
