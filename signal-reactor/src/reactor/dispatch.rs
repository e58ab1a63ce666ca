use super::{Reactor, ReactorState};
use crate::error::{BoxError, Error};
use crate::signal::Signal;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Result returned by signal handlers.
pub type HandlerResult = Result<(), BoxError>;

pub(crate) type Handler = Rc<RefCell<dyn FnMut(&Reactor, &Signal) -> HandlerResult>>;

/// Maps signal names to handlers, with an optional catch-all.
#[derive(Default)]
pub(crate) struct HandlerTable {
    by_signal: HashMap<String, Handler>,
    fallback: Option<Handler>,
}

impl HandlerTable {
    /// Registers `handler` for `signal`, replacing any previous one.
    pub(crate) fn insert(&mut self, signal: String, handler: Handler) {
        self.by_signal.insert(signal, handler);
    }

    pub(crate) fn set_default(&mut self, handler: Handler) {
        self.fallback = Some(handler);
    }

    /// The handler for `signal`, else the default, else nothing.
    pub(crate) fn resolve(&self, signal: &str) -> Option<Handler> {
        self.by_signal
            .get(signal)
            .or(self.fallback.as_ref())
            .cloned()
    }
}

impl Reactor {
    /// Entry point bound to every subscription.
    ///
    /// Any delivered signal counts as activity and pushes the watchdog
    /// back before the handler runs.
    pub(crate) fn on_event(&self, signal: &Signal) -> Result<(), Error> {
        if self.state() == ReactorState::Terminated {
            tracing::trace!(signal = %signal.name, "signal after quit ignored");
            return Ok(());
        }

        self.inner.watchdog.reset();

        let handler = self.inner.handlers.borrow().resolve(&signal.name);
        let Some(handler) = handler else {
            tracing::debug!(signal = %signal.name, path = %signal.path, "unhandled signal dropped");
            return Ok(());
        };

        let Ok(mut call) = handler.try_borrow_mut() else {
            return Err(Error::ReentrantDispatch {
                signal: signal.name.clone(),
            });
        };

        tracing::trace!(signal = %signal.name, path = %signal.path, "dispatching");

        (&mut *call)(self, signal).map_err(|source| {
            tracing::error!(signal = %signal.name, error = %source, "handler failed");
            Error::Handler {
                signal: signal.name.clone(),
                source,
            }
        })
    }
}
