use super::{SignalCallback, SubscriptionHandle, Transport};
use crate::error::Error;
use crate::main_loop::{LoopHandle, MainLoop, Source};
use crate::signal::{MatchRule, Signal};
use crate::utils::{Key, Slab};

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};

struct Subscriber {
    rule: MatchRule,
    callback: SignalCallback,
}

/// An in-process signal bus driven by a [`MainLoop`].
///
/// Emitted signals are queued and delivered on the loop thread, one per
/// source dispatch, to every subscriber whose rule matches. Delivery is
/// therefore never re-entrant: a handler that emits a signal sees it
/// delivered only after it returns.
pub struct LocalBus {
    /// Signals waiting to be delivered.
    inbox: Receiver<Signal>,

    /// Emitter shared with remote threads.
    remote: BusRemote,

    subscribers: RefCell<Slab<Subscriber>>,
}

/// The sending side of a [`LocalBus`], usable from any thread.
///
/// This is how a simulated remote service publishes signals: it pushes
/// the signal into the bus inbox, then wakes the loop.
#[derive(Clone, Debug)]
pub struct BusRemote {
    sender: Sender<Signal>,
    waker: LoopHandle,
}

impl BusRemote {
    /// Queues `signal` for delivery and wakes the loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoopClosed`] once the bus or its loop is gone.
    pub fn emit(&self, signal: Signal) -> Result<(), Error> {
        self.sender.send(signal).map_err(|_| Error::LoopClosed)?;
        self.waker.wake()
    }
}

impl LocalBus {
    /// Creates a bus and attaches it to `main_loop`.
    pub fn new(main_loop: &MainLoop) -> Rc<Self> {
        let (sender, inbox) = channel();

        let bus = Rc::new(Self {
            inbox,
            remote: BusRemote {
                sender,
                waker: main_loop.handle(),
            },
            subscribers: RefCell::new(Slab::new(16)),
        });

        main_loop.attach(bus.clone());
        bus
    }

    /// Returns an emitter that can be moved to another thread.
    pub fn remote(&self) -> BusRemote {
        self.remote.clone()
    }

    /// Queues `signal` for delivery from the loop thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoopClosed`] if the loop is gone.
    pub fn emit(&self, signal: Signal) -> Result<(), Error> {
        self.remote.emit(signal)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Invokes every matching subscriber.
    ///
    /// Subscribers are looked up again right before each call, so one
    /// released by an earlier callback for the same signal is skipped.
    fn deliver(&self, signal: &Signal) -> Result<(), Error> {
        let keys: Vec<Key> = self
            .subscribers
            .borrow()
            .iter()
            .filter(|(_, s)| s.rule.matches(signal))
            .map(|(key, _)| key)
            .collect();

        if keys.is_empty() {
            tracing::trace!(signal = %signal.name, path = %signal.path, "no subscriber");
        }

        for key in keys {
            let callback = self
                .subscribers
                .borrow()
                .get(key)
                .map(|s| s.callback.clone());

            if let Some(callback) = callback {
                callback(signal)?;
            }
        }

        Ok(())
    }
}

impl Source for LocalBus {
    fn dispatch(&self) -> Result<bool, Error> {
        match self.inbox.try_recv() {
            Ok(signal) => {
                self.deliver(&signal)?;
                Ok(true)
            }
            // The bus keeps its own sender alive, so the inbox never disconnects.
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Ok(false),
        }
    }
}

impl Transport for LocalBus {
    fn subscribe(
        &self,
        rule: &MatchRule,
        callback: SignalCallback,
    ) -> Result<SubscriptionHandle, Error> {
        if rule.signal.is_empty() {
            return Err(Error::EmptySignalName);
        }

        let key = self.subscribers.borrow_mut().insert(Subscriber {
            rule: rule.clone(),
            callback,
        });
        let handle = SubscriptionHandle::from_raw(key.into_raw());

        tracing::debug!(
            signal = %rule.signal,
            interface = ?rule.interface,
            path = ?rule.path,
            %handle,
            "subscribed"
        );

        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), Error> {
        let removed = self
            .subscribers
            .borrow_mut()
            .remove(Key::from_raw(handle.as_raw()));

        match removed {
            Some(subscriber) => {
                tracing::debug!(signal = %subscriber.rule.signal, %handle, "unsubscribed");
                Ok(())
            }
            None => Err(Error::UnknownSubscription(handle)),
        }
    }
}
