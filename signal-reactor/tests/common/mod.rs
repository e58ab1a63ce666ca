//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use signal_reactor::{HandlerResult, LocalBus, MainLoop, Reactor, Scheduler, Signal};
use std::cell::RefCell;
use std::rc::Rc;

pub const PATH: &str = "/org/example/jobs/1";

/// A reactor wired to an in-process loop and bus.
pub struct Harness {
    pub main_loop: Rc<MainLoop>,
    pub bus: Rc<LocalBus>,
    pub reactor: Reactor,
}

pub fn harness() -> Harness {
    let main_loop = Rc::new(MainLoop::new());
    let bus = LocalBus::new(&main_loop);
    let reactor = Reactor::new(bus.clone(), main_loop.clone());

    Harness {
        main_loop,
        bus,
        reactor,
    }
}

pub fn signal(name: &str) -> Signal {
    Signal::new(name, PATH)
}

impl Harness {
    /// Emits `signal` through the bus `delay_ms` from now.
    pub fn emit_after(&self, delay_ms: u64, signal: Signal) {
        let remote = self.bus.remote();
        self.main_loop
            .add_delay(delay_ms, Box::new(move || remote.emit(signal)));
    }

    /// Runs the bare loop for `millis`, e.g. to drain queued signals
    /// after the reactor has terminated.
    pub fn pump_for(&self, millis: u64) {
        let main_loop = self.main_loop.clone();
        self.main_loop.add_delay(
            millis,
            Box::new(move || {
                main_loop.stop();
                Ok(())
            }),
        );
        self.main_loop.run_blocking().unwrap();
    }
}

pub type Seen = Rc<RefCell<Vec<Signal>>>;

/// A handler that records every signal it receives.
pub fn recorder() -> (Seen, impl FnMut(&Reactor, &Signal) -> HandlerResult + 'static) {
    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    (seen, move |_: &Reactor, signal: &Signal| {
        sink.borrow_mut().push(signal.clone());
        Ok(())
    })
}

/// A handler that records the signal, then quits the reactor.
pub fn quitter() -> (Seen, impl FnMut(&Reactor, &Signal) -> HandlerResult + 'static) {
    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    (seen, move |reactor: &Reactor, signal: &Signal| {
        sink.borrow_mut().push(signal.clone());
        reactor.quit()?;
        Ok(())
    })
}
