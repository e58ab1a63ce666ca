mod common;

use common::{harness, quitter, signal};
use signal_reactor::{BoxError, DEFAULT_TIMEOUT, Error, Reactor, ReactorState, Scheduler};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

#[test]
fn test_new_reactor_is_idle_with_defaults() {
    let h = harness();

    assert_eq!(h.reactor.state(), ReactorState::Idle);
    assert_eq!(h.reactor.timeout(), Duration::from_secs(60));
    assert_eq!(h.reactor.timeout(), DEFAULT_TIMEOUT);
    assert!(!h.reactor.timed_out());
    assert_eq!(h.reactor.active_timeout(), None);
    assert_eq!(h.reactor.subscription_count(), 0);
}

#[test]
fn test_kickoff_runs_after_default_delay() {
    let h = harness();
    let started_at = Rc::new(Cell::new(None));

    let kickoff = {
        let started_at = started_at.clone();
        let reactor = h.reactor.clone();
        move || -> Result<(), BoxError> {
            started_at.set(Some(Instant::now()));
            reactor.quit()?;
            Ok(())
        }
    };

    let start = Instant::now();
    h.reactor
        .run(Some(Box::new(kickoff)), Some(Duration::from_secs(5)))
        .unwrap();

    let fired = started_at.get().expect("kickoff should have run");
    assert!(
        fired.duration_since(start) >= Duration::from_millis(50),
        "Kickoff should wait for the default 50ms delay"
    );
    assert!(!h.reactor.timed_out());
}

#[test]
fn test_state_moves_idle_running_terminated() {
    let h = harness();
    let observed = Rc::new(Cell::new(None));

    {
        let observed = observed.clone();
        let reactor = h.reactor.clone();
        h.reactor.schedule(
            move || {
                observed.set(Some((reactor.state(), reactor.active_timeout())));
                reactor.quit()?;
                Ok(())
            },
            10,
        );
    }

    h.reactor.run(None, Some(Duration::from_secs(3))).unwrap();

    assert_eq!(
        observed.get(),
        Some((ReactorState::Running, Some(Duration::from_secs(3))))
    );
    assert_eq!(h.reactor.state(), ReactorState::Terminated);
    assert_eq!(h.reactor.active_timeout(), None, "Quit clears the active timeout");
}

#[test]
fn test_run_uses_configured_timeout_without_override() {
    let h = harness();
    h.reactor.set_timeout(Duration::from_millis(100));

    let start = Instant::now();
    h.reactor.run(None, None).unwrap();

    assert!(h.reactor.timed_out());
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_second_run_is_rejected() {
    let h = harness();
    h.reactor.run(None, Some(Duration::from_millis(10))).unwrap();

    let err = h.reactor.run(None, None).unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidState {
            operation: "run",
            state: ReactorState::Terminated
        }
    ));
}

#[test]
fn test_quit_twice_is_harmless() {
    let h = harness();
    let quits = Rc::new(Cell::new(0));

    h.reactor.react_to("Done").unwrap();
    {
        let quits = quits.clone();
        h.reactor.on("Done", move |reactor, _| {
            reactor.quit()?;
            reactor.quit()?;
            quits.set(quits.get() + 1);
            Ok(())
        });
    }
    h.emit_after(20, signal("Done"));

    h.reactor.run(None, Some(Duration::from_secs(5))).unwrap();
    h.reactor.quit().unwrap();

    assert_eq!(quits.get(), 1);
    assert_eq!(h.reactor.state(), ReactorState::Terminated);
    assert_eq!(h.main_loop.pending_timeouts(), 0, "Watchdog must be disarmed");
}

#[test]
fn test_quit_before_run_is_a_no_op() {
    let h = harness();
    h.reactor.react_to("Done").unwrap();

    h.reactor.quit().unwrap();

    assert_eq!(h.reactor.state(), ReactorState::Idle);
    assert_eq!(h.reactor.subscription_count(), 1);
}

#[test]
fn test_react_to_after_quit_is_rejected() {
    let h = harness();
    h.reactor.run(None, Some(Duration::ZERO)).unwrap();

    let err = h.reactor.react_to("Late").unwrap_err();

    assert!(matches!(err, Error::InvalidState { .. }));
    assert_eq!(h.bus.subscriber_count(), 0);
}

#[test]
fn test_empty_signal_name_is_rejected() {
    let h = harness();

    let err = h.reactor.react_to("").unwrap_err();

    assert!(matches!(err, Error::EmptySignalName));
    assert_eq!(h.reactor.subscription_count(), 0);
}

#[test]
fn test_schedule_runs_independently_of_state() {
    let h = harness();
    let ran = Rc::new(Cell::new(false));

    {
        let ran = ran.clone();
        h.reactor.schedule(
            move || {
                ran.set(true);
                Ok(())
            },
            30,
        );
    }

    // The reactor is never run; the bare loop still fires the action.
    h.pump_for(100);

    assert!(ran.get());
    assert_eq!(h.reactor.state(), ReactorState::Idle);
}

#[test]
fn test_failing_kickoff_ends_run_with_teardown() {
    let h = harness();
    h.reactor.react_to("Done").unwrap();

    let err = h
        .reactor
        .run(
            Some(Box::new(|| -> Result<(), BoxError> {
                Err("remote call refused".into())
            })),
            Some(Duration::from_secs(5)),
        )
        .unwrap_err();

    assert!(matches!(err, Error::Callback(_)));
    assert_eq!(h.reactor.state(), ReactorState::Terminated);
    assert_eq!(h.bus.subscriber_count(), 0);
    assert!(!h.reactor.timed_out());
}

#[test]
fn test_stop_from_outside_still_tears_down() {
    let h = harness();
    let (seen, handler) = quitter();
    h.reactor.react_to("Done").unwrap();
    h.reactor.on("Done", handler);

    let handle = h.main_loop.handle();
    h.main_loop.add_delay(20, Box::new(move || handle.stop()));

    h.reactor.run(None, Some(Duration::from_secs(5))).unwrap();

    assert!(seen.borrow().is_empty());
    assert_eq!(h.reactor.state(), ReactorState::Terminated);
    assert_eq!(h.bus.subscriber_count(), 0);
    assert!(!h.reactor.timed_out());
}

#[test]
fn test_dropping_idle_reactor_releases_subscriptions() {
    let h = harness();
    h.reactor.react_to("Done").unwrap();
    h.reactor.react_to("Progress").unwrap();
    assert_eq!(h.bus.subscriber_count(), 2);

    let bus = h.bus.clone();
    drop(h);

    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn test_nested_run_leaves_outer_run_alone() {
    let h = harness();
    let (seen, on_done) = quitter();
    let inner = Reactor::new(h.bus.clone(), h.main_loop.clone());
    let inner_kicked = Rc::new(Cell::new(false));
    let nested = Rc::new(RefCell::new(None));

    inner.react_to("Done").unwrap();
    h.reactor.react_to("Start").unwrap();
    h.reactor.react_to("Done").unwrap();
    {
        let (inner, inner_kicked, nested) = (inner.clone(), inner_kicked.clone(), nested.clone());
        h.reactor.on("Start", move |_, _| {
            let kicked = inner_kicked.clone();
            let result = inner.run(
                Some(Box::new(move || -> Result<(), BoxError> {
                    kicked.set(true);
                    Ok(())
                })),
                Some(Duration::from_millis(20)),
            );
            *nested.borrow_mut() = Some(result);
            Ok(())
        });
    }
    h.reactor.on("Done", on_done);

    h.emit_after(10, signal("Start"));
    h.emit_after(150, signal("Done"));

    let start = Instant::now();
    h.reactor.run(None, Some(Duration::from_millis(500))).unwrap();

    assert!(matches!(
        nested.borrow_mut().take(),
        Some(Err(Error::LoopAlreadyRunning))
    ));
    assert_eq!(inner.state(), ReactorState::Terminated);
    assert_eq!(inner.subscription_count(), 0);
    assert!(!inner_kicked.get(), "Inner kickoff must be withdrawn");

    // The outer run goes on until its own Done.
    assert_eq!(seen.borrow().len(), 1);
    assert!(!h.reactor.timed_out());
    assert!(start.elapsed() >= Duration::from_millis(150));
    assert_eq!(h.main_loop.pending_timeouts(), 0);
}
