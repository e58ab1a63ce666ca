mod common;

use common::{PATH, harness, quitter, recorder, signal};
use serde_json::json;
use signal_reactor::{Error, MatchRule, ReactorState, Signal};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[test]
fn test_handler_receives_exact_path_and_payload() {
    let h = harness();
    let (seen, on_done) = quitter();
    let (defaulted, on_default) = recorder();

    h.reactor.react_to("Done").unwrap();
    h.reactor.on("Done", on_done);
    h.reactor.on_default(on_default);

    h.emit_after(
        10,
        Signal::new("Done", "/org/example/jobs/42").with_payload([json!(42), json!("ok")]),
    );
    h.reactor.run(None, Some(Duration::from_secs(5))).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].name, "Done");
    assert_eq!(seen[0].path, "/org/example/jobs/42");
    assert_eq!(seen[0].payload, vec![json!(42), json!("ok")]);
    assert!(defaulted.borrow().is_empty(), "Default must not see handled signals");
}

#[test]
fn test_unregistered_signal_goes_to_default_only() {
    let h = harness();
    let (named, on_named) = recorder();
    let (defaulted, on_default) = recorder();
    let (_, on_done) = quitter();

    h.reactor.react_to("Progress").unwrap();
    h.reactor.react_to("Warning").unwrap();
    h.reactor.react_to("Done").unwrap();
    h.reactor.on("Progress", on_named);
    h.reactor.on("Done", on_done);
    h.reactor.on_default(on_default);

    h.emit_after(10, signal("Warning").with_payload([json!("disk almost full")]));
    h.emit_after(20, signal("Done"));
    h.reactor.run(None, Some(Duration::from_secs(5))).unwrap();

    assert!(named.borrow().is_empty());
    let defaulted = defaulted.borrow();
    assert_eq!(defaulted.len(), 1);
    assert_eq!(defaulted[0].name, "Warning");
    assert_eq!(defaulted[0].path, PATH);
    assert_eq!(defaulted[0].payload, vec![json!("disk almost full")]);
}

#[test]
fn test_unhandled_signal_without_default_is_dropped() {
    let h = harness();
    let (seen, on_done) = quitter();

    h.reactor.react_to("Noise").unwrap();
    h.reactor.react_to("Done").unwrap();
    h.reactor.on("Done", on_done);

    h.emit_after(10, signal("Noise"));
    h.emit_after(20, signal("Done"));

    h.reactor.run(None, Some(Duration::from_secs(5))).unwrap();

    assert_eq!(seen.borrow().len(), 1);
    assert!(!h.reactor.timed_out());
}

#[test]
fn test_signals_dispatch_in_delivery_order() {
    let h = harness();
    let order = Rc::new(RefCell::new(Vec::new()));

    for name in ["A", "B", "C"] {
        h.reactor.react_to(name).unwrap();
    }
    {
        let order = order.clone();
        h.reactor.on_default(move |reactor, signal| {
            order.borrow_mut().push(signal.name.clone());
            if signal.name == "C" {
                reactor.quit()?;
            }
            Ok(())
        });
    }

    let remote = h.bus.remote();
    for name in ["A", "B", "C"] {
        remote.emit(signal(name)).unwrap();
    }

    h.reactor.run(None, Some(Duration::from_secs(5))).unwrap();

    assert_eq!(*order.borrow(), vec!["A", "B", "C"]);
}

#[test]
fn test_handler_error_propagates_out_of_run() {
    let h = harness();
    let (after, on_after) = recorder();

    h.reactor.react_to("Broken").unwrap();
    h.reactor.react_to("After").unwrap();
    h.reactor.on("Broken", |_, _| Err("malformed job report".into()));
    h.reactor.on("After", on_after);

    h.emit_after(10, signal("Broken"));
    h.emit_after(20, signal("After"));

    let err = h.reactor.run(None, Some(Duration::from_secs(5))).unwrap_err();

    match err {
        Error::Handler { signal, source } => {
            assert_eq!(signal, "Broken");
            assert_eq!(source.to_string(), "malformed job report");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(after.borrow().is_empty());
    assert!(!h.reactor.timed_out());
    assert_eq!(h.reactor.state(), ReactorState::Terminated);
    assert_eq!(h.bus.subscriber_count(), 0);
}

#[test]
fn test_later_registration_replaces_handler() {
    let h = harness();
    let (first, on_first) = recorder();
    let (second, on_second) = quitter();

    h.reactor.react_to("Done").unwrap();
    h.reactor.on("Done", on_first);
    h.reactor.on("Done", on_second);

    h.emit_after(10, signal("Done"));
    h.reactor.run(None, Some(Duration::from_secs(5))).unwrap();

    assert!(first.borrow().is_empty());
    assert_eq!(second.borrow().len(), 1);
}

#[test]
fn test_interface_and_path_filters_narrow_delivery() {
    let h = harness();
    let (seen, on_done) = quitter();

    h.reactor
        .react_to(
            MatchRule::new("Done")
                .with_interface("org.example.Jobs")
                .with_path("/org/example/jobs/2"),
        )
        .unwrap();
    h.reactor.on("Done", on_done);

    h.emit_after(
        10,
        Signal::new("Done", "/org/example/jobs/1").with_interface("org.example.Jobs"),
    );
    h.emit_after(
        20,
        Signal::new("Done", "/org/example/jobs/2").with_interface("org.example.Other"),
    );
    h.emit_after(
        30,
        Signal::new("Done", "/org/example/jobs/2")
            .with_interface("org.example.Jobs")
            .with_payload([json!(2)]),
    );

    h.reactor.run(None, Some(Duration::from_secs(5))).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/org/example/jobs/2");
    assert_eq!(seen[0].payload, vec![json!(2)]);
}

#[test]
fn test_handler_can_subscribe_while_running() {
    let h = harness();
    let (late, on_late) = quitter();

    h.reactor.react_to("Started").unwrap();
    h.reactor.on("Started", |reactor, _| {
        reactor.react_to("Finished")?;
        Ok(())
    });
    h.reactor.on("Finished", on_late);

    h.emit_after(10, signal("Started"));
    h.emit_after(40, signal("Finished"));

    h.reactor.run(None, Some(Duration::from_secs(5))).unwrap();

    assert_eq!(late.borrow().len(), 1);
    assert_eq!(h.bus.subscriber_count(), 0);
}
