//! End-to-end behaviour of compiled dispatch tables: middleware scoping,
//! nesting order, short-circuiting, and build determinism.

use std::cell::RefCell;
use std::rc::Rc;

use rookery_dispatch::{Controller, DispatchTable, Handler};
use rookery_protocol::Frame;

type Log = Rc<RefCell<Vec<String>>>;

fn frame(code: u16) -> Frame {
    Frame::from_parts(0x09, code, &[])
}

/// Middleware that records `label` on the way in, then calls through.
fn tracer(log: &Log, label: &str) -> impl Fn(Handler) -> Handler + 'static {
    let log = Rc::clone(log);
    let label = label.to_string();
    move |next: Handler| -> Handler {
        let log = Rc::clone(&log);
        let label = label.clone();
        Rc::new(move |f: &Frame| {
            log.borrow_mut().push(label.clone());
            next(f)
        })
    }
}

fn recorder(
    log: &Log,
    label: &str,
) -> impl Fn(&Frame) -> Result<(), rookery_dispatch::DispatchError> + 'static {
    let log = Rc::clone(log);
    let label = label.to_string();
    move |_| {
        log.borrow_mut().push(label.clone());
        Ok(())
    }
}

/// The same registrations every time, applied to a fresh controller.
fn layered_table(log: &Log) -> DispatchTable {
    let mut c = Controller::new();
    c.register_handler(0x8102, recorder(log, "h1")).unwrap();
    c.register_handler(0x8102, recorder(log, "h2")).unwrap();
    c.register_handler(0x0101, recorder(log, "req")).unwrap();
    // Deliberately registered out of specificity order.
    c.register_middleware(0x8102, 16, tracer(log, "exact")).unwrap();
    c.register_middleware(0x0000, 0, tracer(log, "root-a")).unwrap();
    c.register_middleware(0x8100, 8, tracer(log, "rooms")).unwrap();
    c.register_middleware(0xffff, 0, tracer(log, "root-b")).unwrap();
    c.register_middleware(0x8000, 1, tracer(log, "notify")).unwrap();
    c.build()
}

fn run(table: &DispatchTable, log: &Log, code: u16) -> Vec<String> {
    log.borrow_mut().clear();
    if let Some(result) = table.dispatch(&frame(code)) {
        result.unwrap();
    }
    log.borrow().clone()
}

#[test]
fn test_build_nests_root_outermost_and_exact_innermost() {
    let log: Log = Rc::default();
    let table = layered_table(&log);

    assert_eq!(
        run(&table, &log, 0x8102),
        vec!["root-a", "root-b", "notify", "rooms", "exact", "h1", "h2"]
    );
    // Request codes only see the root middleware.
    assert_eq!(run(&table, &log, 0x0101), vec!["root-a", "root-b", "req"]);
}

#[test]
fn test_build_twice_gives_identical_nesting() {
    let log: Log = Rc::default();
    let first = layered_table(&log);
    let second = layered_table(&log);

    for code in [0x8102, 0x0101, 0x4242] {
        assert_eq!(run(&first, &log, code), run(&second, &log, code), "code {code:#06x}");
    }
}

#[test]
fn test_level_zero_middleware_observes_every_code() {
    let log: Log = Rc::default();
    let mut c = Controller::new();
    c.register_handler(0x0001, recorder(&log, "a")).unwrap();
    c.register_handler(0x8000, recorder(&log, "b")).unwrap();
    c.register_middleware(0x1234, 0, tracer(&log, "mw")).unwrap();
    let table = c.build();

    assert_eq!(run(&table, &log, 0x0001), vec!["mw", "a"]);
    assert_eq!(run(&table, &log, 0x8000), vec!["mw", "b"]);
}

#[test]
fn test_level_sixteen_middleware_does_not_alias_to_root() {
    let log: Log = Rc::default();
    let mut c = Controller::new();
    c.register_handler(0x0001, recorder(&log, "a")).unwrap();
    c.register_handler(0x0002, recorder(&log, "b")).unwrap();
    c.register_middleware(0x0001, 16, tracer(&log, "only-1")).unwrap();
    let table = c.build();

    assert_eq!(run(&table, &log, 0x0001), vec!["only-1", "a"]);
    assert_eq!(run(&table, &log, 0x0002), vec!["b"]);
}

#[test]
fn test_root_middleware_can_short_circuit() {
    let log: Log = Rc::default();
    let mut c = Controller::new();
    c.register_handler(0x8003, recorder(&log, "handler")).unwrap();
    c.register_middleware(0x8003, 16, tracer(&log, "inner")).unwrap();
    let gate_log = Rc::clone(&log);
    c.register_middleware(0, 0, move |next: Handler| -> Handler {
        let log = Rc::clone(&gate_log);
        Rc::new(move |f: &Frame| {
            log.borrow_mut().push("gate".into());
            if f.event_code() == 0x8003 {
                return Ok(());
            }
            next(f)
        })
    })
    .unwrap();
    let table = c.build();

    assert_eq!(run(&table, &log, 0x8003), vec!["gate"]);
}

#[test]
fn test_middleware_without_handler_is_never_invoked() {
    let log: Log = Rc::default();
    let mut c = Controller::new();
    c.register_middleware(0, 0, tracer(&log, "mw")).unwrap();
    let table = c.build();

    assert!(table.dispatch(&frame(0x0005)).is_none());
    assert!(log.borrow().is_empty());
}
