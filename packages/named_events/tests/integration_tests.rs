//! End-to-end scenarios driving events through the public API only.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use futures::executor::block_on;
use futures::future::join;
use named_events::protocol::{
    CONNECTION_LOST, CONNECTION_MADE, DATA_PROCESSED, POST_REQUEST, PRE_REQUEST, Producer,
    ProtocolHandler, SessionId,
};
use named_events::{Error, EventHandler, EventSource, Fire, Handler};

struct Job;

impl EventSource for Job {
    const ONE_TIME_EVENTS: &'static [&'static str] = &["finished"];

    type Owner = &'static str;
    type Error = String;
    type Data = u32;
}

fn log_handler(log: &Rc<RefCell<Vec<String>>>, label: &'static str) -> ProtocolHandler {
    let log = Rc::clone(log);

    Handler::new(move |session: &SessionId, fire| {
        log.borrow_mut()
            .push(format!("{label}:{}:{}", session.get(), fire.data().map_or(0, Vec::len)));
        Ok(())
    })
}

#[test]
fn waiters_resolve_for_every_awaiting_task() {
    let events = EventHandler::<Job>::new("job");
    let finished = events.event("finished").unwrap();

    let first = finished.waiter();
    let second = events.event("finished").unwrap().waiter();
    assert!(first.ptr_eq(&second));

    finished.fire(Fire::Plain).unwrap();

    let (a, b) = block_on(join(first, second));
    assert_eq!(a, Ok("job"));
    assert_eq!(b, Ok("job"));
}

#[test]
fn waiter_is_woken_by_fire_from_another_task() {
    let events = Rc::new(EventHandler::<Job>::new("job"));
    let progress = events.event("progress").unwrap();
    let waiter = progress.waiter();

    let firing = {
        let events = Rc::clone(&events);
        async move {
            events
                .fire_event("progress", Fire::WithError("disk full".to_string()))
                .unwrap();
        }
    };

    let (outcome, ()) = block_on(join(waiter, firing));

    assert_eq!(outcome, Err("disk full".to_string()));
    assert!(!progress.fired());
}

#[test]
fn full_session_lifecycle() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let producer = Producer::new("integration");

    for (name, label) in [
        (CONNECTION_MADE, "made"),
        (PRE_REQUEST, "pre"),
        (DATA_PROCESSED, "data"),
        (POST_REQUEST, "post"),
        (CONNECTION_LOST, "lost"),
    ] {
        producer
            .events()
            .event(name)
            .unwrap()
            .bind(log_handler(&log, label))
            .unwrap();
    }

    let connection = producer.create_connection().unwrap();
    connection.connection_made().unwrap();
    connection.data_received(b"hello").unwrap();
    connection.finish_request().unwrap();
    connection.data_received(b"bye").unwrap();

    let closed = connection.close().unwrap().expect("connection was still open");
    assert_eq!(block_on(closed), Ok(connection.session()));

    assert_eq!(
        *log.borrow(),
        [
            "made:1:0", "pre:1:0", "data:1:5", "post:1:0", "pre:1:0", "data:1:3", "post:1:0",
            "lost:1:0",
        ]
    );
    assert_eq!(producer.requests_processed(), 2);
    assert_eq!(connection.processed(), 2);

    // One-time events of the connection are spent.
    let made = connection.events().event(CONNECTION_MADE).unwrap();
    assert!(made.fired());
    assert!(matches!(
        made.bind(log_handler(&log, "late")),
        Err(Error::AlreadyFired { .. })
    ));
}

#[test]
fn handlers_bound_on_producer_after_connection_do_not_apply() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let producer = Producer::new("late-binding");

    let connection = producer.create_connection().unwrap();

    producer
        .events()
        .event(CONNECTION_MADE)
        .unwrap()
        .bind(log_handler(&log, "made"))
        .unwrap();

    connection.connection_made().unwrap();
    assert!(log.borrow().is_empty());

    let next = producer.create_connection().unwrap();
    next.connection_made().unwrap();
    assert_eq!(*log.borrow(), ["made:2:0"]);
}

#[test]
fn lost_connection_reports_error_to_waiter() {
    let producer = Producer::new("errors");
    let connection = producer.create_connection().unwrap();
    let lost = connection.events().event(CONNECTION_LOST).unwrap().waiter();

    connection
        .connection_lost(Some(io::ErrorKind::BrokenPipe))
        .unwrap();

    assert_eq!(block_on(lost), Err(io::ErrorKind::BrokenPipe));
    assert!(connection.close().unwrap().is_none());
}
