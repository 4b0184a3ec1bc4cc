//! Event subscription tests.
//!
//! The mock server answers a freshly queued request at once, the way the
//! real server reports initial counters. The first dispatch therefore only
//! synchronizes; occurrences posted afterwards reach the handlers on the
//! next dispatch.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};

use ibpp_client::{Client, DatabaseKey, Error, EventsKey};
use ibpp_protocol::MAX_EVENT_NAME_LEN;
use ibpp_testing::fixtures::{self, EmployeeFixture};
use ibpp_testing::MockHandle;

type Log = Arc<Mutex<Vec<(String, u32)>>>;

struct Subscription {
    server: MockHandle,
    client: Client,
    db: DatabaseKey,
    ev: EventsKey,
    log: Log,
}

impl Subscription {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let (fixture, transport) = EmployeeFixture::build();
        let mut client = Client::new(transport);
        let db = client.add_database(fixtures::employee_config());
        client.database(db).unwrap().connect().unwrap();
        let ev = client.add_events(db).unwrap();
        Self {
            server: fixture.server,
            client,
            db,
            ev,
            log: Log::default(),
        }
    }

    fn add(&mut self, name: &str) {
        let log = Arc::clone(&self.log);
        self.client
            .events(self.ev)
            .unwrap()
            .add(name, move |event, count| {
                log.lock().unwrap().push((event.to_string(), count));
            })
            .unwrap();
    }

    fn dispatch(&mut self) {
        self.client.events(self.ev).unwrap().dispatch().unwrap();
    }

    fn fired(&self) -> Vec<(String, u32)> {
        self.log.lock().unwrap().clone()
    }
}

// =============================================================================
// Delivery
// =============================================================================

#[test]
fn test_first_dispatch_only_synchronizes() {
    let mut sub = Subscription::new();
    sub.add("new_order");
    assert!(sub.fired().is_empty(), "handlers run only inside dispatch");

    sub.dispatch();
    assert!(sub.fired().is_empty());
    assert!(sub.client.events(sub.ev).unwrap().is_queued().unwrap());
}

#[test]
fn test_handler_receives_occurrences_since_last_dispatch() {
    let mut sub = Subscription::new();
    sub.add("new_order");
    sub.dispatch();

    sub.server.post_event("new_order", 3);
    sub.dispatch();
    assert_eq!(sub.fired(), vec![("new_order".to_string(), 3)]);

    sub.server.post_event("new_order", 1);
    sub.dispatch();
    assert_eq!(
        sub.fired(),
        vec![("new_order".to_string(), 3), ("new_order".to_string(), 1)]
    );
}

#[test]
fn test_dispatch_without_posts_fires_nothing() {
    let mut sub = Subscription::new();
    sub.add("new_order");
    sub.dispatch();
    sub.dispatch();
    sub.dispatch();
    assert!(sub.fired().is_empty());
}

#[test]
fn test_only_moved_events_fire() {
    let mut sub = Subscription::new();
    sub.add("new_order");
    sub.add("salary_change");
    sub.dispatch();

    sub.server.post_event("salary_change", 2);
    sub.server.post_event("unrelated", 5);
    sub.dispatch();
    assert_eq!(sub.fired(), vec![("salary_change".to_string(), 2)]);
}

#[test]
fn test_posts_before_queueing_are_folded_into_the_baseline() {
    let mut sub = Subscription::new();
    sub.server.post_event("new_order", 7);
    sub.add("new_order");
    sub.dispatch();
    assert!(sub.fired().is_empty());

    sub.server.post_event("new_order", 1);
    sub.dispatch();
    assert_eq!(sub.fired(), vec![("new_order".to_string(), 1)]);
}

// =============================================================================
// Registration
// =============================================================================

#[test]
fn test_duplicate_name_is_rejected() {
    let mut sub = Subscription::new();
    sub.add("new_order");
    let err = sub
        .client
        .events(sub.ev)
        .unwrap()
        .add("new_order", |_, _| {})
        .unwrap_err();
    assert!(err.is_logic_error());
    assert!(err.to_string().contains("already registered"));
}

#[test]
fn test_name_length_is_checked() {
    let mut sub = Subscription::new();
    let mut events = sub.client.events(sub.ev).unwrap();
    assert!(events.add("", |_, _| {}).unwrap_err().is_logic_error());

    let long = "x".repeat(MAX_EVENT_NAME_LEN + 1);
    assert!(events.add(&long, |_, _| {}).unwrap_err().is_logic_error());

    let longest = "x".repeat(MAX_EVENT_NAME_LEN);
    events.add(&longest, |_, _| {}).unwrap();
    assert_eq!(events.list().unwrap(), vec![longest]);
}

#[test]
fn test_drop_and_clear() {
    let mut sub = Subscription::new();
    sub.add("new_order");
    sub.add("salary_change");
    sub.add("new_employee");

    let mut events = sub.client.events(sub.ev).unwrap();
    events.drop("salary_change").unwrap();
    events.drop("never_added").unwrap();
    assert_eq!(
        events.list().unwrap(),
        vec!["new_order".to_string(), "new_employee".to_string()]
    );

    events.clear().unwrap();
    assert!(events.list().unwrap().is_empty());
    assert!(!events.is_queued().unwrap());
    events.dispatch().unwrap();
    assert!(!events.is_queued().unwrap());
    assert_eq!(sub.server.open_counts().event_requests, 0);
}

#[test]
fn test_dropped_event_stops_firing() {
    let mut sub = Subscription::new();
    sub.add("new_order");
    sub.add("salary_change");
    sub.dispatch();

    sub.client.events(sub.ev).unwrap().drop("new_order").unwrap();
    sub.dispatch();
    sub.server.post_event("new_order", 1);
    sub.server.post_event("salary_change", 1);
    sub.dispatch();
    assert_eq!(sub.fired(), vec![("salary_change".to_string(), 1)]);
}

#[test]
fn test_cancel_keeps_registrations() {
    let mut sub = Subscription::new();
    sub.add("new_order");
    sub.dispatch();

    let mut events = sub.client.events(sub.ev).unwrap();
    events.cancel().unwrap();
    assert!(!events.is_queued().unwrap());
    assert_eq!(events.list().unwrap(), vec!["new_order".to_string()]);

    events.dispatch().unwrap();
    assert!(events.is_queued().unwrap());

    sub.server.post_event("new_order", 2);
    sub.dispatch();
    assert_eq!(sub.fired(), vec![("new_order".to_string(), 2)]);
}

#[test]
fn test_disconnect_unlinks_the_subscription() {
    let mut sub = Subscription::new();
    sub.add("new_order");
    sub.client.database(sub.db).unwrap().disconnect().unwrap();

    let events = sub.client.events(sub.ev).unwrap();
    assert_eq!(events.database().unwrap(), None);
    assert!(events.list().unwrap().is_empty());
    assert_eq!(sub.server.open_counts().event_requests, 0);
}

#[test]
fn test_subscription_needs_a_connection() {
    let mut sub = Subscription::new();
    sub.client.database(sub.db).unwrap().disconnect().unwrap();
    let ev = sub.client.add_events(sub.db).unwrap();
    let err = sub
        .client
        .events(ev)
        .unwrap()
        .add("new_order", |_, _| {})
        .unwrap_err();
    assert!(matches!(err, Error::NotConnected { .. }));
}

#[test]
fn test_release_cancels_the_request() {
    let mut sub = Subscription::new();
    sub.add("new_order");
    sub.dispatch();
    assert_eq!(sub.server.open_counts().event_requests, 1);

    sub.client.release_events(sub.ev).unwrap();
    assert_eq!(sub.server.open_counts().event_requests, 0);
    assert!(matches!(
        sub.client.events(sub.ev),
        Err(Error::InvalidHandle("events"))
    ));
}
