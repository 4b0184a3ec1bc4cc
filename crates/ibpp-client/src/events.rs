//! Server event subscriptions.
//!
//! A subscription keeps two buffers of identical shape: the counters last
//! reported to handlers, and the counters most recently pushed by the
//! server. The transport delivers notifications from its own thread over
//! an unbounded channel and does nothing else; [`Events::dispatch`], on the
//! caller's thread, drains the channel, calls the handler of every event
//! whose counter increased with the number of new occurrences, and queues
//! the subscription again.
//!
//! Every structural change (adding or dropping an event) cancels the
//! queued request and queues a new one.

use ibpp_protocol::{EventBlock, MAX_EVENT_BUFFER, MAX_EVENT_NAME_LEN};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::arena::{DatabaseKey, EventsKey};
use crate::client::Client;
use crate::error::{Error, Result};
use crate::transport::{EventHandle, EventNotification};

/// Callback invoked with an event name and the number of times it fired
/// since the previous dispatch.
pub type EventHandler = Box<dyn FnMut(&str, u32) + Send>;

pub(crate) struct EventsState {
    pub(crate) database: Option<DatabaseKey>,
    events: EventBlock,
    results: EventBlock,
    handlers: Vec<EventHandler>,
    queued: Option<EventHandle>,
    trapped: bool,
    sender: UnboundedSender<EventNotification>,
    receiver: UnboundedReceiver<EventNotification>,
}

impl EventsState {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            database: None,
            events: EventBlock::new(),
            results: EventBlock::new(),
            handlers: Vec::new(),
            queued: None,
            trapped: false,
            sender,
            receiver,
        }
    }

    /// Take in notifications for the request currently queued.
    ///
    /// A request fires once; notifications for withdrawn requests are
    /// dropped.
    fn drain_notifications(&mut self) {
        while let Ok(notification) = self.receiver.try_recv() {
            if self.queued != Some(notification.queue) {
                tracing::trace!(queue = ?notification.queue, "stale event notification dropped");
                continue;
            }
            self.results.overwrite_from(&notification.counts);
            self.trapped = true;
            self.queued = None;
        }
    }

    /// Report counter increases and synchronize the counters.
    fn fire_actions(&mut self) {
        if !self.trapped {
            return;
        }
        let entries: Vec<_> = self.events.entries().zip(self.results.entries()).collect();
        for ((seen, fresh), handler) in entries.into_iter().zip(&mut self.handlers) {
            if fresh.count == seen.count {
                continue;
            }
            if fresh.count > seen.count {
                tracing::debug!(event = %seen.name, delta = fresh.count - seen.count, "event fired");
                handler(&seen.name, fresh.count - seen.count);
            }
            self.events.copy_entry_from(&self.results, seen.range);
        }
    }
}

impl std::fmt::Debug for EventsState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventsState")
            .field("database", &self.database)
            .field("events", &self.events.names())
            .field("queued", &self.queued)
            .field("trapped", &self.trapped)
            .finish_non_exhaustive()
    }
}

fn check_name(context: &'static str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::logic(context, "Zero length event names not permitted"));
    }
    if name.len() > MAX_EVENT_NAME_LEN {
        return Err(Error::logic(
            context,
            format!("Event names are limited to {MAX_EVENT_NAME_LEN} characters"),
        ));
    }
    Ok(())
}

impl Client {
    pub(crate) fn events_state(&self, key: EventsKey) -> Result<&EventsState> {
        self.events.get(key).ok_or(Error::InvalidHandle("events"))
    }

    pub(crate) fn events_state_mut(&mut self, key: EventsKey) -> Result<&mut EventsState> {
        self.events.get_mut(key).ok_or(Error::InvalidHandle("events"))
    }

    pub(crate) fn link_events_database(&mut self, key: EventsKey, db: DatabaseKey) -> Result<()> {
        self.db_mut(db)?.events.push(key);
        self.events_state_mut(key)?.database = Some(db);
        Ok(())
    }

    pub(crate) fn unlink_events_database(&mut self, key: EventsKey) {
        let Some(db) = self.events.get_mut(key).and_then(|e| e.database.take()) else {
            return;
        };
        if let Some(state) = self.databases.get_mut(db) {
            state.events.retain(|e| *e != key);
        }
    }

    /// Queue the subscription unless already queued or empty.
    fn queue_events(&mut self, key: EventsKey) -> Result<()> {
        const CONTEXT: &str = "Events::Queue";
        let state = self.events_state(key)?;
        if state.queued.is_some() || state.events.is_empty() {
            return Ok(());
        }
        let db = self.connected_db(CONTEXT, state.database)?;

        let state = self
            .events
            .get_mut(key)
            .ok_or(Error::InvalidHandle("events"))?;
        state.trapped = false;
        let queued = self
            .transport
            .que_events(db, state.events.as_bytes(), state.sender.clone());
        match queued {
            Ok(handle) => {
                state.queued = Some(handle);
                Ok(())
            }
            Err(status) => Err(self.server_error(CONTEXT, status)),
        }
    }

    /// Withdraw the queued request, if any.
    fn cancel_events(&mut self, key: EventsKey) -> Result<()> {
        const CONTEXT: &str = "Events::Cancel";
        let state = self.events_state(key)?;
        let Some(queue) = state.queued else {
            return Ok(());
        };
        let db = self.connected_db(CONTEXT, state.database)?;

        let state = self.events_state_mut(key)?;
        state.trapped = false;
        state.queued = None;
        if let Err(status) = self.transport.cancel_events(db, queue) {
            self.events_state_mut(key)?.queued = Some(queue);
            return Err(self.server_error(CONTEXT, status));
        }
        Ok(())
    }

    /// Cancel and forget every event.
    pub(crate) fn clear_events(&mut self, key: EventsKey) -> Result<()> {
        let cancelled = self.cancel_events(key);
        let state = self.events_state_mut(key)?;
        state.events.clear();
        state.results.clear();
        state.handlers.clear();
        state.trapped = false;
        cancelled
    }
}

/// An event subscription borrowed from a [`Client`].
pub struct Events<'c> {
    client: &'c mut Client,
    key: EventsKey,
}

impl<'c> Events<'c> {
    pub(crate) fn new(client: &'c mut Client, key: EventsKey) -> Self {
        Self { client, key }
    }

    /// Key of this subscription.
    #[must_use]
    pub fn key(&self) -> EventsKey {
        self.key
    }

    /// Linked database.
    pub fn database(&self) -> Result<Option<DatabaseKey>> {
        Ok(self.client.events_state(self.key)?.database)
    }

    /// Move the subscription to another database. Every event is dropped.
    pub fn attach_database(&mut self, db: DatabaseKey) -> Result<()> {
        self.client.db(db)?;
        self.client.clear_events(self.key)?;
        self.client.unlink_events_database(self.key);
        self.client.link_events_database(self.key, db)
    }

    /// Subscribe to `name`, calling `handler` when it fires.
    ///
    /// Fails with [`Error::BufferOverflow`] when the event buffer would
    /// exceed its protocol limit.
    pub fn add<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: FnMut(&str, u32) + Send + 'static,
    {
        const CONTEXT: &str = "Events::Add";
        check_name(CONTEXT, name)?;
        let state = self.client.events_state(self.key)?;
        if state.events.position(name).is_some() {
            return Err(Error::logic(CONTEXT, format!("Event '{name}' is already registered")));
        }
        let needed = state.events.len().max(1) + name.len() + 5;
        if needed > MAX_EVENT_BUFFER {
            return Err(Error::BufferOverflow {
                needed,
                limit: MAX_EVENT_BUFFER,
            });
        }

        self.client.cancel_events(self.key)?;
        let state = self.client.events_state_mut(self.key)?;
        state.events.push(name)?;
        state.results.push(name)?;
        state.handlers.push(Box::new(handler));
        tracing::debug!(event = name, "event registered");
        self.client.queue_events(self.key)
    }

    /// Unsubscribe from `name`. Unknown names are ignored.
    pub fn drop(&mut self, name: &str) -> Result<()> {
        const CONTEXT: &str = "Events::Drop";
        check_name(CONTEXT, name)?;
        let state = self.client.events_state(self.key)?;
        let Some(index) = state.events.position(name) else {
            return Ok(());
        };

        self.client.cancel_events(self.key)?;
        let state = self.client.events_state_mut(self.key)?;
        state.events.remove(index);
        state.results.remove(index);
        if index < state.handlers.len() {
            drop(state.handlers.remove(index));
        }
        tracing::debug!(event = name, "event unregistered");
        self.client.queue_events(self.key)
    }

    /// Registered event names, in registration order.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.client.events_state(self.key)?.events.names())
    }

    /// Cancel the subscription and forget every event.
    pub fn clear(&mut self) -> Result<()> {
        self.client.clear_events(self.key)
    }

    /// Withdraw the queued request, keeping the registered events.
    /// [`dispatch`](Self::dispatch) queues it again.
    pub fn cancel(&mut self) -> Result<()> {
        self.client.cancel_events(self.key)
    }

    /// Whether a request is queued on the server.
    pub fn is_queued(&self) -> Result<bool> {
        Ok(self.client.events_state(self.key)?.queued.is_some())
    }

    /// Report pending notifications to the handlers, then queue again.
    ///
    /// Returns without doing anything when no event is registered.
    pub fn dispatch(&mut self) -> Result<()> {
        let state = self.client.events_state_mut(self.key)?;
        if state.events.is_empty() {
            return Ok(());
        }
        state.drain_notifications();
        state.fire_actions();
        self.client.queue_events(self.key)
    }
}

impl std::fmt::Debug for Events<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Events").field("key", &self.key).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn counts(state: &EventsState, values: &[u32]) -> Vec<u8> {
        let mut fresh = state.events.clone();
        for (i, v) in values.iter().enumerate() {
            fresh.set_count(i, *v);
        }
        fresh.as_bytes().to_vec()
    }

    fn subscribed(names: &[&str], log: &Arc<Mutex<Vec<(String, u32)>>>) -> EventsState {
        let mut state = EventsState::new();
        for name in names {
            state.events.push(name).unwrap();
            state.results.push(name).unwrap();
            let log = Arc::clone(log);
            state
                .handlers
                .push(Box::new(move |n: &str, d| log.lock().unwrap().push((n.to_string(), d))));
        }
        state.queued = Some(EventHandle(1));
        state
    }

    #[test]
    fn test_first_notification_only_synchronizes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut state = subscribed(&["A", "B"], &log);
        let body = counts(&state, &[4, 9]);
        state.sender.send(EventNotification { queue: EventHandle(1), counts: body }).unwrap();

        state.drain_notifications();
        assert!(state.trapped);
        assert!(state.queued.is_none());
        state.fire_actions();

        assert!(log.lock().unwrap().is_empty());
        let seen: Vec<u32> = state.events.entries().map(|e| e.count).collect();
        assert_eq!(seen, vec![4, 9]);
    }

    #[test]
    fn test_increase_reports_delta_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut state = subscribed(&["A", "B"], &log);
        state.events.set_count(0, 4);
        state.events.set_count(1, 9);
        let body = counts(&state, &[4, 12]);
        state.sender.send(EventNotification { queue: EventHandle(1), counts: body }).unwrap();

        state.drain_notifications();
        state.fire_actions();

        assert_eq!(*log.lock().unwrap(), vec![("B".to_string(), 3)]);
        let seen: Vec<u32> = state.events.entries().map(|e| e.count).collect();
        assert_eq!(seen, vec![4, 12]);
    }

    #[test]
    fn test_stale_notifications_are_ignored() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut state = subscribed(&["A"], &log);
        state.events.set_count(0, 1);
        let body = counts(&state, &[5]);
        state.sender.send(EventNotification { queue: EventHandle(7), counts: body }).unwrap();

        state.drain_notifications();
        assert!(!state.trapped);
        assert_eq!(state.queued, Some(EventHandle(1)));
        state.fire_actions();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_name_checks() {
        assert!(check_name("Events::Add", "").is_err());
        assert!(check_name("Events::Add", &"x".repeat(MAX_EVENT_NAME_LEN + 1)).is_err());
        assert!(check_name("Events::Add", "ORDER_PLACED").is_ok());
    }
}
