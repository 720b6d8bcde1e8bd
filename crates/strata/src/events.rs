//! # STRATA Event Bus
//!
//! Named events fanned out to named, bounded consumers.
//!
//! ## Architecture
//!
//! ```text
//!  any thread                       loop thread
//! ┌────────────────┐  publish   ┌──────────────┐  flush   ┌──────────────┐
//! │ EventPublisher │──────────> │ write buffer │ ───────> │ read buffer  │
//! └────────────────┘  (mutex)   └──────────────┘  (swap)  └──────┬───────┘
//!                                                               │ drain
//!                               publish (sync)                  v
//!  loop thread  ──────────────────────────────────────> consumer ring buffers
//! ```
//!
//! Only the write buffer is shared. Consumers are touched exclusively by
//! the loop thread, through synchronous [`EventBus::publish`] or
//! [`EventBus::flush`].

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Events
// =============================================================================

/// A named event with a shared, type-erased payload.
///
/// Cloning is cheap: the payload is reference counted, so fan-out to many
/// consumers never copies it.
#[derive(Clone)]
pub struct Event {
    name: Arc<str>,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Event {
    /// Creates an event carrying `payload`.
    pub fn new<T: Any + Send + Sync>(name: &str, payload: T) -> Self {
        Self {
            name: Arc::from(name),
            payload: Arc::new(payload),
        }
    }

    /// Creates an event with no payload.
    #[must_use]
    pub fn signal(name: &str) -> Self {
        Self::new(name, ())
    }

    /// Event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload, if it is a `T`.
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Ring Buffer
// =============================================================================

/// What a full [`RingBuffer`] does with a new item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest unread item.
    #[default]
    RewriteOldest,
    /// Drop the incoming item.
    SkipNewest,
}

/// Fixed-capacity FIFO with an overflow policy.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    policy: OverflowPolicy,
    dropped: u64,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            policy,
            dropped: 0,
        }
    }

    /// Appends `item`, applying the overflow policy when full.
    ///
    /// Returns `false` if an item was lost: either the evicted oldest one
    /// or `item` itself.
    pub fn push(&mut self, item: T) -> bool {
        if self.items.len() < self.capacity {
            self.items.push_back(item);
            return true;
        }
        self.dropped += 1;
        if self.policy == OverflowPolicy::RewriteOldest {
            self.items.pop_front();
            self.items.push_back(item);
        }
        false
    }

    /// Removes the oldest item.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Oldest item, without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// Removes every item, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }

    /// Iterates items oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter()
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when the next push overflows.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Maximum number of stored items.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overflow policy.
    #[must_use]
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Items lost to overflow since creation.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

// =============================================================================
// Consumers
// =============================================================================

/// A named subscription to a set of event names.
#[derive(Debug)]
pub struct EventConsumer {
    name: String,
    topics: HashSet<String>,
    buffer: RingBuffer<Event>,
}

impl EventConsumer {
    /// Consumer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks whether events named `event` reach this consumer.
    #[must_use]
    pub fn is_subscribed(&self, event: &str) -> bool {
        self.topics.contains(event)
    }

    /// Pending events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.buffer.iter()
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True when no event is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Overflow policy chosen at registration.
    #[must_use]
    pub fn policy(&self) -> OverflowPolicy {
        self.buffer.policy()
    }

    /// Events lost to overflow.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.buffer.dropped()
    }
}

// =============================================================================
// Bus
// =============================================================================

/// Cloneable handle for publishing from any thread.
///
/// Events wait in the shared write buffer until the loop thread calls
/// [`EventBus::flush`].
#[derive(Clone)]
pub struct EventPublisher {
    pending: Arc<Mutex<RingBuffer<Event>>>,
}

impl EventPublisher {
    /// Queues `event` for the next flush.
    ///
    /// Returns `false` if the write buffer overflowed.
    pub fn publish(&self, event: Event) -> bool {
        queue(&self.pending, event)
    }

    /// Number of queued events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPublisher")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Double-buffered event bus with named consumers and singleton slots.
pub struct EventBus {
    pending: Arc<Mutex<RingBuffer<Event>>>,
    draining: RingBuffer<Event>,
    consumers: HashMap<String, EventConsumer>,
    singletons: HashMap<String, Event>,
}

impl EventBus {
    /// Creates a bus whose async write buffer holds `capacity` events.
    /// A full write buffer evicts its oldest event.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Arc::new(Mutex::new(RingBuffer::new(
                capacity,
                OverflowPolicy::RewriteOldest,
            ))),
            draining: RingBuffer::new(capacity, OverflowPolicy::RewriteOldest),
            consumers: HashMap::new(),
            singletons: HashMap::new(),
        }
    }

    /// Handle for publishing from other threads.
    #[must_use]
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            pending: Arc::clone(&self.pending),
        }
    }

    /// Registers (or replaces) consumer `name`, subscribed to `topics`.
    pub fn register_consumer<I, S>(
        &mut self,
        name: &str,
        capacity: usize,
        policy: OverflowPolicy,
        topics: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics: HashSet<String> = topics.into_iter().map(Into::into).collect();
        tracing::debug!(
            consumer = name,
            capacity,
            ?policy,
            topics = topics.len(),
            "event consumer registered"
        );
        self.consumers.insert(
            name.to_owned(),
            EventConsumer {
                name: name.to_owned(),
                topics,
                buffer: RingBuffer::new(capacity, policy),
            },
        );
        self
    }

    /// Removes consumer `name` and its pending events.
    pub fn unregister_consumer(&mut self, name: &str) -> bool {
        self.consumers.remove(name).is_some()
    }

    /// Checks whether consumer `name` exists.
    #[must_use]
    pub fn has_consumer(&self, name: &str) -> bool {
        self.consumers.contains_key(name)
    }

    /// Consumer `name`.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownEventConsumer`] if it was never registered.
    pub fn consumer(&self, name: &str) -> EngineResult<&EventConsumer> {
        self.consumers
            .get(name)
            .ok_or_else(|| EngineError::UnknownEventConsumer(name.to_owned()))
    }

    fn consumer_mut(&mut self, name: &str) -> EngineResult<&mut EventConsumer> {
        self.consumers
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownEventConsumer(name.to_owned()))
    }

    /// Delivers `event` to every subscribed consumer right away.
    ///
    /// Loop thread only.
    pub fn publish(&mut self, event: Event) {
        fan_out(&mut self.consumers, event);
    }

    /// Queues `event` for the next [`EventBus::flush`].
    ///
    /// Returns `false` if the write buffer overflowed.
    pub fn publish_async(&self, event: Event) -> bool {
        queue(&self.pending, event)
    }

    /// Swaps the write and read buffers, then delivers every swapped event
    /// in FIFO order. Returns how many events were delivered.
    pub fn flush(&mut self) -> usize {
        {
            let mut pending = self.pending.lock();
            mem::swap(&mut *pending, &mut self.draining);
        }
        let mut flushed = 0;
        for event in self.draining.drain() {
            fan_out(&mut self.consumers, event);
            flushed += 1;
        }
        flushed
    }

    /// Checks whether consumer `name` has pending events.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownEventConsumer`] if it was never registered.
    pub fn has_events(&self, name: &str) -> EngineResult<bool> {
        Ok(!self.consumer(name)?.is_empty())
    }

    /// Takes the oldest pending event of consumer `name`.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownEventConsumer`] if it was never registered.
    pub fn consume(&mut self, name: &str) -> EngineResult<Option<Event>> {
        Ok(self.consumer_mut(name)?.buffer.pop())
    }

    /// Takes every pending event of consumer `name`, oldest first.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownEventConsumer`] if it was never registered.
    pub fn drain(&mut self, name: &str) -> EngineResult<Vec<Event>> {
        Ok(self.consumer_mut(name)?.buffer.drain().collect())
    }

    /// Events consumer `name` lost to overflow.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownEventConsumer`] if it was never registered.
    pub fn dropped_count(&self, name: &str) -> EngineResult<u64> {
        Ok(self.consumer(name)?.dropped_count())
    }

    /// Stores `event` in the singleton slot of its name, replacing any
    /// previous value.
    pub fn set_singleton_event(&mut self, event: Event) {
        self.singletons.insert(event.name().to_owned(), event);
    }

    /// Takes and clears singleton event `name`.
    pub fn take_singleton_event(&mut self, name: &str) -> Option<Event> {
        self.singletons.remove(name)
    }

    /// Singleton event `name`, left in place.
    #[must_use]
    pub fn peek_singleton_event(&self, name: &str) -> Option<&Event> {
        self.singletons.get(name)
    }

    /// Number of events waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending())
            .field("consumers", &self.consumers.len())
            .field("singletons", &self.singletons.len())
            .finish()
    }
}

/// Pushes onto the shared write buffer. The oldest event is evicted on
/// overflow.
fn queue(pending: &Mutex<RingBuffer<Event>>, event: Event) -> bool {
    let mut pending = pending.lock();
    let name = event.name().to_owned();
    let stored = pending.push(event);
    if !stored {
        tracing::warn!(
            event = name.as_str(),
            dropped = pending.dropped(),
            "event write buffer overflowed"
        );
    }
    stored
}

fn fan_out(consumers: &mut HashMap<String, EventConsumer>, event: Event) {
    for consumer in consumers.values_mut() {
        if consumer.is_subscribed(event.name()) && !consumer.buffer.push(event.clone()) {
            tracing::warn!(
                consumer = consumer.name.as_str(),
                event = event.name(),
                policy = ?consumer.buffer.policy(),
                "event consumer overflowed"
            );
        }
    }
}
