// ABOUTME: Observable state store (component I): fan-out of state snapshots to any number of observers
// ABOUTME: Equality-gated, serialized writes; a fresh subscriber is replayed the current value immediately

use std::sync::{Arc, Mutex};

use crate::model::{BufferStats, ConnectionState, ControllerState, Metadata, StreamDescriptor};

/// Receives values from one observable slot. Implementations must not block:
/// they are invoked from the writer's context (§4.9).
pub trait Observer<T>: Send + Sync {
    fn on_change(&self, value: &T);
}

impl<T, F> Observer<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn on_change(&self, value: &T) {
        self(value)
    }
}

struct SlotInner<T> {
    current: T,
    observers: Vec<Arc<dyn Observer<T>>>,
}

/// One observable value slot: current snapshot plus its subscriber list.
///
/// Writes are structural-equality-gated: setting the same value again is a
/// no-op and does not notify. A subscriber always sees the current value
/// immediately, then every subsequent distinct value, in order. The
/// compare-swap-and-notify sequence runs under a single lock so two
/// concurrent writers can never interleave and deliver values out of order.
pub struct Slot<T> {
    inner: Mutex<SlotInner<T>>,
}

impl<T: Clone + PartialEq> Slot<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                current: initial,
                observers: Vec::new(),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.lock().expect("slot mutex poisoned").current.clone()
    }

    /// Subscribes `observer`, replays the current value, then returns.
    pub fn subscribe(&self, observer: Arc<dyn Observer<T>>) {
        let mut inner = self.inner.lock().expect("slot mutex poisoned");
        observer.on_change(&inner.current);
        inner.observers.push(observer);
    }

    /// Sets a new value. No-op (no notification) if structurally equal to
    /// the current value.
    pub fn set(&self, value: T) {
        let mut inner = self.inner.lock().expect("slot mutex poisoned");
        if inner.current == value {
            return;
        }
        inner.current = value.clone();
        for observer in inner.observers.iter() {
            observer.on_change(&value);
        }
    }
}

impl<T: Clone + PartialEq + Default> Default for Slot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// The authoritative snapshot store (I). External observers read exclusively
/// through this type; nothing outside the session state machine (F) writes
/// to it directly.
#[derive(Default)]
pub struct ObservableStore {
    pub connection: Slot<ConnectionState>,
    pub stream: Slot<StreamDescriptor>,
    pub metadata: Slot<Metadata>,
    pub buffer_stats: Slot<BufferStats>,
    pub controller: Slot<ControllerState>,
}

impl ObservableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every slot to its initial snapshot (§4.6 `disconnect`).
    pub fn reset(&self) {
        self.connection.set(ConnectionState::default());
        self.stream.set(StreamDescriptor::default());
        self.metadata.set(Metadata::default());
        self.buffer_stats.set(BufferStats::default());
        self.controller.set(ControllerState::default());
    }
}
