use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::mpsc;

use crate::models::BrowserEvent;

pub type ListenerId = u64;

pub struct Subscription {
    pub id: ListenerId,
    pub events: mpsc::UnboundedReceiver<BrowserEvent>,
}

#[derive(Default)]
struct BusInner {
    next_id: ListenerId,
    listeners: HashMap<ListenerId, mpsc::UnboundedSender<BrowserEvent>>,
}

/// Typed event emitter between the host adapter and its listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, events) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, sender);
        Subscription { id, events }
    }

    /// Dropping the sender lets the listener drain what is already queued.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.lock().listeners.remove(&id).is_some()
    }

    /// Delivers to every live listener and returns how many received it.
    pub fn emit(&self, event: BrowserEvent) -> usize {
        let mut inner = self.lock();
        inner
            .listeners
            .retain(|_, sender| sender.send(event.clone()).is_ok());
        inner.listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
