//! Game lifecycle events and their listener registry

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameEvent {
    /// A new run began (every restart)
    GameStarted,
    /// The ship hit terrain
    SpaceshipCrash,
}

/// Receives game events on the simulation thread.
pub trait GameEventListener: Send {
    fn on_event(&mut self, event: GameEvent);
}

impl<F> GameEventListener for F
where
    F: FnMut(GameEvent) + Send,
{
    fn on_event(&mut self, event: GameEvent) {
        self(event)
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listeners called synchronously, in registration order.
///
/// A panicking listener is logged and skipped; the others still run and
/// the tick carries on.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Box<dyn GameEventListener>)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl GameEventListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn emit(&mut self, event: GameEvent) {
        for (id, listener) in &mut self.listeners {
            let delivered = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if delivered.is_err() {
                log::error!("Listener {:?} panicked handling {:?}", id, event);
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
