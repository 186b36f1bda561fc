//! Event bus for routing game events between entities

use crate::event::GameEvent;
use flint_core::{EntityId, NameHash, ParamMap};
use std::collections::{HashMap, HashSet};

/// Which senders a subscription listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// Only events sent by this entity
    Entity(EntityId),
    /// Events from any sender
    Any,
}

impl EventSource {
    fn matches(&self, sender: EntityId) -> bool {
        match self {
            EventSource::Entity(id) => *id == sender,
            EventSource::Any => true,
        }
    }
}

/// Outgoing event queue plus the subscription registry.
///
/// Components push events as they happen; the host drains the queue once
/// per frame and delivers each event to `subscribers(&event)`.
pub struct EventBus {
    events: Vec<GameEvent>,
    subscriptions: HashMap<EntityId, HashSet<(EventSource, NameHash)>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            subscriptions: HashMap::new(),
        }
    }

    /// Push an event onto the bus
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Send `kind` on behalf of `sender`
    pub fn send(&mut self, kind: NameHash, sender: EntityId, params: ParamMap) {
        self.events.push(GameEvent {
            kind,
            sender,
            params,
        });
    }

    /// Drain all events from the bus, returning them
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Check if there are pending events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Subscribe `subscriber` to `event` from `source`. Returns false if already subscribed.
    pub fn subscribe(&mut self, subscriber: EntityId, source: EventSource, event: NameHash) -> bool {
        let added = self
            .subscriptions
            .entry(subscriber)
            .or_default()
            .insert((source, event));
        if added {
            log::trace!("{subscriber} subscribed to {event} from {source:?}");
        }
        added
    }

    /// Remove one subscription. Returns false if it did not exist.
    pub fn unsubscribe(
        &mut self,
        subscriber: EntityId,
        source: EventSource,
        event: NameHash,
    ) -> bool {
        let Some(set) = self.subscriptions.get_mut(&subscriber) else {
            return false;
        };
        let removed = set.remove(&(source, event));
        if set.is_empty() {
            self.subscriptions.remove(&subscriber);
        }
        removed
    }

    pub fn is_subscribed(&self, subscriber: EntityId, source: EventSource, event: NameHash) -> bool {
        self.subscriptions
            .get(&subscriber)
            .is_some_and(|set| set.contains(&(source, event)))
    }

    /// Drop every subscription held by `subscriber`, returning how many were removed
    pub fn unsubscribe_all(&mut self, subscriber: EntityId) -> usize {
        self.subscriptions
            .remove(&subscriber)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    /// Number of subscriptions held by `subscriber`
    pub fn subscription_count(&self, subscriber: EntityId) -> usize {
        self.subscriptions.get(&subscriber).map_or(0, |set| set.len())
    }

    /// Entities that should receive `event`, in ascending id order
    pub fn subscribers(&self, event: &GameEvent) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = self
            .subscriptions
            .iter()
            .filter(|(_, set)| {
                set.iter()
                    .any(|(source, kind)| *kind == event.kind && source.matches(event.sender))
            })
            .map(|(id, _)| *id)
            .collect();
        out.sort();
        out
    }
}
