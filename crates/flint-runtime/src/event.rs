//! Game events routed between entities

use flint_core::{EntityId, NameHash, ParamMap, Variant};

/// An event sent by an entity, identified by the hash of its name
#[derive(Debug, Clone, PartialEq)]
pub struct GameEvent {
    pub kind: NameHash,
    pub sender: EntityId,
    pub params: ParamMap,
}

impl GameEvent {
    pub fn new(kind: NameHash, sender: EntityId) -> Self {
        Self {
            kind,
            sender,
            params: ParamMap::new(),
        }
    }

    /// Builder-style parameter insertion
    pub fn with_param(mut self, key: NameHash, value: impl Into<Variant>) -> Self {
        self.params.insert(key, value.into());
        self
    }

    pub fn param(&self, key: NameHash) -> Option<&Variant> {
        self.params.get(&key)
    }
}
