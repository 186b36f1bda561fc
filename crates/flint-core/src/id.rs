//! Entity identifiers assigned by the host

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a game entity.
///
/// The animator never allocates ids itself: the host hands one to each
/// animator instance and uses the same ids as event senders on the bus.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        let id = EntityId::from_raw(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(format!("{id:?}"), "EntityId(42)");
    }

    #[test]
    fn test_serde_transparent() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            id: EntityId,
        }
        let text = toml::to_string(&Wrapper { id: EntityId::from_raw(7) }).unwrap();
        assert_eq!(text.trim(), "id = 7");
    }
}
