//! Case-insensitive name hashing for states, events, and actions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A 32-bit SDBM hash of a name, folded to lowercase.
///
/// Every state, event, action, and parameter key in the animator is
/// addressed by its `NameHash`. Hashes are computable in `const` context
/// so reserved names can be declared as constants.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameHash(u32);

impl NameHash {
    /// The hash of the empty string
    pub const ZERO: NameHash = NameHash(0);

    /// Hash a name
    pub const fn new(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash: u32 = 0;
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i].to_ascii_lowercase() as u32;
            hash = c
                .wrapping_add(hash << 6)
                .wrapping_add(hash << 16)
                .wrapping_sub(hash);
            i += 1;
        }
        Self(hash)
    }

    /// Wrap a raw hash value (for deserialization/network input)
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw u32 value
    pub const fn value(&self) -> u32 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<&str> for NameHash {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Debug for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameHash({:#010x})", self.0)
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.0)
    }
}

/// Reverse lookup from hash to the first name registered for it.
///
/// Only used for diagnostics; nothing in the animator depends on a name
/// being registered.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashMap<NameHash, String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name, returning its hash. Re-registering keeps the first spelling.
    pub fn register(&mut self, name: &str) -> NameHash {
        let hash = NameHash::new(name);
        self.names.entry(hash).or_insert_with(|| name.to_string());
        hash
    }

    pub fn get(&self, hash: NameHash) -> Option<&str> {
        self.names.get(&hash).map(|s| s.as_str())
    }

    /// Name for display: the registered spelling, or the hex hash
    pub fn describe(&self, hash: NameHash) -> String {
        match self.get(hash) {
            Some(name) => name.to_string(),
            None => hash.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistent_hashing() {
        assert_eq!(NameHash::new("State_Appear"), NameHash::new("State_Appear"));
        assert_ne!(NameHash::new("State_Appear"), NameHash::new("State_Default"));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(NameHash::new("AEvent_EndLoop"), NameHash::new("aevent_endloop"));
        assert_eq!(NameHash::new("ALL"), NameHash::new("all"));
    }

    #[test]
    fn test_known_values() {
        assert!(NameHash::new("").is_zero());
        assert_eq!(NameHash::new("a").value(), 97);
        assert_eq!(NameHash::new("ab").value(), 98 + (97 << 6) + (97 << 16) - 97);
    }

    #[test]
    fn test_const_evaluation() {
        const IDLE: NameHash = NameHash::new("idle");
        assert_eq!(IDLE, NameHash::from("IDLE"));
    }

    #[test]
    fn test_name_table() {
        let mut table = NameTable::new();
        let h = table.register("State_Walk");
        table.register("STATE_WALK");
        assert_eq!(table.get(h), Some("State_Walk"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.describe(NameHash::from_raw(0xdead)), "#0000dead");
    }
}
