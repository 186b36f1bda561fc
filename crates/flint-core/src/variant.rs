//! Typed parameter values carried by events and actions

use crate::hash::NameHash;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved key for an action's unnamed parameter
pub const DATA_KEY: NameHash = NameHash::new("datas");

/// Ordered parameter map keyed by name hash
pub type ParamMap = IndexMap<NameHash, Variant>;

/// A dynamically typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Variant {
    Bool(bool),
    Int(i32),
    Float(f32),
    Hash(NameHash),
    Str(String),
}

impl Variant {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            Variant::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Integer view; floats truncate and strings are parsed
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Variant::Int(i) => Some(*i),
            Variant::Float(f) => Some(*f as i32),
            Variant::Bool(b) => Some(i32::from(*b)),
            Variant::Str(s) => s.trim().parse().ok(),
            Variant::Hash(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Variant::Float(f) => Some(*f),
            Variant::Int(i) => Some(*i as f32),
            Variant::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Hash view; strings are hashed, ints are taken as raw hash values
    pub fn as_hash(&self) -> Option<NameHash> {
        match self {
            Variant::Hash(h) => Some(*h),
            Variant::Str(s) => Some(NameHash::new(s)),
            Variant::Int(i) => Some(NameHash::from_raw(*i as u32)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Bool(b) => write!(f, "{b}"),
            Variant::Int(i) => write!(f, "{i}"),
            Variant::Float(v) => write!(f, "{v}"),
            Variant::Hash(h) => write!(f, "{}", h.value()),
            Variant::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int(v)
    }
}

impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Variant::Float(v)
    }
}

impl From<NameHash> for Variant {
    fn from(v: NameHash) -> Self {
        Variant::Hash(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::Str(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coercions() {
        assert_eq!(Variant::Float(2.9).as_int(), Some(2));
        assert_eq!(Variant::Str(" 12 ".into()).as_int(), Some(12));
        assert_eq!(Variant::Int(3).as_float(), Some(3.0));
        assert_eq!(Variant::Bool(true).as_float(), None);
        assert_eq!(
            Variant::Str("Effect_Dust".into()).as_hash(),
            Some(NameHash::new("effect_dust"))
        );
        assert_eq!(Variant::Int(0).as_bool(), Some(false));
    }

    #[test]
    fn test_param_map_keeps_insertion_order() {
        let mut params = ParamMap::new();
        params.insert(NameHash::new("b"), Variant::from(1));
        params.insert(DATA_KEY, Variant::from("x"));
        params.insert(NameHash::new("a"), Variant::from(true));
        let keys: Vec<_> = params.keys().copied().collect();
        assert_eq!(keys, vec![NameHash::new("b"), DATA_KEY, NameHash::new("a")]);
    }
}
