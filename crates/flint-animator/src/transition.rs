//! Per-state transition tables

use crate::action::Action;
use flint_core::NameHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which senders of an event a transition listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SenderScope {
    /// The entity itself
    #[default]
    Entity,
    /// The entity's owner (e.g. the rider of a mount)
    Owner,
    /// Any sender
    All,
}

impl SenderScope {
    pub const COUNT: usize = 3;

    pub fn index(&self) -> usize {
        match self {
            SenderScope::Entity => 0,
            SenderScope::Owner => 1,
            SenderScope::All => 2,
        }
    }

    /// Parse the `@Sender` suffix of an event name. Empty or unrecognized text means `Entity`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("owner") {
            SenderScope::Owner
        } else if s.eq_ignore_ascii_case("all") {
            SenderScope::All
        } else {
            SenderScope::Entity
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SenderScope::Entity => "Self",
            SenderScope::Owner => "Owner",
            SenderScope::All => "All",
        }
    }
}

impl fmt::Display for SenderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `key[=value]` guard on a transition. A zero key always succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Guard {
    pub condition: NameHash,
    pub value: NameHash,
}

impl Guard {
    pub const ALWAYS: Guard = Guard {
        condition: NameHash::ZERO,
        value: NameHash::ZERO,
    };

    pub fn new(condition: NameHash, value: NameHash) -> Self {
        Self { condition, value }
    }

    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Self::ALWAYS;
        }
        match s.split_once('=') {
            Some((key, value)) => Self::new(NameHash::new(key.trim()), NameHash::new(value.trim())),
            None => Self::new(NameHash::new(s), NameHash::ZERO),
        }
    }

    pub fn is_always(&self) -> bool {
        self.condition.is_zero()
    }
}

/// An edge leaving a state: `(event, sender) -> (guard, next state, actions)`
#[derive(Debug, Clone)]
pub struct Transition {
    pub event: NameHash,
    pub sender: SenderScope,
    pub guard: Guard,
    /// Name hash of the target state
    pub next_state_name: NameHash,
    /// Index of the target state, filled in when the template is baked
    pub next_state: Option<usize>,
    pub actions: Arc<[Action]>,
}

impl Transition {
    pub fn new(
        event: NameHash,
        sender: SenderScope,
        guard: Guard,
        next_state_name: NameHash,
        actions: Arc<[Action]>,
    ) -> Self {
        Self {
            event,
            sender,
            guard,
            next_state_name,
            next_state: None,
            actions,
        }
    }
}

/// Ordered transitions of one state, at most one per `(event, sender)` pair.
///
/// `events` runs parallel to `transitions` so event scans stay on a flat
/// array of hashes.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    events: Vec<NameHash>,
    transitions: Vec<Transition>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a transition, replacing the one with the same `(event, sender)` in place.
    /// Returns the entry's index.
    pub fn add(&mut self, transition: Transition) -> usize {
        match self.find(transition.event, transition.sender) {
            Some(index) => {
                self.transitions[index] = transition;
                index
            }
            None => {
                self.events.push(transition.event);
                self.transitions.push(transition);
                self.transitions.len() - 1
            }
        }
    }

    pub fn remove(&mut self, event: NameHash, sender: SenderScope) -> Option<Transition> {
        let index = self.find(event, sender)?;
        self.events.remove(index);
        Some(self.transitions.remove(index))
    }

    pub fn find(&self, event: NameHash, sender: SenderScope) -> Option<usize> {
        self.events
            .iter()
            .zip(&self.transitions)
            .position(|(e, t)| *e == event && t.sender == sender)
    }

    /// First transition for `event`, whatever its sender scope
    pub fn find_event(&self, event: NameHash) -> Option<usize> {
        self.events.iter().position(|e| *e == event)
    }

    /// First transition for `event` that listens to a sender in `scope`.
    ///
    /// `All` transitions accept every sender; the others only their own scope.
    pub fn find_for_sender(&self, event: NameHash, scope: SenderScope) -> Option<usize> {
        self.events
            .iter()
            .zip(&self.transitions)
            .position(|(e, t)| *e == event && (t.sender == scope || t.sender == SenderScope::All))
    }

    pub fn contains_event(&self, event: NameHash) -> bool {
        self.events.contains(&event)
    }

    pub fn get(&self, index: usize) -> Option<&Transition> {
        self.transitions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Unique target state hashes, in first-seen order
    pub fn reachable_states(&self) -> Vec<NameHash> {
        let mut out: Vec<NameHash> = Vec::new();
        for t in &self.transitions {
            if !t.next_state_name.is_zero() && !out.contains(&t.next_state_name) {
                out.push(t.next_state_name);
            }
        }
        out
    }

    /// Resolve target indices with `resolve`; transitions it cannot resolve are
    /// removed and returned.
    pub(crate) fn resolve_targets(
        &mut self,
        resolve: impl Fn(NameHash) -> Option<usize>,
    ) -> Vec<Transition> {
        let mut dropped = Vec::new();
        let mut index = 0;
        while index < self.transitions.len() {
            let target = resolve(self.transitions[index].next_state_name);
            match target {
                Some(state) => {
                    self.transitions[index].next_state = Some(state);
                    index += 1;
                }
                None => {
                    self.events.remove(index);
                    dropped.push(self.transitions.remove(index));
                }
            }
        }
        dropped
    }
}
