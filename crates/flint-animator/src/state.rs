//! Animator states: one node of a template's state machine

use crate::action::Action;
use crate::transition::{SenderScope, Transition, TransitionTable};
use flint_core::NameHash;
use std::collections::HashSet;
use std::sync::Arc;

/// A named node in the state machine.
///
/// Candidate clips are found by matching `keywords` against the clip names
/// of an animation set. Transitions reference other states by index once
/// the owning template is baked.
#[derive(Debug, Clone)]
pub struct AnimatorState {
    name: String,
    hash: NameHash,
    keywords: String,
    directional: bool,
    tick_delay: f32,
    entry_actions: Arc<[Action]>,
    entry_event: NameHash,
    transitions: TransitionTable,
    reachable: HashSet<NameHash>,
}

impl AnimatorState {
    pub fn new(
        name: &str,
        keywords: &str,
        directional: bool,
        tick_delay: f32,
        entry_actions: Vec<Action>,
    ) -> Self {
        Self {
            name: name.to_string(),
            hash: NameHash::new(name),
            keywords: keywords.to_string(),
            directional,
            tick_delay,
            entry_actions: Arc::from(entry_actions),
            entry_event: NameHash::ZERO,
            transitions: TransitionTable::new(),
            reachable: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> NameHash {
        self.hash
    }

    /// Raw `;`-separated keyword list
    pub fn keywords(&self) -> &str {
        &self.keywords
    }

    /// Non-empty keywords in authoring order
    pub fn keyword_list(&self) -> impl Iterator<Item = &str> {
        self.keywords.split(';').map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn is_directional(&self) -> bool {
        self.directional
    }

    /// Seconds the state lasts before its timers fire
    pub fn tick_delay(&self) -> f32 {
        self.tick_delay
    }

    pub fn entry_actions(&self) -> &Arc<[Action]> {
        &self.entry_actions
    }

    /// Event whose transitions lead into this state, used to pick a state from movement
    pub fn entry_event(&self) -> NameHash {
        self.entry_event
    }

    pub(crate) fn set_entry_event(&mut self, event: NameHash) {
        self.entry_event = event;
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    pub(crate) fn transitions_mut(&mut self) -> &mut TransitionTable {
        &mut self.transitions
    }

    pub fn add_transition(&mut self, transition: Transition) -> usize {
        self.transitions.add(transition)
    }

    pub fn remove_transition(&mut self, event: NameHash, sender: SenderScope) -> Option<Transition> {
        self.transitions.remove(event, sender)
    }

    /// Rebuild the reachable-state set from the transition table
    pub fn compute_reachable(&mut self) {
        self.reachable = self.transitions.reachable_states().into_iter().collect();
    }

    pub fn can_transit_to(&self, state: NameHash) -> bool {
        self.reachable.contains(&state)
    }

    pub fn reachable_states(&self) -> &HashSet<NameHash> {
        &self.reachable
    }
}
