//! Animator templates: shared, named state machines
//!
//! A template owns its states and a cache of animation lookup tables, one
//! per animation set it has been paired with. Templates are authored with
//! [`AnimatorTemplate::add_state`] and [`AnimatorTemplate::apply_event_to_states`],
//! then baked once to resolve transition targets.

use crate::action::ActionRegistry;
use crate::authoring::{EventSpec, StateSpec};
use crate::lookup::{AnimSetTable, AnimationSetDesc};
use crate::names::{events, ALL_STATES};
use crate::state::AnimatorState;
use crate::transition::{Guard, Transition};
use flint_core::{FlintError, NameHash, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Write;
use std::ops::Deref;
use std::sync::Arc;

/// A transition whose target state did not exist when the template was baked
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedTransition {
    pub state: String,
    pub event: NameHash,
    pub target: NameHash,
}

/// Outcome of [`AnimatorTemplate::bake`]
#[derive(Debug, Clone, Default)]
pub struct BakeReport {
    pub unresolved: Vec<UnresolvedTransition>,
}

impl BakeReport {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Turn the first unresolved reference into an error
    pub fn into_result(self) -> Result<()> {
        match self.unresolved.into_iter().next() {
            None => Ok(()),
            Some(u) => Err(FlintError::UnresolvedState {
                from: u.state,
                event: u.event.to_string(),
                state: u.target.to_string(),
            }),
        }
    }
}

#[derive(Debug)]
pub struct AnimatorTemplate {
    name: String,
    hash: NameHash,
    base: NameHash,
    states: Vec<AnimatorState>,
    state_hashes: Vec<NameHash>,
    baked: bool,
    /// Edges dropped by re-bakes during authoring, reported by the next [`AnimatorTemplate::bake`]
    unresolved: Vec<UnresolvedTransition>,
    lookup: RwLock<HashMap<NameHash, Arc<AnimSetTable>>>,
}

impl Clone for AnimatorTemplate {
    /// Copies states only; lookup tables are rebuilt on demand
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            hash: self.hash,
            base: self.base,
            states: self.states.clone(),
            state_hashes: self.state_hashes.clone(),
            baked: self.baked,
            unresolved: self.unresolved.clone(),
            lookup: RwLock::new(HashMap::new()),
        }
    }
}

impl AnimatorTemplate {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hash: NameHash::new(name),
            base: NameHash::ZERO,
            states: Vec::new(),
            state_hashes: Vec::new(),
            baked: false,
            unresolved: Vec::new(),
            lookup: RwLock::new(HashMap::new()),
        }
    }

    /// A copy named `name` whose base is this template
    pub fn derive(&self, name: &str) -> Self {
        let mut copy = self.clone();
        copy.rename(name);
        copy.base = self.hash;
        copy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> NameHash {
        self.hash
    }

    /// Template this one was derived from, zero if none
    pub fn base(&self) -> NameHash {
        self.base
    }

    pub(crate) fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.hash = NameHash::new(name);
    }

    pub fn is_baked(&self) -> bool {
        self.baked
    }

    pub fn states(&self) -> &[AnimatorState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Declare a state, replacing one with the same name in place. Returns its index.
    pub fn add_state(&mut self, spec: &StateSpec, actions: &ActionRegistry) -> usize {
        let state = AnimatorState::new(
            &spec.name,
            &spec.keywords,
            spec.directional,
            spec.tick_delay,
            actions.resolve_list(&spec.actions),
        );
        let index = match self.state_index(state.hash()) {
            Some(index) => {
                self.states[index] = state;
                index
            }
            None => {
                self.state_hashes.push(state.hash());
                self.states.push(state);
                self.states.len() - 1
            }
        };
        self.lookup.get_mut().clear();
        self.rebake_if_baked();
        index
    }

    /// Add (or remove) one event's transition on every state named in `spec.apply_to`.
    ///
    /// Without a next state the transition loops back to the state it is added to.
    /// The next state itself also receives the event as its entry event.
    pub fn apply_event_to_states(&mut self, spec: &EventSpec, actions: &ActionRegistry) {
        let event = NameHash::new(spec.event.trim());
        let sender = spec.sender;
        let guard = Guard::parse(&spec.condition);
        let next_name = spec.next_state.trim();
        let next = NameHash::new(next_name);
        let list: Arc<[_]> = Arc::from(actions.resolve_list(&spec.actions));
        let make = |target: NameHash| Transition::new(event, sender, guard, target, list.clone());

        if !next.is_zero() && event != events::END_LOOP {
            match self.state_index(next) {
                Some(index) => {
                    let state = &mut self.states[index];
                    if state.transitions().find(event, sender).is_none() {
                        state.set_entry_event(event);
                        state.add_transition(make(next));
                    }
                }
                None => log::warn!(
                    "template '{}': event '{}' leads to undeclared state '{}'",
                    self.name,
                    spec.event,
                    next_name
                ),
            }
        }

        for token in spec.apply_to.split(';').map(str::trim).filter(|t| !t.is_empty()) {
            if token.eq_ignore_ascii_case(ALL_STATES) {
                for state in &mut self.states {
                    let target = if next.is_zero() { state.hash() } else { next };
                    state.add_transition(make(target));
                }
            } else if let Some(name) = token.strip_prefix('!') {
                match self.state_index(NameHash::new(name.trim())) {
                    Some(index) => {
                        self.states[index].remove_transition(event, sender);
                    }
                    None => log::warn!("template '{}': no state '{}' to remove '{}' from", self.name, name, spec.event),
                }
            } else {
                match self.state_index(NameHash::new(token)) {
                    Some(index) => {
                        let state = &mut self.states[index];
                        let target = if next.is_zero() { state.hash() } else { next };
                        state.add_transition(make(target));
                    }
                    None => log::error!("template '{}': unknown state '{}' for event '{}'", self.name, token, spec.event),
                }
            }
        }
        self.rebake_if_baked();
    }

    /// Resolve every transition's target index and refresh reachable sets.
    ///
    /// Transitions whose target was never declared are removed and reported,
    /// together with those dropped by re-bakes since the last call.
    pub fn bake(&mut self) -> BakeReport {
        let index: HashMap<NameHash, usize> = self
            .state_hashes
            .iter()
            .enumerate()
            .map(|(i, h)| (*h, i))
            .collect();
        let mut report = BakeReport {
            unresolved: std::mem::take(&mut self.unresolved),
        };
        for state in &mut self.states {
            let dropped = state.transitions_mut().resolve_targets(|h| index.get(&h).copied());
            for t in dropped {
                log::error!(
                    "template '{}': state '{}' drops transition on {} to unknown state {}",
                    self.name,
                    state.name(),
                    t.event,
                    t.next_state_name
                );
                report.unresolved.push(UnresolvedTransition {
                    state: state.name().to_string(),
                    event: t.event,
                    target: t.next_state_name,
                });
            }
            state.compute_reachable();
        }
        self.baked = true;
        report
    }

    fn rebake_if_baked(&mut self) {
        if self.baked {
            self.unresolved = self.bake().unresolved;
        }
    }

    pub fn state(&self, hash: NameHash) -> Option<&AnimatorState> {
        self.state_index(hash).map(|i| &self.states[i])
    }

    pub fn state_at(&self, index: usize) -> Option<&AnimatorState> {
        self.states.get(index)
    }

    pub fn state_index(&self, hash: NameHash) -> Option<usize> {
        self.state_hashes.iter().position(|h| *h == hash)
    }

    /// Index of the first state entered through `event`
    pub fn state_by_entry_event(&self, event: NameHash) -> Option<usize> {
        if event.is_zero() {
            return None;
        }
        self.states.iter().position(|s| s.entry_event() == event)
    }

    /// Build the lookup table for `set` if it has not been seen. Returns true if built.
    pub fn add_animation_set(&self, set: &AnimationSetDesc) -> bool {
        let hash = set.hash();
        if self.lookup.read().contains_key(&hash) {
            return false;
        }
        let table = Arc::new(AnimSetTable::build(set, &self.states));
        let mut lookup = self.lookup.write();
        if lookup.contains_key(&hash) {
            return false;
        }
        lookup.insert(hash, table);
        true
    }

    /// Lookup table for `set`, built on first use
    pub fn animation_table(&self, set: &AnimationSetDesc) -> Arc<AnimSetTable> {
        let hash = set.hash();
        if let Some(table) = self.lookup.read().get(&hash) {
            return table.clone();
        }
        let table = Arc::new(AnimSetTable::build(set, &self.states));
        self.lookup.write().entry(hash).or_insert(table).clone()
    }

    pub fn animation_set_count(&self) -> usize {
        self.lookup.read().len()
    }

    /// Human-readable dump of states and transitions
    pub fn describe(&self, names: &flint_core::NameTable) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "template {} ({} states)", self.name, self.states.len());
        for (i, state) in self.states.iter().enumerate() {
            let _ = writeln!(
                out,
                "  [{i}] {} keywords='{}' tick={} directional={} entry={}",
                state.name(),
                state.keywords(),
                state.tick_delay(),
                state.is_directional(),
                names.describe(state.entry_event())
            );
            for t in state.transitions().iter() {
                let target = t
                    .next_state
                    .and_then(|n| self.states.get(n))
                    .map(|s| s.name().to_string())
                    .unwrap_or_else(|| names.describe(t.next_state_name));
                let _ = writeln!(
                    out,
                    "      {}@{} -> {} [{}]",
                    names.describe(t.event),
                    t.sender,
                    target,
                    crate::action::actions_to_spec(&t.actions)
                );
            }
        }
        out
    }
}

/// Either a template shared through the catalog or a private copy owned by one instance
#[derive(Debug)]
pub enum TemplateHandle {
    Shared(Arc<AnimatorTemplate>),
    Owned(Box<AnimatorTemplate>),
}

impl TemplateHandle {
    pub fn is_custom(&self) -> bool {
        matches!(self, TemplateHandle::Owned(_))
    }

    /// Mutable access, only for an owned copy
    pub fn owned_mut(&mut self) -> Option<&mut AnimatorTemplate> {
        match self {
            TemplateHandle::Owned(template) => Some(&mut **template),
            TemplateHandle::Shared(_) => None,
        }
    }
}

impl Deref for TemplateHandle {
    type Target = AnimatorTemplate;

    fn deref(&self) -> &AnimatorTemplate {
        match self {
            TemplateHandle::Shared(template) => &**template,
            TemplateHandle::Owned(template) => &**template,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::ClipDesc;
    use crate::transition::SenderScope;

    const ON_WALK: NameHash = NameHash::new("Event_OnWalk");

    fn registry() -> ActionRegistry {
        ActionRegistry::with_builtins()
    }

    fn walker() -> AnimatorTemplate {
        let actions = registry();
        let mut template = AnimatorTemplate::new("Walker");
        template.add_state(&StateSpec::new("State_Idle", "idle"), &actions);
        template.add_state(&StateSpec::new("State_Walk", "walk"), &actions);
        template.add_state(&StateSpec::new("State_Jump", "jump").tick(1.0), &actions);
        template.apply_event_to_states(
            &EventSpec::new("Event_OnWalk", "State_Idle;State_Jump").next("State_Walk"),
            &actions,
        );
        template
    }

    #[test]
    fn add_state_replaces_in_place() {
        let actions = registry();
        let mut template = walker();
        template.bake();
        let target = template.state(NameHash::new("State_Idle")).unwrap().transitions().get(0).unwrap().next_state;
        assert_eq!(target, Some(1));

        let index = template.add_state(&StateSpec::new("State_Walk", "walk;run").tick(0.3), &actions);
        assert_eq!(index, 1);
        assert_eq!(template.len(), 3);
        assert_eq!(template.state_at(1).unwrap().keywords(), "walk;run");
        let target = template.state(NameHash::new("State_Idle")).unwrap().transitions().get(0).unwrap().next_state;
        assert_eq!(target, Some(1));
    }

    #[test]
    fn apply_event_sets_entry_event_and_self_loop() {
        let template = walker();
        let walk = template.state(NameHash::new("State_Walk")).unwrap();
        assert_eq!(walk.entry_event(), ON_WALK);
        let t = walk.transitions().get(walk.transitions().find(ON_WALK, SenderScope::Entity).unwrap()).unwrap();
        assert_eq!(t.next_state_name, walk.hash());
        assert_eq!(template.state_by_entry_event(ON_WALK), Some(1));
    }

    #[test]
    fn apply_event_all_and_remove() {
        let actions = registry();
        let mut template = walker();
        template.apply_event_to_states(&EventSpec::new("Event_OnFall", "ALL").actions("AAction_ChangeAnim"), &actions);
        let fall = NameHash::new("Event_OnFall");
        for state in template.states() {
            let idx = state.transitions().find(fall, SenderScope::Entity).unwrap();
            let t = state.transitions().get(idx).unwrap();
            assert_eq!(t.next_state_name, state.hash());
            assert_eq!(t.actions.len(), 1);
        }

        template.apply_event_to_states(&EventSpec::new("Event_OnFall", "!State_Jump"), &actions);
        assert!(template.state(NameHash::new("State_Jump")).unwrap().transitions().find(fall, SenderScope::Entity).is_none());
        assert!(template.state(NameHash::new("State_Idle")).unwrap().transitions().contains_event(fall));
    }

    #[test]
    fn end_loop_never_becomes_entry_event() {
        let actions = registry();
        let mut template = walker();
        template.apply_event_to_states(&EventSpec::new("AEvent_EndLoop", "State_Jump").next("State_Idle"), &actions);
        let idle = template.state(NameHash::new("State_Idle")).unwrap();
        assert!(idle.entry_event().is_zero());
        assert!(!idle.transitions().contains_event(events::END_LOOP));
    }

    #[test]
    fn no_duplicate_transitions_after_repeated_adds() {
        let actions = registry();
        let mut template = walker();
        for next in ["State_Jump", "State_Idle", "State_Jump"] {
            template.apply_event_to_states(
                &EventSpec::new("Event_OnJump", "State_Walk").next(next).condition("MaxTickDelay"),
                &actions,
            );
        }
        let walk = template.state(NameHash::new("State_Walk")).unwrap();
        let jump_event = NameHash::new("Event_OnJump");
        let count = walk.transitions().iter().filter(|t| t.event == jump_event).count();
        assert_eq!(count, 1);
        let t = walk.transitions().get(walk.transitions().find_event(jump_event).unwrap()).unwrap();
        assert_eq!(t.next_state_name, NameHash::new("State_Jump"));
    }

    #[test]
    fn bake_resolves_forward_references_and_drops_unknown() {
        let actions = registry();
        let mut template = AnimatorTemplate::new("Forward");
        template.add_state(&StateSpec::new("State_A", "a"), &actions);
        // State_B does not exist yet
        template.apply_event_to_states(&EventSpec::new("Event_Go", "State_A").next("State_B"), &actions);
        template.add_state(&StateSpec::new("State_B", "b"), &actions);
        template.apply_event_to_states(&EventSpec::new("Event_Lost", "State_A").next("State_Nowhere"), &actions);

        let report = template.bake();
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].target, NameHash::new("State_Nowhere"));
        assert!(report.clone().into_result().is_err());

        let a = template.state(NameHash::new("State_A")).unwrap();
        assert_eq!(a.transitions().len(), 1);
        assert_eq!(a.transitions().get(0).unwrap().next_state, Some(1));
        assert!(a.can_transit_to(NameHash::new("State_B")));
    }

    #[test]
    fn edges_dropped_after_bake_are_reported_by_next_bake() {
        let actions = registry();
        let mut template = walker();
        assert!(template.bake().is_clean());

        template.apply_event_to_states(&EventSpec::new("Event_Lost", "State_Idle").next("State_Nowhere"), &actions);
        let idle = template.state(NameHash::new("State_Idle")).unwrap();
        assert!(!idle.transitions().contains_event(NameHash::new("Event_Lost")));

        let report = template.bake();
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].target, NameHash::new("State_Nowhere"));
        assert!(template.bake().is_clean());
    }

    #[test]
    fn authoring_after_bake_refreshes_reachability() {
        let actions = registry();
        let mut template = walker();
        assert!(template.bake().is_clean());
        let idle = NameHash::new("State_Idle");
        assert!(!template.state(idle).unwrap().can_transit_to(NameHash::new("State_Jump")));
        template.apply_event_to_states(&EventSpec::new("Event_OnJump", "State_Idle").next("State_Jump"), &actions);
        assert!(template.state(idle).unwrap().can_transit_to(NameHash::new("State_Jump")));
    }

    #[test]
    fn animation_tables_are_cached_per_set() {
        let template = walker();
        let set = AnimationSetDesc::new("hero", vec![vec![ClipDesc::new("idle1", 1.0), ClipDesc::new("walk", 0.5)]]);
        assert!(template.add_animation_set(&set));
        assert!(!template.add_animation_set(&set));
        let table = template.animation_table(&set);
        assert_eq!(table.clips(0, 1)[0].clip_index, 1);
        assert_eq!(template.animation_set_count(), 1);

        let copy = template.derive("Walker_Custom");
        assert_eq!(copy.animation_set_count(), 0);
        assert_eq!(copy.base(), template.hash());
        assert_eq!(copy.len(), template.len());
    }

    #[test]
    fn handle_only_exposes_owned_for_mutation() {
        let shared = TemplateHandle::Shared(Arc::new(walker()));
        let mut owned = TemplateHandle::Owned(Box::new(walker()));
        assert!(!shared.is_custom());
        assert!(owned.is_custom());
        assert!(owned.owned_mut().is_some());
        assert_eq!(shared.len(), 3);
    }
}
