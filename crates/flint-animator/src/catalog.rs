//! The animator catalog: actions, shared templates, and name diagnostics
//!
//! One catalog is built during setup and handed to every animator
//! instance as an `Arc<AnimatorCatalog>`. The action registry is fixed at
//! construction; templates may still be registered afterwards (load-time
//! authoring), but a registered template is never mutated again.

use crate::action::ActionRegistry;
use crate::authoring::{EventSpec, StateSpec};
use crate::names::{events, TEMPLATE_DEFAULT, TEMPLATE_EMPTY};
use crate::template::AnimatorTemplate;
use flint_core::{NameHash, NameTable};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct AnimatorCatalog {
    actions: ActionRegistry,
    templates: RwLock<HashMap<NameHash, Arc<AnimatorTemplate>>>,
    names: RwLock<NameTable>,
}

impl Default for AnimatorCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimatorCatalog {
    /// Catalog with every built-in action and the built-in templates
    pub fn new() -> Self {
        Self::with_actions(ActionRegistry::with_builtins())
    }

    pub fn with_actions(actions: ActionRegistry) -> Self {
        let catalog = Self {
            actions,
            templates: RwLock::new(HashMap::new()),
            names: RwLock::new(NameTable::new()),
        };
        catalog.register_builtin_templates();
        catalog
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Author a template from state and event declarations, without registering it
    pub fn build_template(
        &self,
        name: &str,
        states: &[StateSpec],
        events: &[EventSpec],
    ) -> AnimatorTemplate {
        let mut template = AnimatorTemplate::new(name);
        for state in states {
            template.add_state(state, &self.actions);
        }
        for event in events {
            self.register_name(&event.event);
            template.apply_event_to_states(event, &self.actions);
        }
        template
    }

    /// Register `template` under `name` and bake it.
    ///
    /// Registration is idempotent: if `name` is taken the existing template is
    /// returned and `template` is discarded.
    pub fn register_template(&self, name: &str, mut template: AnimatorTemplate) -> Arc<AnimatorTemplate> {
        let hash = NameHash::new(name);
        if let Some(existing) = self.templates.read().get(&hash) {
            log::debug!("template '{name}' already registered");
            return existing.clone();
        }

        template.rename(name);
        let report = template.bake();
        if !report.is_clean() {
            log::error!(
                "template '{name}' registered with {} unresolved transition(s)",
                report.unresolved.len()
            );
        }
        {
            let mut names = self.names.write();
            names.register(name);
            for state in template.states() {
                names.register(state.name());
            }
        }

        let template = Arc::new(template);
        let mut templates = self.templates.write();
        let stored = templates.entry(hash).or_insert(template).clone();
        log::debug!("registered template '{name}' with {} states", stored.len());
        stored
    }

    pub fn template(&self, hash: NameHash) -> Option<Arc<AnimatorTemplate>> {
        self.templates.read().get(&hash).cloned()
    }

    pub fn template_by_name(&self, name: &str) -> Option<Arc<AnimatorTemplate>> {
        self.template(NameHash::new(name))
    }

    pub fn contains_template(&self, hash: NameHash) -> bool {
        self.templates.read().contains_key(&hash)
    }

    pub fn template_count(&self) -> usize {
        self.templates.read().len()
    }

    /// Record a name for diagnostics
    pub fn register_name(&self, name: &str) -> NameHash {
        self.names.write().register(name)
    }

    /// Registered spelling of `hash`, or its hex form
    pub fn describe(&self, hash: NameHash) -> String {
        self.names.read().describe(hash)
    }

    /// Text dump of a registered template
    pub fn dump_template(&self, hash: NameHash) -> Option<String> {
        let template = self.template(hash)?;
        let names = self.names.read();
        Some(template.describe(&names))
    }

    fn register_builtin_templates(&self) {
        for name in ["AEvent_StartLoop", "AEvent_TickLoop", "AEvent_EndLoop"] {
            self.register_name(name);
        }
        debug_assert_eq!(NameHash::new(events::END_LOOP_NAME), events::END_LOOP);

        self.register_template(TEMPLATE_EMPTY, AnimatorTemplate::new(TEMPLATE_EMPTY));

        let states = [
            StateSpec::new("State_Appear", "appear"),
            StateSpec::new("State_Default", "idle"),
            StateSpec::new("State_Disappear", "disappear"),
            StateSpec::new("State_Destroy", ""),
        ];
        let events = [
            EventSpec::new("AEvent_StartLoop", "ALL").actions("AAction_ChangeAnim"),
            EventSpec::new("AEvent_StartLoop", "State_Destroy").actions("AAction_ToDestroy"),
            EventSpec::new("AEvent_TickLoop", "State_Appear").actions("AAction_CheckAnim"),
            EventSpec::new("AEvent_TickLoop", "State_Disappear").actions("AAction_CheckTimer"),
            EventSpec::new("AEvent_EndLoop", "State_Appear").actions("AAction_FindState"),
            EventSpec::new("AEvent_EndLoop", "State_Disappear")
                .next("State_Destroy")
                .actions("AAction_Null"),
            EventSpec::new("Event_Default", "State_Default")
                .next("State_Default")
                .actions("AAction_Null"),
            EventSpec::new("Event_OnAppear", "State_Appear")
                .next("State_Appear")
                .actions("AAction_Null"),
            EventSpec::new("Event_OnDisappear", "State_Appear;State_Default")
                .next("State_Disappear")
                .actions("AAction_Null"),
            EventSpec::new("Event_OnDestroy", "ALL")
                .next("State_Destroy")
                .actions("AAction_Null"),
        ];
        let template = self.build_template(TEMPLATE_DEFAULT, &states, &events);
        self.register_template(TEMPLATE_DEFAULT, template);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::names::states;
    use crate::transition::SenderScope;

    #[test]
    fn builtin_templates_are_registered() {
        let catalog = AnimatorCatalog::new();
        assert_eq!(catalog.template_count(), 2);
        assert!(catalog.template_by_name(TEMPLATE_EMPTY).unwrap().is_empty());

        let default = catalog.template_by_name(TEMPLATE_DEFAULT).unwrap();
        assert!(default.is_baked());
        let names: Vec<_> = default.states().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["State_Appear", "State_Default", "State_Disappear", "State_Destroy"]
        );
    }

    #[test]
    fn default_template_wiring() {
        let catalog = AnimatorCatalog::new();
        let default = catalog.template_by_name(TEMPLATE_DEFAULT).unwrap();

        let destroy = default.state(states::DESTROY).unwrap();
        let start = destroy.transitions().find(events::START_LOOP, SenderScope::Entity).unwrap();
        let kinds: Vec<_> = destroy.transitions().get(start).unwrap().actions.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![ActionKind::ToDestroy]);

        let appear = default.state(states::APPEAR).unwrap();
        assert!(appear.can_transit_to(states::DISAPPEAR));
        assert!(appear.can_transit_to(states::DESTROY));
        assert_eq!(appear.entry_event(), NameHash::new("Event_OnAppear"));

        let disappear = default.state(states::DISAPPEAR).unwrap();
        let end = disappear.transitions().find_event(events::END_LOOP).unwrap();
        assert_eq!(disappear.transitions().get(end).unwrap().next_state, Some(3));
        assert_eq!(default.state_by_entry_event(NameHash::new("Event_OnDestroy")), Some(3));
    }

    #[test]
    fn register_is_idempotent() {
        let catalog = AnimatorCatalog::new();
        let first = catalog.register_template("Walker", AnimatorTemplate::new("ignored"));
        assert_eq!(first.name(), "Walker");

        let mut other = AnimatorTemplate::new("Walker");
        other.add_state(&StateSpec::new("State_Idle", "idle"), catalog.actions());
        let second = catalog.register_template("Walker", other);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.is_empty());
    }

    #[test]
    fn describe_uses_registered_names() {
        let catalog = AnimatorCatalog::new();
        assert_eq!(catalog.describe(states::APPEAR), "State_Appear");
        let dump = catalog.dump_template(NameHash::new(TEMPLATE_DEFAULT)).unwrap();
        assert!(dump.contains("Event_OnDisappear@Self -> State_Disappear"));
        assert!(catalog.dump_template(NameHash::new("missing")).is_none());
    }
}
