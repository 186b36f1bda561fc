//! Animator instances: one running state machine per entity
//!
//! An [`Animator`] points at a template (shared through the catalog, or a
//! private copy after instance-level authoring) and tracks which of its
//! states is current. Events come in through [`Animator::dispatch`], the
//! per-frame [`Animator::update`], and the network entry point
//! [`Animator::set_net_state`]. Every side effect goes through the
//! [`AnimatorHost`] passed to the call.
//!
//! None of the entry points fail: misses are logged and absorbed.

use crate::action::{split_top_level, Action, ActionKind};
use crate::authoring::{EventSpec, StateSpec};
use crate::catalog::AnimatorCatalog;
use crate::config::AnimatorConfig;
use crate::host::{AnimationSpawn, AnimatorHost, Buttons, EntitySpawn, MoveState, ParticleSpawn};
use crate::lookup::{AnimInfo, AnimSetTable, AnimationSetDesc};
use crate::names::{conditions, effects, events, params, states, TEMPLATE_CUSTOM};
use crate::state::AnimatorState;
use crate::template::{AnimatorTemplate, TemplateHandle};
use crate::transition::{Guard, SenderScope};
use flint_core::{EntityId, FlintError, NameHash, ParamMap, Result, Variant, DATA_KEY};
use flint_runtime::{EventSource, GameEvent};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Whether the next SpawnEntity action actually spawns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpawnMode {
    #[default]
    Always,
    /// Skip one spawn, then go back to `Always`
    SkipOnce,
    Never,
}

/// Who asked for a pending forced state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceSource {
    Network,
    Local,
}

/// A state the next re-evaluation must pick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForcedState {
    pub index: usize,
    pub source: ForceSource,
}

/// Persisted part of an animator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimatorSnapshot {
    pub template_name: String,
    pub state: NameHash,
    pub direction: Vec2,
    pub auto_switch: bool,
    #[serde(default)]
    pub event_actions: String,
}

impl AnimatorSnapshot {
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Animation variant for a directional state.
///
/// A non-zero spawn angle other than 180 picks the bucket from the angle:
/// 0 (level), 1 (+45), 2 (+90), 3 (-45), 4 (-90). Otherwise the directional
/// buttons decide.
pub fn directional_bucket(spawn_angle: f32, buttons: Buttons) -> usize {
    if spawn_angle != 0.0 && spawn_angle != 180.0 {
        if spawn_angle > 15.0 && spawn_angle < 165.0 {
            if spawn_angle < 65.0 || spawn_angle > 115.0 {
                1
            } else {
                2
            }
        } else if spawn_angle < -15.0 && spawn_angle >= -90.0 {
            if spawn_angle > -65.0 {
                3
            } else {
                4
            }
        } else if spawn_angle > 195.0 && spawn_angle <= 270.0 {
            if spawn_angle < 245.0 {
                3
            } else {
                4
            }
        } else {
            0
        }
    } else {
        let sideways = buttons.intersects(Buttons::LEFT | Buttons::RIGHT);
        if buttons.contains(Buttons::UP) {
            if sideways {
                1
            } else {
                2
            }
        } else if buttons.contains(Buttons::DOWN) {
            if sideways {
                3
            } else {
                4
            }
        } else {
            0
        }
    }
}

/// Events an instance always listens to from its own entity
const ENTITY_EVENTS: [NameHash; 5] = [
    events::CHANGE_AREA,
    events::TOUCH_GROUND,
    events::TOUCH_FLUID,
    events::CHANGE_DIRECTION,
    events::CHANGE_ORDER,
];

/// Whether the state at `from` may move to the state at `to`; anything is reachable without a current state
fn can_reach(template: &AnimatorTemplate, from: Option<usize>, to: usize) -> bool {
    let Some(from) = from else {
        return true;
    };
    if from == to {
        return true;
    }
    match (template.state_at(from), template.state_at(to)) {
        (Some(from), Some(to)) => from.can_transit_to(to.hash()),
        _ => false,
    }
}

/// Angle in degrees from `from` towards `to`, in (-90, 270]
fn aim_angle(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    if d == Vec2::ZERO {
        return 0.0;
    }
    let angle = (d.y / d.x).atan().to_degrees();
    if d.x < 0.0 {
        angle + 180.0
    } else {
        angle
    }
}

/// A running state machine bound to one entity
pub struct Animator {
    entity: EntityId,
    catalog: Arc<AnimatorCatalog>,
    config: AnimatorConfig,
    template_name: String,
    template: Option<TemplateHandle>,

    /// Hash of the current state, or of the requested one before a template is bound
    state: NameHash,
    current: Option<usize>,
    next_state: Option<usize>,
    forced_next: Option<ForcedState>,

    anim_versions: Vec<usize>,
    animation_set: Option<Arc<AnimationSetDesc>>,
    anim_table: Option<Arc<AnimSetTable>>,
    variant: usize,
    forced_anim_version: Option<usize>,
    net_change_counter: u32,

    state_time: f32,
    time_step: f32,
    particle_timer: f32,

    spawn_angle: f32,
    shoot_target: Vec2,
    direction: Vec2,
    orientation: f32,
    flip_x: bool,
    auto_switch: bool,

    last_event: NameHash,
    current_event: NameHash,
    event_actions: [HashMap<NameHash, Vec<Action>>; SenderScope::COUNT],
    event_actions_spec: String,

    owner: Option<EntityId>,
    disappear_countdown: Option<u32>,
    spawn_mode: SpawnMode,
    started: bool,
    depth: u32,
}

impl Animator {
    pub fn new(entity: EntityId, catalog: Arc<AnimatorCatalog>) -> Self {
        Self::with_config(entity, catalog, AnimatorConfig::default())
    }

    pub fn with_config(entity: EntityId, catalog: Arc<AnimatorCatalog>, config: AnimatorConfig) -> Self {
        Self {
            entity,
            catalog,
            template_name: config.default_template.clone(),
            auto_switch: config.auto_switch_animation,
            config,
            template: None,
            state: NameHash::ZERO,
            current: None,
            next_state: None,
            forced_next: None,
            anim_versions: Vec::new(),
            animation_set: None,
            anim_table: None,
            variant: 0,
            forced_anim_version: None,
            net_change_counter: 0,
            state_time: 0.0,
            time_step: 0.0,
            particle_timer: 0.0,
            spawn_angle: 0.0,
            shoot_target: Vec2::ZERO,
            direction: Vec2::ZERO,
            orientation: 1.0,
            flip_x: false,
            last_event: NameHash::ZERO,
            current_event: NameHash::ZERO,
            event_actions: Default::default(),
            event_actions_spec: String::new(),
            owner: None,
            disappear_countdown: None,
            spawn_mode: SpawnMode::Always,
            started: false,
            depth: 0,
        }
    }

    // --- accessors ---

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn template(&self) -> Option<&AnimatorTemplate> {
        self.template.as_deref()
    }

    pub fn has_custom_template(&self) -> bool {
        self.template.as_ref().is_some_and(TemplateHandle::is_custom)
    }

    /// Hash of the current state, zero before any state is entered
    pub fn current_state(&self) -> NameHash {
        self.state
    }

    pub fn current_state_index(&self) -> Option<usize> {
        self.current
    }

    fn current_animator_state(&self) -> Option<&AnimatorState> {
        self.template.as_ref()?.state_at(self.current?)
    }

    pub fn current_state_name(&self) -> Option<&str> {
        self.current_animator_state().map(AnimatorState::name)
    }

    /// Result of the last [`Animator::find_next_state`]
    pub fn next_state(&self) -> Option<usize> {
        self.next_state
    }

    pub fn forced_next_state(&self) -> Option<ForcedState> {
        self.forced_next
    }

    pub fn state_time(&self) -> f32 {
        self.state_time
    }

    /// Animation variant selected for the current state
    pub fn anim_version(&self) -> usize {
        self.current
            .and_then(|c| self.anim_versions.get(c).copied())
            .unwrap_or(0)
    }

    /// Number of animation restarts, mirrored to peers
    pub fn net_change_counter(&self) -> u32 {
        self.net_change_counter
    }

    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    pub fn orientation(&self) -> f32 {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: f32) {
        self.orientation = orientation;
    }

    pub fn spawn_angle(&self) -> f32 {
        self.spawn_angle
    }

    pub fn is_flipped(&self) -> bool {
        self.flip_x
    }

    pub fn auto_switch(&self) -> bool {
        self.auto_switch
    }

    pub fn set_auto_switch(&mut self, auto_switch: bool) {
        self.auto_switch = auto_switch;
    }

    pub fn spawn_mode(&self) -> SpawnMode {
        self.spawn_mode
    }

    pub fn set_spawn_mode(&mut self, mode: SpawnMode) {
        self.spawn_mode = mode;
    }

    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Frames left in a running disappear fade
    pub fn disappear_countdown(&self) -> Option<u32> {
        self.disappear_countdown
    }

    pub fn event_actions_spec(&self) -> &str {
        &self.event_actions_spec
    }

    /// Whether `state` has at least one real clip in the bound animation set
    pub fn has_animation_for_state(&self, state: NameHash) -> bool {
        let (Some(template), Some(table)) = (self.template.as_ref(), self.anim_table.as_ref()) else {
            return false;
        };
        let Some(index) = template.state_index(state) else {
            return false;
        };
        table
            .clips(self.variant, index)
            .first()
            .is_some_and(|info| !info.is_sentinel())
    }

    // --- template binding ---

    /// Select a template by name. The binding happens on the next [`Animator::attach`].
    pub fn set_template_name(&mut self, name: &str) {
        if name.is_empty() || self.template_name == name {
            return;
        }
        self.template = None;
        self.current = None;
        self.template_name = name.to_string();
    }

    /// Bind the named template, falling back to the configured default
    pub fn resolve_template(&mut self) {
        if let Some(template) = &self.template {
            if template.is_custom() || template.name() == self.template_name {
                return;
            }
        }

        let template = match self.catalog.template_by_name(&self.template_name) {
            Some(template) => template,
            None => match self.catalog.template_by_name(&self.config.default_template) {
                Some(template) => {
                    log::warn!(
                        "animator {}: template '{}' not found, using '{}'",
                        self.entity,
                        self.template_name,
                        self.config.default_template
                    );
                    template
                }
                None => {
                    log::error!(
                        "animator {}: neither '{}' nor default template '{}' is registered",
                        self.entity,
                        self.template_name,
                        self.config.default_template
                    );
                    return;
                }
            },
        };
        log::debug!("animator {}: bound template '{}'", self.entity, template.name());
        self.bind(TemplateHandle::Shared(template));
    }

    fn bind(&mut self, handle: TemplateHandle) {
        self.anim_versions = vec![0; handle.len()];
        self.template = Some(handle);
        self.anim_table = None;
        self.refresh_animation_table();
    }

    /// Pair the bound template with the host's animation set
    pub fn set_animation_set(&mut self, host: &dyn AnimatorHost) {
        let Some(set) = host.animation_set() else {
            log::debug!("animator {}: host has no animation set", self.entity);
            return;
        };
        let unchanged = self
            .animation_set
            .as_ref()
            .is_some_and(|current| current.hash() == set.hash());
        self.variant = host.entity_variant();
        if unchanged && self.anim_table.is_some() {
            return;
        }
        self.animation_set = Some(set);
        self.anim_versions.iter_mut().for_each(|v| *v = 0);
        self.refresh_animation_table();
    }

    fn refresh_animation_table(&mut self) {
        let (Some(template), Some(set)) = (self.template.as_ref(), self.animation_set.as_ref()) else {
            return;
        };
        template.add_animation_set(set);
        self.anim_table = Some(template.animation_table(set));
        self.anim_versions.resize(template.len(), 0);
    }

    // --- lifecycle ---

    /// Resolve the template, read the animation set, and enter the persisted or first state
    pub fn attach(&mut self, host: &mut dyn AnimatorHost) {
        self.resolve_template();
        self.set_animation_set(host);

        let direction = if self.direction.x == 0.0 { Vec2::X } else { self.direction };
        self.set_direction(direction, host);

        let requested = self.state;
        let already_there = self.current.is_some() && self.current_animator_state().map(AnimatorState::hash) == Some(requested);
        if !already_there && !self.set_state(requested, host) {
            let first = self
                .template
                .as_ref()
                .and_then(|t| t.state_at(0))
                .map(AnimatorState::hash);
            if let Some(first) = first {
                self.set_state(first, host);
            }
        }
    }

    /// Reset runtime counters and subscribe to the current state's events
    pub fn start(&mut self, host: &mut dyn AnimatorHost) {
        if self.started {
            return;
        }
        self.particle_timer = 0.0;
        self.state_time = 0.0;
        self.forced_next = None;
        self.spawn_angle = 0.0;
        self.forced_anim_version = None;
        self.net_change_counter = 0;
        self.disappear_countdown = None;
        self.started = true;

        if let Some(current) = self.current {
            self.update_subscriptions(None, current, host);
        }
        self.apply_entry_actions(host);

        let bus = host.events();
        for event in ENTITY_EVENTS {
            bus.subscribe(self.entity, EventSource::Entity(self.entity), event);
        }
        for scope in [SenderScope::Entity, SenderScope::Owner, SenderScope::All] {
            let Some(source) = self.source_for(scope) else {
                continue;
            };
            for event in self.event_actions[scope.index()].keys() {
                bus.subscribe(self.entity, source, *event);
            }
        }
        log::debug!(
            "animator {}: started in {}",
            self.entity,
            self.current_state_name().unwrap_or("<none>")
        );
    }

    /// Drop every subscription and forget the owner
    pub fn stop(&mut self, host: &mut dyn AnimatorHost) {
        let removed = host.events().unsubscribe_all(self.entity);
        log::debug!("animator {}: stopped, {removed} subscription(s) removed", self.entity);
        self.owner = None;
        self.started = false;
    }

    /// Jump back to the first gameplay-specific state and clear pending requests
    pub fn reset_state(&mut self, host: &mut dyn AnimatorHost) {
        if let Some(template) = &self.template {
            if !template.is_empty() {
                let index = self.config.first_specific_state.min(template.len() - 1);
                self.current = Some(index);
                self.state = template.states()[index].hash();
                self.next_state = None;
                self.forced_next = None;
                self.forced_anim_version = None;
                self.net_change_counter = 0;
            }
        }
        self.check_animation(host);
    }

    /// Restart the current state's animation if the surface is not playing it
    pub fn check_animation(&mut self, host: &mut dyn AnimatorHost) {
        let Some(current) = self.current else {
            return;
        };
        if current >= self.anim_versions.len() {
            return;
        }
        let Some(expected) = self.clip_at(self.anim_version()) else {
            return;
        };
        if host.active_clip() != Some(expected.clip_index) {
            self.change_animation(host);
            self.notify_state(host);
        }
    }

    /// Route owner-scoped subscriptions to `owner`
    pub fn set_owner(&mut self, owner: EntityId, host: &mut dyn AnimatorHost) {
        if self.owner == Some(owner) {
            return;
        }
        if self.started {
            let scoped = self.owner_scoped_events();
            let bus = host.events();
            if let Some(old) = self.owner {
                for event in &scoped {
                    bus.unsubscribe(self.entity, EventSource::Entity(old), *event);
                }
            }
            for event in &scoped {
                bus.subscribe(self.entity, EventSource::Entity(owner), *event);
            }
        }
        self.owner = Some(owner);
    }

    fn owner_scoped_events(&self) -> Vec<NameHash> {
        let mut out: Vec<NameHash> = self.event_actions[SenderScope::Owner.index()].keys().copied().collect();
        if let Some(state) = self.current_animator_state() {
            out.extend(
                state
                    .transitions()
                    .iter()
                    .filter(|t| t.sender == SenderScope::Owner)
                    .map(|t| t.event),
            );
        }
        out.sort();
        out.dedup();
        out
    }

    fn source_for(&self, scope: SenderScope) -> Option<EventSource> {
        match scope {
            SenderScope::Entity => Some(EventSource::Entity(self.entity)),
            SenderScope::Owner => self.owner.map(EventSource::Entity),
            SenderScope::All => Some(EventSource::Any),
        }
    }

    /// Swap the transition subscriptions of `from` for those of `to`
    fn update_subscriptions(&self, from: Option<usize>, to: usize, host: &mut dyn AnimatorHost) {
        if !self.started || from == Some(to) {
            return;
        }
        let Some(template) = self.template.as_ref() else {
            return;
        };
        let Some(to_state) = template.state_at(to) else {
            return;
        };
        let bus = host.events();
        if let Some(from_state) = from.and_then(|f| template.state_at(f)) {
            for t in from_state.transitions().iter() {
                if to_state.transitions().find(t.event, t.sender).is_some()
                    || (t.sender == SenderScope::Entity && ENTITY_EVENTS.contains(&t.event))
                    || self.event_actions[t.sender.index()].contains_key(&t.event)
                {
                    continue;
                }
                if let Some(source) = self.source_for(t.sender) {
                    bus.unsubscribe(self.entity, source, t.event);
                }
            }
        }
        for t in to_state.transitions().iter() {
            if let Some(source) = self.source_for(t.sender) {
                bus.subscribe(self.entity, source, t.event);
            }
        }
    }

    // --- direction ---

    pub fn set_direction(&mut self, direction: Vec2, host: &mut dyn AnimatorHost) {
        if direction.x != 0.0 && direction != self.direction {
            self.direction = direction;
        }
        self.update_direction(host);
    }

    /// Face the other way; an entity with no direction yet turns against its orientation
    fn turn_around(&mut self, host: &mut dyn AnimatorHost) {
        let facing = if self.direction.x != 0.0 {
            self.direction.x
        } else {
            self.orientation
        };
        self.set_direction(Vec2::new(-facing, 0.0), host);
    }

    fn update_direction(&mut self, host: &mut dyn AnimatorHost) {
        self.flip_x = self.orientation * self.direction.x < 0.0;
        host.set_flip(self.flip_x, false);
    }

    /// Aim spawned entities at `target`; a zero target clears the aim
    pub fn set_shoot_target(&mut self, target: Vec2, host: &dyn AnimatorHost) {
        self.shoot_target = target;
        self.spawn_angle = if target == Vec2::ZERO {
            0.0
        } else {
            aim_angle(host.position(), target)
        };
    }

    // --- state changes ---

    /// Enter `state` directly. Returns true when the current state changed.
    ///
    /// Without a bound template the request is kept for [`Animator::attach`].
    /// An unknown state is ignored unless there is no current state, in
    /// which case the state is derived from movement.
    pub fn set_state(&mut self, state: NameHash, host: &mut dyn AnimatorHost) -> bool {
        if state.is_zero() {
            return false;
        }
        let Some(template) = self.template.as_ref() else {
            self.state = state;
            return false;
        };

        let previous = self.current;
        match template.state_index(state) {
            Some(index) => self.current = Some(index),
            None if self.current.is_none() => self.current = self.find_next_state(host),
            None => {}
        }
        let Some(current) = self.current else {
            return false;
        };
        if previous == Some(current) {
            return false;
        }

        self.state = self.current_animator_state().map(AnimatorState::hash).unwrap_or(state);
        log::debug!(
            "animator {}: set state {}",
            self.entity,
            self.current_state_name().unwrap_or("?")
        );
        self.update_subscriptions(previous, current, host);
        self.change_animation(host);
        self.apply_entry_actions(host);
        self.notify_state(host);
        true
    }

    /// [`Animator::set_state`] by name; re-checks the animation when the state does not change
    pub fn set_state_by_name(&mut self, name: &str, host: &mut dyn AnimatorHost) {
        if name.is_empty() {
            return;
        }
        let state = NameHash::new(name);
        if state == self.state && self.current.is_some() {
            return;
        }
        if !self.set_state(state, host) && self.template.is_some() {
            self.check_animation(host);
        }
    }

    /// Ask the next re-evaluation to pick `state`. Returns false if the state is unknown.
    pub fn force_next_state(&mut self, state: NameHash) -> bool {
        match self.template.as_ref().and_then(|t| t.state_index(state)) {
            Some(index) => {
                self.request_forced(index, ForceSource::Local);
                true
            }
            None => false,
        }
    }

    /// Record a forced next state. A local request never replaces a pending network one.
    fn request_forced(&mut self, index: usize, source: ForceSource) {
        if let Some(pending) = self.forced_next {
            if pending.source == ForceSource::Network && source == ForceSource::Local {
                log::trace!(
                    "animator {}: local request for state {index} ignored, network request {} pending",
                    self.entity,
                    pending.index
                );
                return;
            }
        }
        self.forced_next = Some(ForcedState { index, source });
    }

    /// Apply a state pushed by an authoritative peer.
    ///
    /// If the current state cannot reach `state` the request is parked as a
    /// forced next state and taken at the next re-evaluation instead of
    /// jumping straight there.
    pub fn set_net_state(&mut self, state: NameHash, anim_version: usize, anim_changed: bool, host: &mut dyn AnimatorHost) {
        if state.is_zero() {
            return;
        }
        let Some(template) = self.template.as_ref() else {
            self.state = state;
            log::error!("animator {}: network state before any template is bound", self.entity);
            return;
        };

        let Some(target) = template.state_index(state) else {
            log::warn!("animator {}: network state {} is not in '{}'", self.entity, state, template.name());
            return;
        };
        let mut current_version = self.anim_version();
        if self.current == Some(target) && anim_version == current_version && !anim_changed {
            return;
        }

        if !can_reach(template, self.current, target) {
            log::debug!(
                "animator {}: {} cannot reach {}, deferring",
                self.entity,
                self.current_state_name().unwrap_or("?"),
                template.states()[target].name()
            );
            self.request_forced(target, ForceSource::Network);
            return;
        }

        let changed = self.current != Some(target);
        if changed {
            let previous = self.current.replace(target);
            self.state = state;
            if self.forced_next.is_some_and(|f| f.index == target) {
                self.forced_next = None;
            }
            self.update_subscriptions(previous, target, host);
            current_version = 0;
        }

        if changed || anim_changed || anim_version != current_version {
            self.forced_anim_version = Some(anim_version);
            self.change_animation(host);
        }
        if changed {
            self.apply_entry_actions(host);
        }
    }

    /// Work out which state the entity should be in.
    ///
    /// A pending forced state wins and is consumed. A network request the
    /// current state cannot reach stays pending instead. Otherwise the
    /// movement state picks an entry event, and the state entered by that
    /// event is used. Falls back to `State_Default_Ground`.
    pub fn find_next_state(&mut self, host: &dyn AnimatorHost) -> Option<usize> {
        self.next_state = None;
        let template = self.template.as_ref()?;
        let forced = match self.forced_next.take() {
            Some(forced)
                if forced.source == ForceSource::Network && !can_reach(template, self.current, forced.index) =>
            {
                log::trace!(
                    "animator {}: network state {} still out of reach",
                    self.entity,
                    forced.index
                );
                self.forced_next = Some(forced);
                None
            }
            other => other.map(|f| f.index),
        };
        let next = match forced {
            Some(index) => Some(index),
            None => {
                let move_state = host.move_state();
                let event = if move_state.is_empty() {
                    Some(events::DEFAULT_GROUND)
                } else {
                    move_state.movement_event()
                };
                event.and_then(|e| template.state_by_entry_event(e))
            }
        };
        let next = next.or_else(|| template.state_index(states::DEFAULT_GROUND));
        self.next_state = next;
        next
    }

    fn enter_state(&mut self, next: usize, host: &mut dyn AnimatorHost) {
        let previous = self.current.replace(next);
        if let Some(state) = self.current_animator_state() {
            self.state = state.hash();
        }
        log::trace!(
            "animator {}: {:?} -> {}",
            self.entity,
            previous,
            self.current_state_name().unwrap_or("?")
        );
        self.update_subscriptions(previous, next, host);
        self.apply_entry_actions(host);
        self.notify_state(host);
    }

    /// Re-derive the state from movement; returns the start-loop index of the state entered.
    ///
    /// Nothing happens when the re-derived state is the current one.
    fn reevaluate(&mut self, host: &mut dyn AnimatorHost) -> Option<usize> {
        let next = self.find_next_state(host)?;
        if self.current == Some(next) {
            return None;
        }
        self.enter_state(next, host);
        self.event_index(events::START_LOOP)
    }

    fn notify_state(&self, host: &mut dyn AnimatorHost) {
        let mut data = ParamMap::new();
        data.insert(params::STATE, Variant::Hash(self.state));
        host.events().send(events::CHANGE_STATE, self.entity, data);
    }

    // --- dispatch ---

    /// Feed `event` to the state machine, taking the first transition for it
    /// whatever sender it listens to.
    ///
    /// Nested dispatches (actions that dispatch in turn) are refused past
    /// `max_dispatch_depth`.
    pub fn dispatch(&mut self, event: NameHash, params: &ParamMap, host: &mut dyn AnimatorHost) {
        self.dispatch_scoped(event, None, params, host);
    }

    /// Feed `event` as sent from `scope`. Only transitions listening to that
    /// scope (or to `All`) match; without one the event is dropped.
    pub fn dispatch_from(&mut self, event: NameHash, scope: SenderScope, params: &ParamMap, host: &mut dyn AnimatorHost) {
        self.dispatch_scoped(event, Some(scope), params, host);
    }

    fn dispatch_scoped(
        &mut self,
        event: NameHash,
        scope: Option<SenderScope>,
        params: &ParamMap,
        host: &mut dyn AnimatorHost,
    ) {
        if self.depth >= self.config.max_dispatch_depth {
            log::warn!(
                "animator {}: dispatch of {} refused at depth {}",
                self.entity,
                self.catalog.describe(event),
                self.depth
            );
            return;
        }
        self.depth += 1;
        self.dispatch_inner(event, scope, params, host);
        self.depth -= 1;
    }

    fn dispatch_inner(
        &mut self,
        event: NameHash,
        scope: Option<SenderScope>,
        params: &ParamMap,
        host: &mut dyn AnimatorHost,
    ) {
        let Some(current) = self.current else {
            return;
        };

        let entry = if event == events::CHANGE_AREA {
            self.reevaluate(host)
        } else {
            let Some(state) = self.current_animator_state() else {
                return;
            };
            let table = state.transitions();
            let found = match scope {
                Some(scope) => table.find_for_sender(event, scope),
                None => table.find_event(event),
            }
            .and_then(|index| {
                table
                    .get(index)
                    .map(|t| (index, t.next_state.unwrap_or(current), t.guard))
            });
            let tick_delay = state.tick_delay();
            let directional = state.is_directional();

            match found {
                None if scope.is_some() => return,
                None => match self.event_index(events::TICK_LOOP) {
                    Some(index) => Some(index),
                    None => {
                        log::trace!(
                            "animator {}: {} ignores {}",
                            self.entity,
                            self.current_state_name().unwrap_or("?"),
                            self.catalog.describe(event)
                        );
                        return;
                    }
                },
                Some((index, next, guard)) if next != current => {
                    if !self.guard_passes(guard, tick_delay, host) {
                        log::trace!("animator {}: guard refused {}", self.entity, self.catalog.describe(event));
                        return;
                    }
                    self.run_state_actions(index, params, host);
                    self.enter_state(next, host);
                    self.event_index(events::START_LOOP)
                }
                Some(_) if event == events::END_LOOP => match self.find_next_state(host) {
                    Some(next) => {
                        self.enter_state(next, host);
                        self.event_index(events::START_LOOP)
                    }
                    None => self.event_index(event),
                },
                Some((index, _, guard)) => {
                    if !self.guard_passes(guard, tick_delay, host) {
                        return;
                    }
                    if self.state_time > tick_delay && self.clip_count() > 1 {
                        if directional {
                            self.apply_directional(host);
                        } else if self.auto_switch {
                            self.apply_switchable(host);
                        }
                    }
                    Some(index)
                }
            }
        };

        self.last_event = self.current_event;
        if let Some(index) = entry {
            self.run_state_actions(index, params, host);
        }
    }

    fn event_index(&self, event: NameHash) -> Option<usize> {
        self.current_animator_state()?.transitions().find_event(event)
    }

    fn guard_passes(&self, guard: Guard, tick_delay: f32, host: &dyn AnimatorHost) -> bool {
        if guard.is_always() {
            return true;
        }
        let condition = guard.condition;
        if condition == conditions::ACTIVE_ABILITY {
            host.has_active_ability(guard.value)
        } else if condition == conditions::ABILITY {
            host.has_ability(guard.value)
        } else if condition == conditions::MAX_TICK_DELAY {
            self.state_time < tick_delay
        } else if condition == conditions::BUTTON_HOLD {
            match host.button_held() {
                Some(held) => {
                    (held && guard.value == conditions::TRUE) || (!held && guard.value == conditions::FALSE)
                }
                None => false,
            }
        } else {
            true
        }
    }

    /// Run the actions of the current state's transition at `index`.
    ///
    /// An action authored with its own params uses them instead of `params`.
    fn run_state_actions(&mut self, index: usize, params: &ParamMap, host: &mut dyn AnimatorHost) {
        let actions = match self.current_animator_state().and_then(|s| s.transitions().get(index)) {
            Some(t) => t.actions.clone(),
            None => return,
        };
        for action in actions.iter() {
            let p = if action.params().is_empty() { params } else { action.params() };
            self.execute(action.kind(), p, host);
        }
    }

    fn apply_entry_actions(&mut self, host: &mut dyn AnimatorHost) {
        let Some(actions) = self.current_animator_state().map(|s| s.entry_actions().clone()) else {
            return;
        };
        for action in actions.iter() {
            self.execute(action.kind(), action.params(), host);
        }
    }

    fn execute(&mut self, kind: ActionKind, params: &ParamMap, host: &mut dyn AnimatorHost) {
        match kind {
            ActionKind::Null => {}
            ActionKind::FindState => self.action_find_state(host),
            ActionKind::ChangeEntity => self.change_entity(params, host),
            ActionKind::ChangeAnimation => self.change_animation(host),
            ActionKind::CheckTimer => self.check_timer(host),
            ActionKind::CheckAnim => self.check_anim(host),
            ActionKind::CheckEmpty => self.check_empty(host),
            ActionKind::SendEvent => self.send_event(params, host),
            ActionKind::SpawnParticle => self.spawn_particle(params, host),
            ActionKind::SpawnEntity => self.spawn_entity(host),
            ActionKind::SpawnAnimation => self.spawn_animation(host),
            ActionKind::SpawnFurniture => self.spawn_furniture(params, host),
            ActionKind::LightOn => self.set_light(true, host),
            ActionKind::LightOff => self.set_light(false, host),
            ActionKind::CheckFireLight => self.check_fire_light(host),
            ActionKind::ToDisappear => self.to_disappear(params, host),
            ActionKind::ToDestroy => self.to_destroy(host),
        }
    }

    // --- per-frame ---

    /// Advance one frame of `dt` seconds
    pub fn update(&mut self, dt: f32, host: &mut dyn AnimatorHost) {
        self.time_step = dt;
        self.particle_timer += dt;

        if let Some(event) = host.move_state().movement_event() {
            self.current_event = event;
        }
        if self.last_event == self.current_event {
            self.play_loop(host);
        } else {
            let event = self.current_event;
            self.dispatch(event, &ParamMap::new(), host);
        }

        if let Some(remaining) = self.disappear_countdown {
            if remaining > 0 {
                let remaining = remaining - 1;
                self.disappear_countdown = Some(remaining);
                host.fade(-self.config.disappear_alpha_step);
                if remaining == 0 {
                    self.to_destroy(host);
                }
            }
        }
    }

    fn play_loop(&mut self, host: &mut dyn AnimatorHost) {
        let Some(index) = self.event_index(events::TICK_LOOP) else {
            return;
        };
        if let Some(forced) = self.forced_anim_version {
            let tick_delay = self.current_animator_state().map_or(0.0, AnimatorState::tick_delay);
            if forced != self.anim_version() && self.state_time >= tick_delay {
                self.change_animation(host);
            }
        }
        self.run_state_actions(index, &ParamMap::new(), host);
    }

    /// Route a bus event delivered to this animator
    pub fn handle_event(&mut self, event: &GameEvent, host: &mut dyn AnimatorHost) {
        let scope = if event.sender == self.entity {
            SenderScope::Entity
        } else if Some(event.sender) == self.owner {
            SenderScope::Owner
        } else {
            SenderScope::All
        };
        self.run_event_actions(scope, event.kind, host);
        if scope == SenderScope::Entity {
            self.handle_entity_event(event, host);
        }

        let handled = (scope == SenderScope::Entity && event.kind == events::CHANGE_AREA)
            || self
                .current_animator_state()
                .is_some_and(|s| s.transitions().find_for_sender(event.kind, scope).is_some());
        if handled {
            self.dispatch_from(event.kind, scope, &event.params, host);
        }
    }

    /// Contact, facing and AI-order notifications the entity sends itself
    fn handle_entity_event(&mut self, event: &GameEvent, host: &mut dyn AnimatorHost) {
        if event.kind == events::TOUCH_GROUND {
            let (effect, angle) = if host.move_state().contains(MoveState::IN_LIQUID) {
                (effects::BUBBLES, 90.0)
            } else {
                (effects::DUST, if self.direction.x > 0.0 { 180.0 } else { 0.0 })
            };
            self.spawn_contact_particle(effect, angle, host);
        } else if event.kind == events::TOUCH_FLUID {
            self.spawn_contact_particle(effects::BUBBLES, 90.0, host);
            self.check_fire_light(host);
        } else if event.kind == events::CHANGE_DIRECTION {
            self.turn_around(host);
        } else if event.kind == events::CHANGE_ORDER {
            match event.param(params::ORDER).and_then(Variant::as_hash) {
                Some(state) => {
                    self.set_state(state, host);
                }
                None => log::debug!("animator {}: order without a state", self.entity),
            }
        }
    }

    // --- event actions ---

    /// Install per-event actions from `Event[@Owner|All]:action;action|...`.
    ///
    /// Subscriptions for them are made on the next [`Animator::start`].
    pub fn set_event_actions(&mut self, spec: &str) {
        if self.event_actions_spec == spec {
            return;
        }
        self.event_actions_spec = spec.to_string();
        self.event_actions = Default::default();

        for entry in split_top_level(spec, '|') {
            let Some((head, list)) = entry.split_once(':') else {
                continue;
            };
            let (event, scope) = match head.split_once('@') {
                Some((event, scope)) => (event.trim(), SenderScope::parse(scope)),
                None => (head.trim(), SenderScope::Entity),
            };
            if event.is_empty() {
                continue;
            }
            let actions = self.catalog.actions().resolve_list(list);
            log::trace!("animator {}: {} action(s) on {event}@{scope}", self.entity, actions.len());
            self.event_actions[scope.index()]
                .entry(NameHash::new(event))
                .or_default()
                .extend(actions);
        }
    }

    fn run_event_actions(&mut self, scope: SenderScope, event: NameHash, host: &mut dyn AnimatorHost) {
        let Some(actions) = self.event_actions[scope.index()].get(&event).cloned() else {
            return;
        };
        for action in &actions {
            self.execute(action.kind(), action.params(), host);
        }
    }

    // --- animation selection ---

    fn clip_count(&self) -> usize {
        match (self.anim_table.as_ref(), self.current) {
            (Some(table), Some(current)) => table.clips(self.variant, current).len(),
            _ => 0,
        }
    }

    fn clip_at(&self, version: usize) -> Option<AnimInfo> {
        let table = self.anim_table.as_ref()?;
        table.clips(self.variant, self.current?).get(version).cloned()
    }

    fn set_anim_version(&mut self, version: usize) {
        if let Some(slot) = self.current.and_then(|c| self.anim_versions.get_mut(c)) {
            *slot = version;
        }
    }

    /// Pick and play the current state's clip with its selection policy
    pub fn change_animation(&mut self, host: &mut dyn AnimatorHost) {
        let Some(current) = self.current else {
            log::debug!("animator {}: change animation without a state", self.entity);
            return;
        };
        if current >= self.anim_versions.len() || self.clip_count() == 0 {
            return;
        }

        let directional = self.current_animator_state().is_some_and(AnimatorState::is_directional);
        if directional {
            self.apply_directional(host);
        } else if self.auto_switch {
            self.apply_switchable(host);
        } else {
            self.apply_simple(host);
        }

        if self.state_time == 0.0 {
            self.net_change_counter = self.net_change_counter.wrapping_add(1);
        }
        self.update_direction(host);
    }

    fn apply_directional(&mut self, host: &mut dyn AnimatorHost) {
        self.forced_anim_version = None;
        let mut version = directional_bucket(self.spawn_angle, host.buttons());
        match self.clip_at(version) {
            Some(info) if version < self.clip_count() => {
                host.reset_animation();
                if !info.is_sentinel() {
                    host.set_active_clip(info.clip_index);
                }
            }
            _ => version = 0,
        }
        self.set_anim_version(version);
        self.state_time = 0.0;
    }

    fn apply_switchable(&mut self, host: &mut dyn AnimatorHost) {
        let count = self.clip_count();
        if count == 0 {
            return;
        }
        let version = (self.anim_version() + 1) % count;
        self.set_anim_version(version);
        self.play_clip(version, host);
        if self.forced_anim_version == Some(version) {
            self.forced_anim_version = None;
        }
    }

    fn apply_simple(&mut self, host: &mut dyn AnimatorHost) {
        self.set_anim_version(0);
        self.forced_anim_version = None;
        self.play_clip(0, host);
    }

    /// Play `version` unless the surface already shows that clip
    fn play_clip(&mut self, version: usize, host: &mut dyn AnimatorHost) {
        match self.clip_at(version) {
            Some(info) if !info.is_sentinel() => {
                if host.active_clip() != Some(info.clip_index) {
                    host.set_active_clip(info.clip_index);
                    self.state_time = 0.0;
                }
            }
            _ => log::trace!(
                "animator {}: no clip for {} version {version}",
                self.entity,
                self.current_state_name().unwrap_or("?")
            ),
        }
    }

    // --- built-in actions ---

    fn action_find_state(&mut self, host: &mut dyn AnimatorHost) {
        if self.forced_next.is_some() {
            return;
        }
        if let Some(next) = self.find_next_state(host) {
            self.request_forced(next, ForceSource::Local);
        }
    }

    fn change_entity(&mut self, params: &ParamMap, host: &mut dyn AnimatorHost) {
        let Some(set) = host.animation_set() else {
            return;
        };
        let count = set.variants.len();
        if count < 2 {
            return;
        }
        let Some(requested) = params.values().next().and_then(Variant::as_int) else {
            return;
        };
        let variant = requested.rem_euclid(count as i32) as usize;
        if variant == host.entity_variant() {
            return;
        }

        let position = host.position();
        host.spawn_particle(ParticleSpawn {
            effect: effects::LIFE_FLAME,
            position,
            angle: 0.0,
            duration: 2.0,
        });
        host.set_entity_variant(variant);
        self.variant = variant;
        log::debug!("animator {}: entity variant {variant}", self.entity);

        if self.template.is_some() {
            if let Some(next) = self.find_next_state(host) {
                self.request_forced(next, ForceSource::Local);
            }
        }
        host.events().send(events::CHARACTER_UPDATED, self.entity, ParamMap::new());
    }

    fn check_timer(&mut self, host: &mut dyn AnimatorHost) {
        let tick_delay = self.current_animator_state().map_or(0.0, AnimatorState::tick_delay);
        self.state_time += self.time_step;
        if self.state_time >= tick_delay {
            self.dispatch(events::END_LOOP, &ParamMap::new(), host);
            self.state_time = 0.0;
        }
    }

    fn check_anim(&mut self, host: &mut dyn AnimatorHost) {
        let Some(current) = self.current else {
            return;
        };
        if current >= self.anim_versions.len() {
            return;
        }
        let length = self
            .clip_at(self.anim_version())
            .unwrap_or_else(AnimInfo::sentinel)
            .clip_length;
        if host.playback_position() >= length - self.time_step {
            self.dispatch(events::END_LOOP, &ParamMap::new(), host);
            self.state_time = 0.0;
        } else {
            self.state_time += self.time_step;
        }
    }

    fn check_empty(&mut self, host: &mut dyn AnimatorHost) {
        let event = if host.inventory_empty().unwrap_or(false) {
            events::INVENTORY_EMPTY
        } else {
            events::INVENTORY_FULL
        };
        host.events().send(event, self.entity, ParamMap::new());
    }

    fn send_event(&mut self, params: &ParamMap, host: &mut dyn AnimatorHost) {
        if let Some(event) = params.get(&DATA_KEY).and_then(Variant::as_hash) {
            host.events().send(event, self.entity, ParamMap::new());
        }
    }

    fn spawn_particle(&mut self, params: &ParamMap, host: &mut dyn AnimatorHost) {
        if self.particle_timer <= self.config.particle_cooldown {
            return;
        }
        self.particle_timer = 0.0;

        let trigger = host.trigger_info();
        let (effect, duration) = match params.values().next().and_then(Variant::as_hash) {
            Some(effect) => (effect, 1.0),
            None => (trigger.kind, trigger.kind2 as f32 * 0.1),
        };
        if effect.is_zero() {
            log::debug!("animator {}: particle trigger without an effect", self.entity);
            return;
        }

        let mut angle = trigger.rotation;
        if angle > 180.0 {
            angle -= 360.0;
        }
        if self.direction.x * self.orientation < 0.0 {
            angle = 180.0 - angle;
        }
        host.spawn_particle(ParticleSpawn {
            effect,
            position: trigger.position,
            angle,
            duration,
        });
    }

    /// Dust or bubbles at the entity's feet, sharing the particle cooldown
    fn spawn_contact_particle(&mut self, effect: NameHash, angle: f32, host: &mut dyn AnimatorHost) {
        if self.particle_timer <= self.config.particle_cooldown {
            return;
        }
        self.particle_timer = 0.0;
        let position = host.position();
        host.spawn_particle(ParticleSpawn {
            effect,
            position,
            angle,
            duration: 0.5,
        });
    }

    fn spawn_entity(&mut self, host: &mut dyn AnimatorHost) {
        match self.spawn_mode {
            SpawnMode::Always => {}
            SpawnMode::SkipOnce => {
                self.spawn_mode = SpawnMode::Always;
                return;
            }
            SpawnMode::Never => return,
        }

        let trigger = host.trigger_info();
        if trigger.kind.is_zero() {
            self.spawn_angle = 0.0;
            return;
        }

        let direction = self.direction.x;
        let aimed = if self.spawn_angle != 0.0 {
            aim_angle(trigger.position, self.shoot_target)
        } else if trigger.rotation < 0.0 {
            trigger.rotation + 360.0
        } else if trigger.rotation > 270.0 {
            trigger.rotation - 360.0
        } else {
            trigger.rotation
        };
        let mut rotation = if aimed > 90.0 { 180.0 - aimed } else { aimed };
        if direction < 0.0 {
            rotation = -rotation;
        }

        let velocity = match trigger.data.trim().parse::<f32>() {
            Ok(speed) => {
                let (sin, cos) = rotation.to_radians().sin_cos();
                Vec2::new(cos, sin) * speed * direction.signum()
            }
            Err(_) => Vec2::ZERO,
        };

        let spawned = host.spawn_entity(EntitySpawn {
            kind: trigger.kind,
            entity_variant: trigger.entity_variant,
            position: trigger.position,
            direction,
            rotation,
            velocity,
            z_index: trigger.z_index,
            owner: self.entity,
        });
        match spawned {
            Some(id) => log::trace!("animator {}: spawned {id} at {rotation} degrees", self.entity),
            None => log::debug!("animator {}: spawn of {} failed", self.entity, trigger.kind),
        }
        self.spawn_angle = 0.0;
    }

    fn spawn_animation(&mut self, host: &mut dyn AnimatorHost) {
        let trigger = host.trigger_info();
        if trigger.kind.is_zero() {
            return;
        }
        host.spawn_animation(AnimationSpawn {
            kind: trigger.kind,
            entity_variant: trigger.entity_variant,
            position: trigger.position,
            direction: self.direction,
            z_index: trigger.z_index,
        });
    }

    fn spawn_furniture(&mut self, params: &ParamMap, host: &mut dyn AnimatorHost) {
        if let Some(kind) = params.get(&DATA_KEY).and_then(Variant::as_hash) {
            let position = host.position();
            host.spawn_furniture(kind, position);
        }
    }

    fn set_light(&mut self, on: bool, host: &mut dyn AnimatorHost) {
        let lit = host.set_light(on);
        log::trace!("animator {}: light requested {on}, now {lit}", self.entity);
    }

    fn check_fire_light(&mut self, host: &mut dyn AnimatorHost) {
        if self.state != states::LIGHTED && self.state != states::UNLIGHTED {
            return;
        }
        let lit = host.set_light(self.state == states::LIGHTED);
        let target = if lit { states::LIGHTED } else { states::UNLIGHTED };
        self.set_state(target, host);
    }

    fn to_disappear(&mut self, params: &ParamMap, host: &mut dyn AnimatorHost) {
        if self.disappear_countdown.is_some() {
            return;
        }
        if self.owner.is_some() {
            let wanted = params.get(&conditions::BUTTON_HOLD).and_then(Variant::as_bool);
            if let (Some(wanted), Some(held)) = (wanted, host.owner_button_held()) {
                if held != wanted {
                    return;
                }
            }
        }
        if self.config.disappear_frames == 0 {
            self.to_destroy(host);
            return;
        }
        self.disappear_countdown = Some(self.config.disappear_frames);
    }

    fn to_destroy(&mut self, host: &mut dyn AnimatorHost) {
        host.request_destroy(self.entity);
        self.disappear_countdown = None;
    }

    // --- instance-level authoring ---

    /// Switch to a private copy of the bound template, creating it on first use
    fn custom_template(&mut self) -> Result<&mut AnimatorTemplate> {
        self.resolve_template();
        let handle = self
            .template
            .take()
            .ok_or_else(|| FlintError::TemplateError(format!("animator {} has no template", self.entity)))?;
        let handle = match handle {
            TemplateHandle::Shared(shared) => {
                log::debug!("animator {}: customizing '{}'", self.entity, shared.name());
                TemplateHandle::Owned(Box::new(shared.derive(TEMPLATE_CUSTOM)))
            }
            owned => owned,
        };
        self.template
            .insert(handle)
            .owned_mut()
            .ok_or_else(|| FlintError::TemplateError("custom template is shared".into()))
    }

    /// Declare or replace a state on this instance only
    pub fn set_state_attr(&mut self, line: &str) -> Result<()> {
        let spec = StateSpec::parse(line)?;
        let catalog = self.catalog.clone();
        catalog.register_name(&spec.name);
        self.custom_template()?.add_state(&spec, catalog.actions());
        self.after_authoring();
        Ok(())
    }

    /// Add or remove an event's transitions on this instance only
    pub fn set_event_attr(&mut self, line: &str) -> Result<()> {
        let spec = EventSpec::parse(line)?;
        let catalog = self.catalog.clone();
        catalog.register_name(&spec.event);
        self.custom_template()?.apply_event_to_states(&spec, catalog.actions());
        self.after_authoring();
        Ok(())
    }

    fn after_authoring(&mut self) {
        self.anim_table = None;
        self.refresh_animation_table();
        if let Some(template) = &self.template {
            self.anim_versions.resize(template.len(), 0);
            if let Some(index) = template.state_index(self.state) {
                self.current = Some(index);
            }
        }
    }

    /// Publish the bound template to the catalog under `name` and select that name
    pub fn register_custom_template(&mut self, name: &str) -> Option<Arc<AnimatorTemplate>> {
        if name.is_empty() {
            return None;
        }
        let copy = self.template.as_deref()?.clone();
        let registered = self.catalog.register_template(name, copy);
        self.template_name = name.to_string();
        Some(registered)
    }

    // --- persistence ---

    pub fn snapshot(&self) -> AnimatorSnapshot {
        AnimatorSnapshot {
            template_name: self.template_name.clone(),
            state: self.state,
            direction: self.direction,
            auto_switch: self.auto_switch,
            event_actions: self.event_actions_spec.clone(),
        }
    }

    /// Load persisted fields; call [`Animator::attach`] afterwards to enter the state
    pub fn restore(&mut self, snapshot: &AnimatorSnapshot) {
        self.set_template_name(&snapshot.template_name);
        self.state = snapshot.state;
        self.current = None;
        self.direction = snapshot.direction;
        self.auto_switch = snapshot.auto_switch;
        self.set_event_actions(&snapshot.event_actions);
    }
}
