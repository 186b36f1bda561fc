//! Scripted host for animator tests

use crate::host::{
    AnimationSpawn, AnimatorHost, Buttons, EntitySpawn, MotionInput, MoveState, ParticleSpawn,
    PlaybackSurface, TriggerInfo, WorldActions,
};
use crate::lookup::{AnimationSetDesc, ClipDesc};
use flint_core::{EntityId, NameHash};
use flint_runtime::{EventBus, GameEvent};
use glam::Vec2;
use std::sync::Arc;

/// Records every call the animator makes and plays back scripted input
#[derive(Default)]
pub struct MockHost {
    pub set: Option<Arc<AnimationSetDesc>>,
    pub variant: usize,
    pub active_clip: Option<usize>,
    /// Every clip passed to `set_active_clip`, in order
    pub clip_changes: Vec<usize>,
    pub resets: usize,
    pub playback: f32,
    pub flip: (bool, bool),
    pub alpha: f32,
    pub trigger: TriggerInfo,
    pub move_state: MoveState,
    pub buttons: Buttons,
    pub button_held: Option<bool>,
    pub owner_button_held: Option<bool>,
    pub abilities: Vec<NameHash>,
    pub active_abilities: Vec<NameHash>,
    pub position: Vec2,
    pub particles: Vec<ParticleSpawn>,
    pub spawned: Vec<EntitySpawn>,
    pub animations: Vec<AnimationSpawn>,
    pub furniture: Vec<(NameHash, Vec2)>,
    /// What `set_light` reports; `None` means the light follows the request
    pub light_override: Option<bool>,
    pub light: bool,
    pub inventory_empty: Option<bool>,
    pub destroyed: Vec<EntityId>,
    pub bus: EventBus,
    next_spawn: u64,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            alpha: 1.0,
            next_spawn: 1000,
            ..Default::default()
        }
    }

    /// Host whose single entity variant has `clips` as `(name, length)` pairs
    pub fn with_clips(clips: &[(&str, f32)]) -> Self {
        let variant = clips.iter().map(|(n, l)| ClipDesc::new(n, *l)).collect();
        Self {
            set: Some(Arc::new(AnimationSetDesc::new("test_set", vec![variant]))),
            ..Self::new()
        }
    }

    /// Drain the bus, keeping only events of `kind`
    pub fn take_events(&mut self, kind: NameHash) -> Vec<GameEvent> {
        self.bus.drain().into_iter().filter(|e| e.kind == kind).collect()
    }
}

impl PlaybackSurface for MockHost {
    fn animation_set(&self) -> Option<Arc<AnimationSetDesc>> {
        self.set.clone()
    }

    fn entity_variant(&self) -> usize {
        self.variant
    }

    fn set_entity_variant(&mut self, variant: usize) {
        self.variant = variant;
    }

    fn active_clip(&self) -> Option<usize> {
        self.active_clip
    }

    fn set_active_clip(&mut self, clip: usize) {
        self.active_clip = Some(clip);
        self.clip_changes.push(clip);
        self.playback = 0.0;
    }

    fn reset_animation(&mut self) {
        self.resets += 1;
        self.playback = 0.0;
    }

    fn playback_position(&self) -> f32 {
        self.playback
    }

    fn set_flip(&mut self, flip_x: bool, flip_y: bool) {
        self.flip = (flip_x, flip_y);
    }

    fn fade(&mut self, delta: f32) {
        self.alpha = (self.alpha + delta).clamp(0.0, 1.0);
    }

    fn trigger_info(&self) -> TriggerInfo {
        self.trigger.clone()
    }
}

impl MotionInput for MockHost {
    fn move_state(&self) -> MoveState {
        self.move_state
    }

    fn buttons(&self) -> Buttons {
        self.buttons
    }

    fn button_held(&self) -> Option<bool> {
        self.button_held
    }

    fn owner_button_held(&self) -> Option<bool> {
        self.owner_button_held
    }

    fn has_active_ability(&self, ability: NameHash) -> bool {
        self.active_abilities.contains(&ability)
    }

    fn has_ability(&self, ability: NameHash) -> bool {
        self.abilities.contains(&ability)
    }

    fn position(&self) -> Vec2 {
        self.position
    }
}

impl WorldActions for MockHost {
    fn spawn_particle(&mut self, spawn: ParticleSpawn) {
        self.particles.push(spawn);
    }

    fn spawn_entity(&mut self, spawn: EntitySpawn) -> Option<EntityId> {
        self.spawned.push(spawn);
        self.next_spawn += 1;
        Some(EntityId::from_raw(self.next_spawn))
    }

    fn spawn_animation(&mut self, spawn: AnimationSpawn) -> Option<EntityId> {
        self.animations.push(spawn);
        self.next_spawn += 1;
        Some(EntityId::from_raw(self.next_spawn))
    }

    fn spawn_furniture(&mut self, kind: NameHash, position: Vec2) {
        self.furniture.push((kind, position));
    }

    fn set_light(&mut self, on: bool) -> bool {
        self.light = self.light_override.unwrap_or(on);
        self.light
    }

    fn inventory_empty(&self) -> Option<bool> {
        self.inventory_empty
    }

    fn request_destroy(&mut self, entity: EntityId) {
        self.destroyed.push(entity);
    }
}

impl AnimatorHost for MockHost {
    fn events(&mut self) -> &mut EventBus {
        &mut self.bus
    }
}
