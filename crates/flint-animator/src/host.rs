//! Collaborators an animator drives: playback, motion/input, and the world
//!
//! The animator never owns a sprite, a controller, or a scene. Each frame it is
//! handed an [`AnimatorHost`] that exposes those pieces through small traits.

use crate::lookup::AnimationSetDesc;
use crate::names::events;
use bitflags::bitflags;
use flint_core::{EntityId, NameHash};
use flint_runtime::EventBus;
use glam::Vec2;
use std::sync::Arc;

bitflags! {
    /// Movement state published by the movement system
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MoveState: u32 {
        const WALK = 1 << 0;
        const FLY = 1 << 1;
        const SWIM = 1 << 2;
        const CLIMB = 1 << 3;
        const IN_MOVE = 1 << 6;
        const IN_JUMP = 1 << 7;
        const IN_FALL = 1 << 8;
        const IN_AIR = 1 << 9;
        const IN_LIQUID = 1 << 10;
        const TOUCH_GROUND = 1 << 11;
        const TOUCH_WALL = 1 << 12;
        const TOUCH_ROOF = 1 << 13;
        /// Set when facing left
        const DIRECTION = 1 << 16;

        const FLY_AIR = Self::FLY.bits() | Self::IN_AIR.bits();
        const SWIM_LIQUID = Self::SWIM.bits() | Self::IN_LIQUID.bits();
        const CAN_WALK_ON_GROUND = Self::WALK.bits() | Self::TOUCH_GROUND.bits();
    }
}

impl MoveState {
    /// Movement event for this state.
    ///
    /// Priority is fly, climb, swim, walk on ground, then jump/fall. Flying is
    /// ignored while the entity can also walk and touches the ground. Returns
    /// `None` when no movement mode applies.
    pub fn movement_event(self) -> Option<NameHash> {
        let moving = self.contains(Self::IN_MOVE);
        if self.contains(Self::FLY_AIR) && !self.contains(Self::CAN_WALK_ON_GROUND) {
            Some(match (moving, self.contains(Self::IN_JUMP)) {
                (true, true) => events::FLY_UP,
                (true, false) => events::FLY_DOWN,
                (false, _) => events::DEFAULT_AIR,
            })
        } else if self.contains(Self::CLIMB) && self.intersects(Self::TOUCH_WALL | Self::TOUCH_ROOF) {
            Some(if moving { events::CLIMB } else { events::DEFAULT_CLIMB })
        } else if self.contains(Self::SWIM_LIQUID) {
            Some(if moving { events::MOVE_FLUID } else { events::DEFAULT_FLUID })
        } else if self.contains(Self::WALK) {
            Some(if self.contains(Self::TOUCH_GROUND) {
                if moving {
                    events::MOVE_GROUND
                } else {
                    events::DEFAULT_GROUND
                }
            } else if self.contains(Self::IN_JUMP) {
                events::JUMP
            } else {
                events::FALL
            })
        } else {
            None
        }
    }
}

bitflags! {
    /// Directional input buttons currently down
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u32 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const FIRE = 1 << 4;
    }
}

/// Snapshot of the event trigger attached to the playing clip
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriggerInfo {
    /// Object or effect type to spawn, zero when the trigger carries none
    pub kind: NameHash,
    /// Secondary value; for particles, duration in tenths of a second
    pub kind2: u32,
    pub entity_variant: u32,
    pub position: Vec2,
    /// Degrees
    pub rotation: f32,
    pub z_index: i32,
    /// Free-form payload, e.g. a launch velocity
    pub data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSpawn {
    pub effect: NameHash,
    pub position: Vec2,
    pub angle: f32,
    pub duration: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpawn {
    pub kind: NameHash,
    pub entity_variant: u32,
    pub position: Vec2,
    /// Horizontal facing, sign only
    pub direction: f32,
    /// Launch angle in degrees
    pub rotation: f32,
    pub velocity: Vec2,
    pub z_index: i32,
    pub owner: EntityId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSpawn {
    pub kind: NameHash,
    pub entity_variant: u32,
    pub position: Vec2,
    pub direction: Vec2,
    pub z_index: i32,
}

/// The animated drawable
pub trait PlaybackSurface {
    /// Clips available to the drawable, if an animation set is bound
    fn animation_set(&self) -> Option<Arc<AnimationSetDesc>>;

    fn entity_variant(&self) -> usize;

    fn set_entity_variant(&mut self, variant: usize);

    fn active_clip(&self) -> Option<usize>;

    fn set_active_clip(&mut self, clip: usize);

    /// Restart the active clip from its first frame
    fn reset_animation(&mut self);

    /// Seconds into the active clip
    fn playback_position(&self) -> f32;

    fn set_flip(&mut self, flip_x: bool, flip_y: bool);

    /// Add `delta` to the drawable's alpha, clamped by the surface
    fn fade(&mut self, delta: f32);

    fn trigger_info(&self) -> TriggerInfo;
}

/// Read-only movement and controller state
pub trait MotionInput {
    fn move_state(&self) -> MoveState;

    fn buttons(&self) -> Buttons;

    /// Whether the action button is held, `None` without a controller
    fn button_held(&self) -> Option<bool>;

    /// Same as [`MotionInput::button_held`] for the owner's controller
    fn owner_button_held(&self) -> Option<bool> {
        None
    }

    fn has_active_ability(&self, _ability: NameHash) -> bool {
        false
    }

    fn has_ability(&self, _ability: NameHash) -> bool {
        false
    }

    fn position(&self) -> Vec2;
}

/// Side effects in the surrounding world
pub trait WorldActions {
    fn spawn_particle(&mut self, spawn: ParticleSpawn);

    fn spawn_entity(&mut self, spawn: EntitySpawn) -> Option<EntityId>;

    fn spawn_animation(&mut self, _spawn: AnimationSpawn) -> Option<EntityId> {
        None
    }

    fn spawn_furniture(&mut self, _kind: NameHash, _position: Vec2) {}

    /// Switch the entity's light; returns whether it actually ended up lit
    fn set_light(&mut self, _on: bool) -> bool {
        false
    }

    /// `Some(true)` when the inventory is empty, `None` without an inventory
    fn inventory_empty(&self) -> Option<bool> {
        None
    }

    fn request_destroy(&mut self, entity: EntityId);
}

/// Everything an animator needs from the entity it animates
pub trait AnimatorHost: PlaybackSurface + MotionInput + WorldActions {
    fn events(&mut self) -> &mut EventBus;
}
