//! Reserved names understood by the animator core

use flint_core::NameHash;

/// Token in an `applyToStates` list meaning every state
pub const ALL_STATES: &str = "ALL";

pub const TEMPLATE_EMPTY: &str = "AnimatorTemplate_Empty";
pub const TEMPLATE_DEFAULT: &str = "AnimatorTemplate_Default";
pub const TEMPLATE_CUSTOM: &str = "AnimatorTemplate_Custom";

/// Events consumed or emitted by the state machine
pub mod events {
    use super::NameHash;

    pub const START_LOOP: NameHash = NameHash::new("AEvent_StartLoop");
    pub const TICK_LOOP: NameHash = NameHash::new("AEvent_TickLoop");
    pub const END_LOOP: NameHash = NameHash::new("AEvent_EndLoop");
    pub const END_LOOP_NAME: &str = "AEvent_EndLoop";

    pub const CHANGE_AREA: NameHash = NameHash::new("Event_ChangeArea");

    pub const DEFAULT_GROUND: NameHash = NameHash::new("Event_Default_Ground");
    pub const DEFAULT_AIR: NameHash = NameHash::new("Event_Default_Air");
    pub const DEFAULT_CLIMB: NameHash = NameHash::new("Event_Default_Climb");
    pub const DEFAULT_FLUID: NameHash = NameHash::new("Event_Default_Fluid");
    pub const MOVE_GROUND: NameHash = NameHash::new("Event_OnWalk");
    pub const MOVE_FLUID: NameHash = NameHash::new("Event_OnSwim");
    pub const FALL: NameHash = NameHash::new("Event_OnFall");
    pub const JUMP: NameHash = NameHash::new("Event_OnJump");
    pub const FLY_UP: NameHash = NameHash::new("Event_OnFlyUp");
    pub const FLY_DOWN: NameHash = NameHash::new("Event_OnFlyDown");
    pub const CLIMB: NameHash = NameHash::new("Event_OnClimb");

    pub const ON_DESTROY: NameHash = NameHash::new("Event_OnDestroy");

    pub const CHANGE_STATE: NameHash = NameHash::new("Go_ChangeState");
    pub const INVENTORY_EMPTY: NameHash = NameHash::new("Go_InventoryEmpty");
    pub const INVENTORY_FULL: NameHash = NameHash::new("Go_InventoryFull");
    pub const CHARACTER_UPDATED: NameHash = NameHash::new("CharacterUpdated");

    /// Contact notifications from the physics side
    pub const TOUCH_GROUND: NameHash = NameHash::new("Go_CollideGround");
    pub const TOUCH_FLUID: NameHash = NameHash::new("Go_CollideFluid");
    /// Ask the entity to turn around
    pub const CHANGE_DIRECTION: NameHash = NameHash::new("Go_ChangeDirection");
    /// AI order carrying the state to enter under [`super::params::ORDER`]
    pub const CHANGE_ORDER: NameHash = NameHash::new("Ai_ChangeOrder");
}

/// States the core refers to directly
pub mod states {
    use super::NameHash;

    pub const APPEAR: NameHash = NameHash::new("State_Appear");
    pub const DEFAULT_GROUND: NameHash = NameHash::new("State_Default_Ground");
    pub const DISAPPEAR: NameHash = NameHash::new("State_Disappear");
    pub const DESTROY: NameHash = NameHash::new("State_Destroy");
    pub const LIGHTED: NameHash = NameHash::new("State_Lighted");
    pub const UNLIGHTED: NameHash = NameHash::new("State_Unlighted");
}

/// Guard condition keys and values
pub mod conditions {
    use super::NameHash;

    pub const TRUE: NameHash = NameHash::new("true");
    pub const FALSE: NameHash = NameHash::new("false");
    pub const ACTIVE_ABILITY: NameHash = NameHash::new("ActiveAbility");
    pub const ABILITY: NameHash = NameHash::new("Ability");
    pub const MAX_TICK_DELAY: NameHash = NameHash::new("MaxTickDelay");
    pub const BUTTON_HOLD: NameHash = NameHash::new("ButtonHold");
}

/// Parameter keys on outgoing events
pub mod params {
    use super::NameHash;

    pub const STATE: NameHash = NameHash::new("State");
    pub const ORDER: NameHash = NameHash::new("Ai_Order");
}

/// Particle effects spawned by the core itself
pub mod effects {
    use super::NameHash;

    pub const LIFE_FLAME: NameHash = NameHash::new("Effect_LifeFlame");
    pub const DUST: NameHash = NameHash::new("Effect_Dust");
    pub const BUBBLES: NameHash = NameHash::new("Effect_Bubbles");
}
