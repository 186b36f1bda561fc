//! Template-driven animation state machines for Flint game objects
//!
//! - **Catalog**: registered actions and shared [`AnimatorTemplate`]s, built
//!   once and handed to every instance as an `Arc<AnimatorCatalog>`
//! - **Templates**: states, per-state transition tables, and the clip lookup
//!   for each animation set, authored from `key:value|...` lines or
//!   `*.animator.toml` files
//! - **Instances**: one [`Animator`] per entity, driven by events and a
//!   per-frame update, talking to its entity through [`AnimatorHost`]

pub mod action;
pub mod authoring;
pub mod catalog;
pub mod config;
pub mod host;
pub mod instance;
pub mod loader;
pub mod lookup;
pub mod names;
pub mod state;
pub mod template;
pub mod transition;

#[cfg(test)]
mod testing;

pub use action::{Action, ActionKind, ActionRegistry};
pub use authoring::{EventSpec, StateSpec};
pub use catalog::AnimatorCatalog;
pub use config::AnimatorConfig;
pub use host::{AnimatorHost, Buttons, MotionInput, MoveState, PlaybackSurface, WorldActions};
pub use instance::{Animator, AnimatorSnapshot, ForceSource, ForcedState, SpawnMode};
pub use lookup::{AnimInfo, AnimSetTable, AnimationSetDesc, ClipDesc};
pub use state::AnimatorState;
pub use template::{AnimatorTemplate, BakeReport, TemplateHandle};
pub use transition::{Guard, SenderScope, Transition, TransitionTable};
