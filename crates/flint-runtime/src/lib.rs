//! Flint Runtime - Event plumbing shared by game-object components
//!
//! - `GameEvent` - a named event with its sender and parameters
//! - `EventBus` - outgoing event queue plus the per-entity subscription registry

mod event;
mod event_bus;

pub use event::GameEvent;
pub use event_bus::{EventBus, EventSource};
