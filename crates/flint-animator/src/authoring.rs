//! Parsing of state and event authoring lines
//!
//! ```text
//! name:State_Walk|animKeyWords:walk;run|directional:false|tick:0.5|action:AAction_ChangeAnim
//! name:Event_OnWalk@Owner|nextState:State_Walk|applyToStates:State_Idle;State_Run|condition:ButtonHold=true|action:AAction_Null
//! ```
//! Fields are separated by `|` outside of action parentheses, and each
//! field is `key:value` with the key matched case-insensitively.

use crate::action::split_top_level;
use crate::transition::SenderScope;
use flint_core::{FlintError, Result};
use serde::{Deserialize, Serialize};

/// A state declaration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateSpec {
    pub name: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub directional: bool,
    #[serde(default)]
    pub tick_delay: f32,
    #[serde(default)]
    pub actions: String,
}

impl StateSpec {
    pub fn new(name: &str, keywords: &str) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.to_string(),
            ..Default::default()
        }
    }

    pub fn directional(mut self, directional: bool) -> Self {
        self.directional = directional;
        self
    }

    pub fn tick(mut self, tick_delay: f32) -> Self {
        self.tick_delay = tick_delay;
        self
    }

    pub fn actions(mut self, actions: &str) -> Self {
        self.actions = actions.to_string();
        self
    }

    /// Parse a `name:...|animKeyWords:...|...` line
    pub fn parse(line: &str) -> Result<Self> {
        let mut spec = StateSpec::default();
        for (key, value) in fields(line) {
            match key.to_ascii_lowercase().as_str() {
                "name" => spec.name = value.to_string(),
                "animkeywords" => spec.keywords = value.to_string(),
                "directional" => spec.directional = parse_flag(value),
                "tick" => {
                    spec.tick_delay = value.parse().map_err(|_| {
                        FlintError::ParseError(format!("bad tick '{value}' in state '{line}'"))
                    })?
                }
                "action" => spec.actions = value.to_string(),
                _ => log::warn!("unknown state field '{key}' in '{line}'"),
            }
        }
        if spec.name.is_empty() {
            return Err(FlintError::ParseError(format!("state without name: '{line}'")));
        }
        Ok(spec)
    }
}

/// An event declaration applied to a list of states
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventSpec {
    pub event: String,
    #[serde(default)]
    pub sender: SenderScope,
    #[serde(default)]
    pub next_state: String,
    /// `;`-separated state names, `ALL`, or `!name` to remove
    #[serde(default)]
    pub apply_to: String,
    /// `key[=value]`
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub actions: String,
}

impl EventSpec {
    pub fn new(event: &str, apply_to: &str) -> Self {
        Self {
            event: event.to_string(),
            apply_to: apply_to.to_string(),
            ..Default::default()
        }
    }

    pub fn sender(mut self, sender: SenderScope) -> Self {
        self.sender = sender;
        self
    }

    pub fn next(mut self, next_state: &str) -> Self {
        self.next_state = next_state.to_string();
        self
    }

    pub fn condition(mut self, condition: &str) -> Self {
        self.condition = condition.to_string();
        self
    }

    pub fn actions(mut self, actions: &str) -> Self {
        self.actions = actions.to_string();
        self
    }

    /// Parse a `name:Event[@Sender]|nextState:...|...` line
    pub fn parse(line: &str) -> Result<Self> {
        let mut spec = EventSpec::default();
        for (key, value) in fields(line) {
            match key.to_ascii_lowercase().as_str() {
                "name" => {
                    let (event, sender) = value.split_once('@').unwrap_or((value, ""));
                    spec.event = event.trim().to_string();
                    spec.sender = SenderScope::parse(sender);
                }
                "nextstate" => spec.next_state = value.to_string(),
                "action" => spec.actions = value.to_string(),
                "applytostates" => spec.apply_to = value.to_string(),
                "condition" => spec.condition = value.to_string(),
                _ => log::warn!("unknown event field '{key}' in '{line}'"),
            }
        }
        if spec.event.is_empty() {
            return Err(FlintError::ParseError(format!("event without name: '{line}'")));
        }
        Ok(spec)
    }
}

fn fields(line: &str) -> impl Iterator<Item = (&str, &str)> {
    split_top_level(line, '|').into_iter().filter_map(|field| {
        let (key, value) = field.split_once(':')?;
        Some((key.trim(), value.trim()))
    })
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_state_line() {
        let spec = StateSpec::parse(
            "name:State_Attack|animKeyWords:atk;hit|directional:true|tick:0.5|action:AAction_SpawnParticule(hash:Effect_Spark|float:2)",
        )
        .unwrap();
        assert_eq!(spec.name, "State_Attack");
        assert_eq!(spec.keywords, "atk;hit");
        assert!(spec.directional);
        assert!((spec.tick_delay - 0.5).abs() < 1e-5);
        assert_eq!(spec.actions, "AAction_SpawnParticule(hash:Effect_Spark|float:2)");
    }

    #[test]
    fn state_requires_name_and_valid_tick() {
        assert!(StateSpec::parse("animKeyWords:idle").is_err());
        assert!(StateSpec::parse("name:State_Idle|tick:soon").is_err());
    }

    #[test]
    fn parse_event_line() {
        let spec = EventSpec::parse(
            "name:Event_OnJump@Owner|nextState:State_Jump|applyToStates:State_Idle;!State_Walk|condition:ButtonHold=true",
        )
        .unwrap();
        assert_eq!(spec.event, "Event_OnJump");
        assert_eq!(spec.sender, SenderScope::Owner);
        assert_eq!(spec.next_state, "State_Jump");
        assert_eq!(spec.apply_to, "State_Idle;!State_Walk");
        assert_eq!(spec.condition, "ButtonHold=true");
        assert!(spec.actions.is_empty());
    }

    #[test]
    fn event_defaults_to_entity_sender() {
        let spec = EventSpec::parse("name:Event_OnFall|applyToStates:ALL").unwrap();
        assert_eq!(spec.sender, SenderScope::Entity);
        assert!(EventSpec::parse("nextState:State_Fall").is_err());
    }
}
