//! Built-in actions and the registry that resolves action specs
//!
//! An action spec is `Name` or `Name(param,param,...)`. Params are
//! separated by `,` or `|`:
//! - `hash:x` / `float:x` / `int:x` (or `=` instead of `:`) store a typed
//!   value under [`DATA_KEY`]
//! - `key=true` / `key=false` store a bool under `hash(key)`
//! - `key=value` stores a string under `hash(key)`
//! - bare `true` / `false` store a bool under [`DATA_KEY`]
//! - any other bare token is stored as a string under [`DATA_KEY`]

use flint_core::{NameHash, ParamMap, Variant, DATA_KEY};
use std::collections::HashMap;
use std::fmt;

/// The closed set of behaviours an action can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Null,
    FindState,
    ChangeEntity,
    ChangeAnimation,
    CheckTimer,
    CheckAnim,
    CheckEmpty,
    SendEvent,
    SpawnParticle,
    SpawnEntity,
    SpawnAnimation,
    SpawnFurniture,
    LightOn,
    LightOff,
    CheckFireLight,
    ToDisappear,
    ToDestroy,
}

impl ActionKind {
    pub const ALL: [ActionKind; 17] = [
        ActionKind::Null,
        ActionKind::FindState,
        ActionKind::ChangeEntity,
        ActionKind::ChangeAnimation,
        ActionKind::CheckTimer,
        ActionKind::CheckAnim,
        ActionKind::CheckEmpty,
        ActionKind::SendEvent,
        ActionKind::SpawnParticle,
        ActionKind::SpawnEntity,
        ActionKind::SpawnAnimation,
        ActionKind::SpawnFurniture,
        ActionKind::LightOn,
        ActionKind::LightOff,
        ActionKind::CheckFireLight,
        ActionKind::ToDisappear,
        ActionKind::ToDestroy,
    ];

    /// Name under which the built-in is registered
    pub fn builtin_name(&self) -> &'static str {
        match self {
            ActionKind::Null => "AAction_Null",
            ActionKind::FindState => "AAction_FindState",
            ActionKind::ChangeEntity => "AAction_ChangeEntity",
            ActionKind::ChangeAnimation => "AAction_ChangeAnim",
            ActionKind::CheckTimer => "AAction_CheckTimer",
            ActionKind::CheckAnim => "AAction_CheckAnim",
            ActionKind::CheckEmpty => "AAction_CheckEmpty",
            ActionKind::SendEvent => "AAction_SendEvent",
            ActionKind::SpawnParticle => "AAction_SpawnParticule",
            ActionKind::SpawnEntity => "AAction_SpawnEntity",
            ActionKind::SpawnAnimation => "AAction_SpawnAnimation",
            ActionKind::SpawnFurniture => "AAction_SpawnFurniture",
            ActionKind::LightOn => "AAction_LightOn",
            ActionKind::LightOff => "AAction_LightOff",
            ActionKind::CheckFireLight => "AAction_CheckFireLight",
            ActionKind::ToDisappear => "AAction_ToDisappear",
            ActionKind::ToDestroy => "AAction_ToDestroy",
        }
    }
}

/// A resolved action: a registered behaviour plus the params it was authored with
#[derive(Debug, Clone)]
pub struct Action {
    name: String,
    hash: NameHash,
    kind: ActionKind,
    params: ParamMap,
    spec: String,
}

impl Action {
    pub fn new(name: &str, kind: ActionKind) -> Self {
        Self {
            name: name.to_string(),
            hash: NameHash::new(name),
            kind,
            params: ParamMap::new(),
            spec: name.to_string(),
        }
    }

    /// The null action, a no-op
    pub fn null() -> Self {
        Self::new(ActionKind::Null.builtin_name(), ActionKind::Null)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> NameHash {
        self.hash
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn is_null(&self) -> bool {
        self.kind == ActionKind::Null
    }

    /// Normalized authoring text, reparseable by [`ActionRegistry::resolve`]
    pub fn to_spec(&self) -> String {
        self.spec.clone()
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.params == other.params
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

/// Join action specs the way they are authored, `;`-separated
pub fn actions_to_spec(actions: &[Action]) -> String {
    actions
        .iter()
        .map(|a| a.to_spec())
        .collect::<Vec<_>>()
        .join(";")
}

/// Mapping from action name hash to its behaviour.
///
/// Populated once while building the catalog and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: HashMap<NameHash, Action>,
    null: Action,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    /// A registry holding only the null action
    pub fn new() -> Self {
        let null = Action::null();
        let mut actions = HashMap::new();
        actions.insert(null.hash(), null.clone());
        Self { actions, null }
    }

    /// A registry holding every built-in action under its standard name
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in ActionKind::ALL {
            registry.register(kind.builtin_name(), kind);
        }
        registry
    }

    /// Register `name` as an alias for `kind`, replacing any earlier registration
    pub fn register(&mut self, name: &str, kind: ActionKind) -> NameHash {
        let action = Action::new(name, kind);
        let hash = action.hash();
        self.actions.insert(hash, action);
        hash
    }

    /// Look up an action; unknown names resolve to the null action
    pub fn lookup(&self, hash: NameHash) -> &Action {
        self.actions.get(&hash).unwrap_or(&self.null)
    }

    pub fn get(&self, hash: NameHash) -> Option<&Action> {
        self.actions.get(&hash)
    }

    pub fn contains(&self, hash: NameHash) -> bool {
        self.actions.contains_key(&hash)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Resolve a single action spec. Returns `None` if the name is not registered.
    pub fn resolve(&self, spec: &str) -> Option<Action> {
        let (name, params) = split_spec(spec);
        if name.is_empty() {
            return None;
        }
        let base = self.get(NameHash::new(name))?;
        let mut action = base.clone();
        action.spec = if params.is_empty() {
            base.name.clone()
        } else {
            format!("{}({})", base.name, params.join("|"))
        };
        action.params = parse_params(&params);
        Some(action)
    }

    /// Resolve a `;`-separated list of action specs.
    ///
    /// Unknown actions are logged and skipped.
    pub fn resolve_list(&self, specs: &str) -> Vec<Action> {
        let mut out = Vec::new();
        for spec in split_top_level(specs, ';') {
            let spec = spec.trim();
            if spec.is_empty() {
                continue;
            }
            match self.resolve(spec) {
                Some(action) => out.push(action),
                None => log::error!("unknown action '{spec}' skipped"),
            }
        }
        out
    }
}

/// Split `s` on `sep`, ignoring separators inside parentheses
pub(crate) fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Split `Name(p1,p2)` into the trimmed name and the trimmed, non-empty params
fn split_spec(spec: &str) -> (&str, Vec<&str>) {
    let spec = spec.trim();
    let Some(open) = spec.find('(') else {
        return (spec, Vec::new());
    };
    let name = spec[..open].trim();
    let body = &spec[open + 1..];
    let body = body.strip_suffix(')').unwrap_or(body);
    let params = body
        .split([',', '|'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    (name, params)
}

fn parse_params(tokens: &[&str]) -> ParamMap {
    let mut params = ParamMap::new();
    for token in tokens {
        let (key, value) = parse_param(token);
        params.insert(key, value);
    }
    params
}

fn parse_param(token: &str) -> (NameHash, Variant) {
    if let Some((key, value)) = token.split_once('=').or_else(|| token.split_once(':')) {
        let (key, value) = (key.trim(), value.trim());
        if let Some(typed) = parse_typed(key, value) {
            return (DATA_KEY, typed);
        }
        if token.contains('=') {
            return match parse_bool(value) {
                Some(b) => (NameHash::new(key), Variant::Bool(b)),
                None => (NameHash::new(key), Variant::Str(value.to_string())),
            };
        }
    }
    match parse_bool(token) {
        Some(b) => (DATA_KEY, Variant::Bool(b)),
        None => (DATA_KEY, Variant::Str(token.to_string())),
    }
}

fn parse_typed(kind: &str, value: &str) -> Option<Variant> {
    if kind.eq_ignore_ascii_case("hash") {
        Some(Variant::Hash(NameHash::new(value)))
    } else if kind.eq_ignore_ascii_case("float") {
        Some(Variant::Float(value.parse().unwrap_or_else(|_| {
            log::warn!("bad float action param '{value}'");
            0.0
        })))
    } else if kind.eq_ignore_ascii_case("int") {
        Some(Variant::Int(value.parse().unwrap_or_else(|_| {
            log::warn!("bad int action param '{value}'");
            0
        })))
    } else {
        None
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
