//! TOML-based template loading
//!
//! A template file wraps the line-based authoring grammar:
//! ```toml
//! [template]
//! name = "AnimatorTemplate_Goblin"
//! base = "AnimatorTemplate_Default"   # optional
//! states = [
//!     "name:State_Walk|animKeyWords:walk",
//! ]
//! events = [
//!     "name:Event_OnWalk|applyToStates:State_Default|nextState:State_Walk",
//! ]
//! ```

use crate::authoring::{EventSpec, StateSpec};
use crate::catalog::AnimatorCatalog;
use crate::template::AnimatorTemplate;
use flint_core::{FlintError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Suffix a file needs to be picked up by [`load_templates_from_directory`]
pub const TEMPLATE_FILE_SUFFIX: &str = ".animator.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateFile {
    pub template: TemplateDef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateDef {
    pub name: String,
    /// Registered template to start from
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

/// Load a template from a `.animator.toml` file and register it
pub fn load_template_from_file(catalog: &AnimatorCatalog, path: &Path) -> Result<Arc<AnimatorTemplate>> {
    let def = read_template_file(path)?;
    build_and_register(catalog, &def)
}

/// Parse a template from a TOML string and register it
pub fn load_template_str(catalog: &AnimatorCatalog, content: &str) -> Result<Arc<AnimatorTemplate>> {
    let file: TemplateFile = toml::from_str(content)?;
    build_and_register(catalog, &file.template)
}

/// Register every `*.animator.toml` template in `dir`.
///
/// Files may derive from templates defined elsewhere in the same
/// directory; they are registered once their base is available.
pub fn load_templates_from_directory(
    catalog: &AnimatorCatalog,
    dir: &Path,
) -> Result<Vec<Arc<AnimatorTemplate>>> {
    let mut pending = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_path = entry.path();
        let is_template = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(TEMPLATE_FILE_SUFFIX))
            .unwrap_or(false);
        if is_template {
            pending.push(read_template_file(&file_path)?);
        }
    }
    pending.sort_by(|a, b| a.name.cmp(&b.name));

    let mut loaded = Vec::new();
    while !pending.is_empty() {
        let (ready, waiting): (Vec<_>, Vec<_>) = pending.into_iter().partition(|def| {
            def.base
                .as_deref()
                .map(|base| catalog.template_by_name(base).is_some())
                .unwrap_or(true)
        });
        if ready.is_empty() {
            let names: Vec<_> = waiting.iter().map(|d| d.name.as_str()).collect();
            return Err(FlintError::TemplateError(format!(
                "unknown base template for {} in {}",
                names.join(", "),
                dir.display()
            )));
        }
        for def in &ready {
            loaded.push(build_and_register(catalog, def)?);
        }
        pending = waiting;
    }

    log::debug!("loaded {} animator template(s) from {}", loaded.len(), dir.display());
    Ok(loaded)
}

fn read_template_file(path: &Path) -> Result<TemplateDef> {
    let content = fs::read_to_string(path).map_err(|e| {
        FlintError::TemplateError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let file: TemplateFile = toml::from_str(&content).map_err(|e| {
        FlintError::TemplateError(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    Ok(file.template)
}

fn build_and_register(catalog: &AnimatorCatalog, def: &TemplateDef) -> Result<Arc<AnimatorTemplate>> {
    let name = def.name.trim();
    if name.is_empty() {
        return Err(FlintError::TemplateError("template without a name".into()));
    }

    let mut template = match def.base.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        Some(base) => catalog
            .template_by_name(base)
            .ok_or_else(|| {
                FlintError::TemplateError(format!("template '{name}' derives from unknown '{base}'"))
            })?
            .derive(name),
        None => AnimatorTemplate::new(name),
    };

    for line in &def.states {
        let spec = StateSpec::parse(line)?;
        template.add_state(&spec, catalog.actions());
    }
    for line in &def.events {
        let spec = EventSpec::parse(line)?;
        catalog.register_name(&spec.event);
        template.apply_event_to_states(&spec, catalog.actions());
    }

    // Unresolved targets are a load error here rather than a dropped edge
    template.bake().into_result()?;

    if catalog.contains_template(template.hash()) {
        log::warn!("template '{name}' is already registered, keeping the first one");
    }
    Ok(catalog.register_template(name, template))
}
