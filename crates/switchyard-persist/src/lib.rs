//! Rewrites persisted payloads between the inline form (full configuration
//! bodies embedded) and the reference form (`{"profile_id": ...}` pointers).

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use switchyard_core::{
    LlmProfile, ModeConflict, ProfileError, ProfileSource, Result, resolve_inline,
};
use tracing::debug;

mod settings;

pub use settings::{load_agent_settings, save_agent_settings, slots_path};

/// Usage slot of each embedded configuration, keyed by JSON pointer.
pub type SlotMap = BTreeMap<String, String>;

/// What a JSON mapping inside a payload represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// An embedded configuration: has `model` and `usage_id` (or `service_id`).
    Configuration,
    /// A pointer to a stored profile: has `profile_id` and no `model`.
    Reference,
    Plain,
}

pub fn classify(mapping: &Map<String, Value>) -> PayloadKind {
    let has_model = mapping.contains_key("model");
    if has_model && (mapping.contains_key("usage_id") || mapping.contains_key("service_id")) {
        PayloadKind::Configuration
    } else if !has_model && mapping.contains_key("profile_id") {
        PayloadKind::Reference
    } else {
        PayloadKind::Plain
    }
}

/// Prepare `payload` for storage.
///
/// In reference mode every embedded configuration that carries a non-empty
/// `profile_id` collapses to `{"profile_id": <id>}`. Configurations without
/// one are kept whole. Inline mode returns the payload unchanged.
pub fn compact(payload: &Value, inline: Option<bool>) -> Value {
    if resolve_inline(inline) {
        return payload.clone();
    }
    compact_value(payload)
}

fn compact_value(value: &Value) -> Value {
    match value {
        Value::Object(mapping) => {
            let compacted: Map<String, Value> = mapping
                .iter()
                .map(|(key, item)| (key.clone(), compact_value(item)))
                .collect();
            if classify(&compacted) == PayloadKind::Configuration
                && let Some(profile_id) = compacted
                    .get("profile_id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
            {
                return reference(profile_id);
            }
            Value::Object(compacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(compact_value).collect()),
        other => other.clone(),
    }
}

fn reference(profile_id: &str) -> Value {
    let mut mapping = Map::new();
    mapping.insert("profile_id".to_string(), Value::String(profile_id.to_string()));
    Value::Object(mapping)
}

/// Resolve every profile reference in `payload` through `source`.
///
/// A reference that also names a `usage_id` keeps it on the expanded body.
/// With inline mode enforced any reference is a [`ModeConflict`], raised
/// before `source` is consulted. References found inside a profile that was
/// itself pulled in by a reference are rejected.
pub fn expand(payload: &Value, inline: Option<bool>, source: &impl ProfileSource) -> Result<Value> {
    let expander = Expander {
        inline: resolve_inline(inline),
        source,
    };
    expander.expand_value(payload, None)
}

struct Expander<'a, S> {
    inline: bool,
    source: &'a S,
}

impl<S: ProfileSource> Expander<'_, S> {
    /// `via` names the profile whose body is being walked, if any.
    fn expand_value(&self, value: &Value, via: Option<&str>) -> Result<Value> {
        match value {
            Value::Object(mapping) => {
                let mut expanded = Map::with_capacity(mapping.len());
                for (key, item) in mapping {
                    expanded.insert(key.clone(), self.expand_value(item, via)?);
                }
                if classify(&expanded) == PayloadKind::Reference {
                    return self.resolve(&expanded, via);
                }
                Ok(Value::Object(expanded))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.expand_value(item, via))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn resolve(&self, reference: &Map<String, Value>, via: Option<&str>) -> Result<Value> {
        let profile_id = match reference.get("profile_id") {
            Some(Value::String(id)) => id.as_str(),
            Some(other) => {
                return Err(ProfileError::validation(format!(
                    "profile_id: expected a string, found {other}"
                )));
            }
            None => return Err(ProfileError::validation("profile_id: field required")),
        };
        if self.inline {
            return Err(ModeConflict::ReferenceWhileInline {
                profile_id: profile_id.to_string(),
            }
            .into());
        }
        if let Some(via) = via {
            return Err(ProfileError::IndirectReference {
                profile_id: profile_id.to_string(),
                via: via.to_string(),
            });
        }

        let profile = self.source.load_profile(profile_id)?;
        let mut body = profile.to_document(true)?;
        body.insert("profile_id".to_string(), Value::String(profile_id.to_string()));
        if let Some(usage_id) = reference.get("usage_id").and_then(Value::as_str) {
            body.insert("usage_id".to_string(), Value::String(usage_id.to_string()));
        }
        debug!(profile_id, model = %profile.model, "expanded profile reference");
        self.expand_value(&Value::Object(body), Some(profile_id))
    }
}

/// Fail when a runtime switch of `usage_id` would conflict with enforced
/// inline persistence. Switching only makes sense when references are kept.
pub fn ensure_switchable(usage_id: &str, inline: Option<bool>) -> Result<()> {
    if resolve_inline(inline) {
        return Err(ModeConflict::SwitchWhileInline {
            usage_id: usage_id.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Every embedded configuration in `payload`, in document order.
pub fn collect_configurations(payload: &Value) -> Result<Vec<LlmProfile>> {
    let mut found = Vec::new();
    collect_into(payload, &mut found)?;
    Ok(found)
}

fn collect_into(value: &Value, found: &mut Vec<LlmProfile>) -> Result<()> {
    match value {
        Value::Object(mapping) if classify(mapping) == PayloadKind::Configuration => {
            found.push(LlmProfile::from_document(value.clone())?);
        }
        Value::Object(mapping) => {
            for item in mapping.values() {
                collect_into(item, found)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_into(item, found)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Overwrite every embedded configuration bound to `llm.usage_id` with `llm`.
/// Returns how many were replaced.
pub fn replace_slot(payload: &mut Value, llm: &LlmProfile) -> Result<usize> {
    let mut body = llm.to_document(true)?;
    if let Some(profile_id) = &llm.profile_id {
        body.insert("profile_id".to_string(), Value::String(profile_id.clone()));
    }
    let replacement = Value::Object(body);
    Ok(replace_into(payload, &llm.usage_id, &replacement))
}

fn replace_into(value: &mut Value, usage_id: &str, replacement: &Value) -> usize {
    match value {
        Value::Object(mapping) if classify(mapping) == PayloadKind::Configuration => {
            if bound_usage(mapping) == Some(usage_id) {
                *value = replacement.clone();
                1
            } else {
                0
            }
        }
        Value::Object(mapping) => mapping
            .values_mut()
            .map(|item| replace_into(item, usage_id, replacement))
            .sum(),
        Value::Array(items) => items
            .iter_mut()
            .map(|item| replace_into(item, usage_id, replacement))
            .sum(),
        _ => 0,
    }
}

/// Record the slot of every configuration that reference-mode compaction
/// would collapse. A reference fragment carries only `profile_id`, so the
/// slot is otherwise lost once the stored profile names a different usage.
pub fn slot_map(payload: &Value) -> SlotMap {
    let mut slots = SlotMap::new();
    record_slots(payload, String::new(), &mut slots);
    slots
}

fn record_slots(value: &Value, pointer: String, slots: &mut SlotMap) {
    match value {
        Value::Object(mapping) => {
            if classify(mapping) == PayloadKind::Configuration
                && mapping
                    .get("profile_id")
                    .and_then(Value::as_str)
                    .is_some_and(|id| !id.is_empty())
                && let Some(usage_id) = bound_usage(mapping)
            {
                slots.insert(pointer, usage_id.to_string());
                return;
            }
            for (key, item) in mapping {
                record_slots(item, format!("{pointer}/{}", escape_token(key)), slots);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                record_slots(item, format!("{pointer}/{index}"), slots);
            }
        }
        _ => {}
    }
}

fn escape_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn bound_usage(mapping: &Map<String, Value>) -> Option<&str> {
    mapping
        .get("usage_id")
        .or_else(|| mapping.get("service_id"))
        .and_then(Value::as_str)
}

/// Rebind the configurations at the pointers in `slots` to their recorded
/// usage. Pointers that no longer lead to a configuration are skipped.
/// Returns how many were rebound.
pub fn restore_slots(payload: &mut Value, slots: &SlotMap) -> usize {
    let mut restored = 0;
    for (pointer, usage_id) in slots {
        let Some(Value::Object(mapping)) = payload.pointer_mut(pointer) else {
            debug!(pointer = %pointer, "recorded slot no longer present");
            continue;
        };
        if classify(mapping) != PayloadKind::Configuration {
            continue;
        }
        mapping.remove("service_id");
        mapping.insert("usage_id".to_string(), Value::String(usage_id.clone()));
        restored += 1;
    }
    restored
}
