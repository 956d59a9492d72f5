use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use crate::error::ProfileError;

pub const INLINE_ENV_VAR: &str = "SWITCHYARD_INLINE_CONVERSATIONS";
pub const PROFILES_DIR_ENV_VAR: &str = "SWITCHYARD_PROFILES_DIR";
pub const SETTINGS_ENV_VAR: &str = "SWITCHYARD_SETTINGS";

const FALSE_VALUES: &[&str] = &["0", "false", "no"];

pub fn home_dir() -> Option<PathBuf> {
    let home = std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())?;
    Some(PathBuf::from(home))
}

/// `~/.switchyard`, the root of everything this workspace writes.
pub fn runtime_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".switchyard"))
}

pub fn default_profiles_dir() -> Option<PathBuf> {
    runtime_dir().map(|dir| dir.join("llm-profiles"))
}

pub fn default_agent_settings_path() -> Option<PathBuf> {
    runtime_dir().map(|dir| dir.join("agent_settings.json"))
}

/// Interpret an inline-mode toggle value. Anything but `0`, `false` or `no`
/// (case-insensitive) enables inline persistence.
pub fn parse_inline_flag(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    !FALSE_VALUES.contains(&normalized.as_str())
}

/// Process-wide inline default, read from `SWITCHYARD_INLINE_CONVERSATIONS`.
/// Unset means inline.
pub fn inline_conversations_default() -> bool {
    std::env::var(INLINE_ENV_VAR)
        .map(|raw| parse_inline_flag(&raw))
        .unwrap_or(true)
}

/// Resolve the inline flag for one outermost call. An explicit value wins.
pub fn resolve_inline(explicit: Option<bool>) -> bool {
    explicit.unwrap_or_else(inline_conversations_default)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchyardConfig {
    /// Directory holding `<profile_id>.json` documents.
    pub profiles_dir: Option<PathBuf>,
    /// Persist full configuration bodies instead of profile references.
    pub inline_conversations: bool,
    pub agent_settings_path: Option<PathBuf>,
    /// When set, logs are appended here instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for SwitchyardConfig {
    fn default() -> Self {
        Self {
            profiles_dir: None,
            inline_conversations: true,
            agent_settings_path: None,
            log_file: None,
        }
    }
}

impl SwitchyardConfig {
    pub fn user_settings_path() -> Option<PathBuf> {
        runtime_dir().map(|dir| dir.join("settings.json"))
    }

    /// Defaults, then `~/.switchyard/settings.json`, then the file named by
    /// `SWITCHYARD_SETTINGS`, then environment overrides.
    pub fn load() -> Result<Self, ProfileError> {
        let mut layers = Vec::new();
        if let Some(user) = Self::user_settings_path() {
            layers.push(user);
        }
        if let Ok(explicit) = std::env::var(SETTINGS_ENV_VAR) {
            layers.push(PathBuf::from(explicit));
        }
        let mut cfg = Self::load_layers(&layers)?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Merge the JSON files in `layers` over the defaults. Missing files are skipped.
    pub fn load_layers(layers: &[PathBuf]) -> Result<Self, ProfileError> {
        let mut merged = serde_json::to_value(Self::default())?;
        for path in layers {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(path).map_err(|err| ProfileError::io(path, err))?;
            let value: Value = serde_json::from_str(&raw)?;
            merge_json_value(&mut merged, &value);
        }
        Ok(serde_json::from_value(merged)?)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(PROFILES_DIR_ENV_VAR).filter(|dir| !dir.trim().is_empty()) {
            self.profiles_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(INLINE_ENV_VAR) {
            self.inline_conversations = parse_inline_flag(&raw);
        }
    }

    pub fn profiles_dir(&self) -> Option<PathBuf> {
        self.profiles_dir.clone().or_else(default_profiles_dir)
    }

    pub fn agent_settings_path(&self) -> Option<PathBuf> {
        self.agent_settings_path
            .clone()
            .or_else(default_agent_settings_path)
    }
}

fn merge_json_value(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_obj), Value::Object(overlay_obj)) => {
            for (key, overlay_value) in overlay_obj {
                if let Some(base_value) = base_obj.get_mut(key) {
                    merge_json_value(base_value, overlay_value);
                } else {
                    base_obj.insert(key.clone(), overlay_value.clone());
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}
