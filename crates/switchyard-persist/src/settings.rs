use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use switchyard_core::config::default_agent_settings_path;
use switchyard_core::{ProfileError, ProfileSource, Result, resolve_inline};
use switchyard_store::write_atomic;
use tracing::{debug, info};

use crate::{SlotMap, compact, expand, restore_slots, slot_map};

fn settings_path(path: Option<&Path>) -> Result<PathBuf> {
    path.map(Path::to_path_buf)
        .or_else(default_agent_settings_path)
        .ok_or_else(|| {
            ProfileError::validation("agent_settings_path: no home directory found; pass a path")
        })
}

/// Where the slot map for the settings file at `path` lives:
/// `agent_settings.json` keeps it in `agent_settings.slots.json`.
pub fn slots_path(path: &Path) -> PathBuf {
    path.with_extension("slots.json")
}

/// Compact `settings` for the resolved mode and write them atomically.
/// Defaults to `~/.switchyard/agent_settings.json`.
///
/// In reference mode the slot of every collapsed configuration is written to
/// the sidecar at [`slots_path`]; a stale sidecar is removed otherwise.
pub fn save_agent_settings(
    settings: &Value,
    path: Option<&Path>,
    inline: Option<bool>,
) -> Result<PathBuf> {
    let path = settings_path(path)?;
    let inline = resolve_inline(inline);
    let payload = compact(settings, Some(inline));
    let bytes = serde_json::to_vec_pretty(&payload)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|err| ProfileError::io(&dir, err))?;
    write_atomic(&dir, &path, &bytes)?;

    let slots = if inline { SlotMap::new() } else { slot_map(settings) };
    let sidecar = slots_path(&path);
    if slots.is_empty() {
        match fs::remove_file(&sidecar) {
            Ok(()) => debug!(path = %sidecar.display(), "removed stale slot map"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(ProfileError::io(&sidecar, err)),
        }
    } else {
        write_atomic(&dir, &sidecar, &serde_json::to_vec_pretty(&slots)?)?;
    }
    info!(path = %path.display(), slots = slots.len(), "saved agent settings");
    Ok(path)
}

/// Read settings and expand any profile references through `source`, then
/// rebind expanded configurations to the slots recorded at save time.
pub fn load_agent_settings(
    path: Option<&Path>,
    inline: Option<bool>,
    source: &impl ProfileSource,
) -> Result<Value> {
    let path = settings_path(path)?;
    let raw = fs::read_to_string(&path).map_err(|err| ProfileError::io(&path, err))?;
    let payload: Value = serde_json::from_str(&raw)?;
    let mut settings = expand(&payload, inline, source)?;

    let sidecar = slots_path(&path);
    match fs::read_to_string(&sidecar) {
        Ok(raw) => {
            let slots: SlotMap = serde_json::from_str(&raw)?;
            let restored = restore_slots(&mut settings, &slots);
            debug!(path = %sidecar.display(), restored, "applied slot map");
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(ProfileError::io(&sidecar, err)),
    }
    Ok(settings)
}
