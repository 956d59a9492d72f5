use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fs;
use std::sync::{Arc, Mutex};
use switchyard_core::ProfileError;
use switchyard_persist::{
    collect_configurations, ensure_switchable, load_agent_settings, replace_slot,
    save_agent_settings,
};
use switchyard_registry::Registry;
use tracing::{debug, info};

use crate::context::CliContext;
use crate::output::*;
use crate::{SettingsCmd, SettingsSaveArgs, SettingsShowArgs, SettingsSwitchArgs};

pub(crate) fn run_settings(ctx: &CliContext, cmd: SettingsCmd, json_mode: bool) -> Result<()> {
    match cmd {
        SettingsCmd::Show(args) => run_show(ctx, args, json_mode),
        SettingsCmd::Save(args) => run_save(ctx, args, json_mode),
        SettingsCmd::Switch(args) => run_switch(ctx, args, json_mode),
    }
}

fn run_show(ctx: &CliContext, args: SettingsShowArgs, json_mode: bool) -> Result<()> {
    let path = ctx.settings_path(args.path.as_deref())?;
    let inline = ctx.inline(args.mode.explicit());
    let mut settings = load_agent_settings(Some(&path), Some(inline), &ctx.store)?;
    redact_payload(&mut settings);
    if json_mode {
        print_json(&settings)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    }
    Ok(())
}

fn run_save(ctx: &CliContext, args: SettingsSaveArgs, json_mode: bool) -> Result<()> {
    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let settings: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", args.file.display()))?;

    let path = ctx.settings_path(args.path.as_deref())?;
    let inline = ctx.inline(args.mode.explicit());
    let written = save_agent_settings(&settings, Some(&path), Some(inline))?;
    if json_mode {
        print_json(&json!({"path": written, "inline": inline}))?;
    } else {
        let mode = if inline { "inline" } else { "reference" };
        println!("Saved agent settings to {} ({mode} mode).", written.display());
    }
    Ok(())
}

/// Load the settings, bind every embedded configuration, switch one slot and
/// write the result back as references.
fn run_switch(ctx: &CliContext, args: SettingsSwitchArgs, json_mode: bool) -> Result<()> {
    let inline = ctx.inline(args.mode.explicit());
    ensure_switchable(&args.usage_id, Some(inline))?;

    let path = ctx.settings_path(args.path.as_deref())?;
    let mut settings = load_agent_settings(Some(&path), Some(inline), &ctx.store)?;

    let mut registry = Registry::new(ctx.store.clone());
    for llm in collect_configurations(&settings)? {
        match registry.bind(llm) {
            Ok(()) => {}
            Err(ProfileError::DuplicateSlot { usage_id }) => {
                debug!(usage_id = %usage_id, "settings embed the slot more than once");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let changes = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&changes);
    registry.subscribe(move |event| {
        info!(usage_id = event.usage_id(), kind = ?event.kind, "registry changed");
        let mut count = counter
            .lock()
            .map_err(|_| anyhow::anyhow!("change counter poisoned"))?;
        *count += 1;
        Ok(())
    });

    let active = registry.switch(&args.usage_id, &args.profile_id)?;
    let replaced = replace_slot(&mut settings, &active)?;
    let written = save_agent_settings(&settings, Some(&path), Some(inline))?;
    let changed = changes.lock().map(|count| *count > 0).unwrap_or(true);

    if json_mode {
        print_json(&json!({
            "usage_id": active.usage_id,
            "profile_id": active.profile_id,
            "model": active.model,
            "changed": changed,
            "replaced": replaced,
            "path": written,
        }))?;
    } else if changed {
        println!(
            "Switched '{}' to profile '{}' (model={}).",
            args.usage_id, args.profile_id, active.model
        );
    } else {
        println!(
            "'{}' already uses profile '{}'.",
            args.usage_id, args.profile_id
        );
    }
    Ok(())
}
