use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::fs;
use std::process::ExitCode;
use switchyard_core::{LlmProfile, Validation};
use switchyard_errors::errors::file_not_found;

use crate::context::CliContext;
use crate::output::*;
use crate::util::parse_keyvals;
use crate::{ProfileCmd, ProfileWriteArgs, ValidateArgs};

/// Usage slot given to profiles created without one.
const CREATED_USAGE_ID: &str = "agent";

pub(crate) fn run_profile(ctx: &CliContext, cmd: ProfileCmd, json_mode: bool) -> Result<ExitCode> {
    match cmd {
        ProfileCmd::List => {
            let ids = ctx.store.list()?;
            if json_mode {
                print_json(&json!({"root": ctx.store.root(), "profiles": ids}))?;
            } else if ids.is_empty() {
                println!("No profiles found. Use `switchyard profile create` to add one.");
            } else {
                println!("Available profiles:");
                for id in ids {
                    println!("- {id}");
                }
            }
        }
        ProfileCmd::Show(args) => {
            let profile = ctx.store.load(&args.profile_id)?;
            let shown = redact_profile_for_display(&profile)?;
            if json_mode {
                print_json(&shown)?;
            } else {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            }
        }
        ProfileCmd::Create(args) => run_create(ctx, args, json_mode)?,
        ProfileCmd::Edit(args) => run_edit(ctx, args, json_mode)?,
        ProfileCmd::Delete(args) => {
            let path = ctx.store.delete(&args.profile_id)?;
            if json_mode {
                print_json(&json!({"deleted": args.profile_id, "path": path}))?;
            } else {
                println!("Deleted profile '{}'.", args.profile_id);
            }
        }
        ProfileCmd::Validate(args) => return run_validate(ctx, args, json_mode),
    }
    Ok(ExitCode::SUCCESS)
}

fn run_create(ctx: &CliContext, args: ProfileWriteArgs, json_mode: bool) -> Result<()> {
    let mut fields = parse_keyvals(&args.fields, |name| std::env::var(name).ok())?;
    if !fields.contains_key("model") {
        return Err(anyhow!("model=<name> is required"));
    }
    fields
        .entry("usage_id")
        .or_insert_with(|| Value::String(CREATED_USAGE_ID.to_string()));
    let profile = LlmProfile::from_document(Value::Object(fields))?;
    let path = ctx
        .store
        .save(&args.profile_id, &profile, args.include_secrets)?;
    report_saved(&args.profile_id, &profile, &path, json_mode, "Saved")
}

fn run_edit(ctx: &CliContext, args: ProfileWriteArgs, json_mode: bool) -> Result<()> {
    if args.fields.is_empty() {
        return Err(anyhow!("provide at least one key=value to edit"));
    }
    let base = ctx.store.load(&args.profile_id)?;
    let updates = parse_keyvals(&args.fields, |name| std::env::var(name).ok())?;

    let mut document = base.to_document(true)?;
    document.extend(updates);
    let updated = LlmProfile::from_document(Value::Object(document))?;
    let path = ctx
        .store
        .save(&args.profile_id, &updated, args.include_secrets)?;
    report_saved(&args.profile_id, &updated, &path, json_mode, "Updated")
}

fn report_saved(
    profile_id: &str,
    profile: &LlmProfile,
    path: &std::path::Path,
    json_mode: bool,
    verb: &str,
) -> Result<()> {
    if json_mode {
        print_json(&json!({
            "profile_id": profile_id,
            "model": profile.model,
            "usage_id": profile.usage_id,
            "path": path,
        }))?;
    } else {
        println!("{verb} profile '{profile_id}' for model '{}'.", profile.model);
    }
    Ok(())
}

fn run_validate(ctx: &CliContext, args: ValidateArgs, json_mode: bool) -> Result<ExitCode> {
    if !args.file.is_file() {
        return Err(file_not_found(&args.file.display().to_string()).into_error());
    }
    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let report = match serde_json::from_str::<Value>(&raw) {
        Ok(document) => ctx.store.validate(&document),
        Err(err) => Validation::Invalid(vec![format!("document: invalid JSON ({err})")]),
    };

    if json_mode {
        print_json(&json!({
            "file": args.file,
            "valid": report.is_valid(),
            "errors": report.errors(),
        }))?;
    } else if report.is_valid() {
        println!("{} is a valid profile document.", args.file.display());
    } else {
        println!("{} is not a valid profile document:", args.file.display());
        for error in report.errors() {
            println!("  - {error}");
        }
    }

    Ok(if report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
