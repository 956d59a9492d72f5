use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use switchyard_errors::ErrorHandler;

mod commands;
mod context;
mod output;
mod util;

use commands::profile::run_profile;
use commands::settings::run_settings;
use context::CliContext;
use output::print_json;

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Manage LLM configuration profiles and persisted agent settings", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    /// Log at info level (SWITCHYARD_LOG overrides).
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Directory holding `<profile_id>.json` documents.
    #[arg(long = "profiles-dir", global = true)]
    profiles_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage stored profiles.
    Profile {
        #[command(subcommand)]
        command: ProfileCmd,
    },
    /// Read, write and switch the persisted agent settings file.
    Settings {
        #[command(subcommand)]
        command: SettingsCmd,
    },
}

#[derive(Subcommand)]
enum ProfileCmd {
    List,
    /// Print a profile with secrets redacted.
    Show(ProfileIdArg),
    /// Save a new profile from key=value fields. `model` is required.
    Create(ProfileWriteArgs),
    /// Update fields of an existing profile.
    Edit(ProfileWriteArgs),
    Delete(ProfileIdArg),
    /// Check a profile document without saving it.
    Validate(ValidateArgs),
}

#[derive(Args)]
struct ProfileIdArg {
    profile_id: String,
}

#[derive(Args)]
struct ProfileWriteArgs {
    profile_id: String,
    /// Fields as key=value; `ENV[NAME]` reads the value from the environment.
    fields: Vec<String>,
    /// Also write api_key and the AWS credentials to disk.
    #[arg(long = "include-secrets")]
    include_secrets: bool,
}

#[derive(Args)]
struct ValidateArgs {
    file: PathBuf,
}

#[derive(Subcommand)]
enum SettingsCmd {
    /// Print the settings with references expanded and secrets redacted.
    Show(SettingsShowArgs),
    /// Persist a settings document in the resolved mode.
    Save(SettingsSaveArgs),
    /// Point a usage slot at a stored profile and rewrite the settings file.
    Switch(SettingsSwitchArgs),
}

#[derive(Args, Clone, Copy, Default)]
struct ModeArgs {
    /// Embed full configurations.
    #[arg(long, conflicts_with = "reference")]
    inline: bool,
    /// Persist `{"profile_id": ...}` references.
    #[arg(long)]
    reference: bool,
}

impl ModeArgs {
    fn explicit(self) -> Option<bool> {
        match (self.inline, self.reference) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args)]
struct SettingsShowArgs {
    #[arg(long)]
    path: Option<PathBuf>,
    #[command(flatten)]
    mode: ModeArgs,
}

#[derive(Args)]
struct SettingsSaveArgs {
    /// JSON document to persist.
    file: PathBuf,
    #[arg(long)]
    path: Option<PathBuf>,
    #[command(flatten)]
    mode: ModeArgs,
}

#[derive(Args)]
struct SettingsSwitchArgs {
    usage_id: String,
    profile_id: String,
    #[arg(long)]
    path: Option<PathBuf>,
    #[command(flatten)]
    mode: ModeArgs,
}

fn run(cli: Cli) -> Result<ExitCode> {
    let ctx = CliContext::load(cli.profiles_dir.as_deref(), cli.verbose)?;
    match cli.command {
        Commands::Profile { command } => run_profile(&ctx, command, cli.json),
        Commands::Settings { command } => {
            run_settings(&ctx, command, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = cli.json;
    let verbose = cli.verbose;
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            let handler = ErrorHandler::new().verbose(verbose);
            if json_mode {
                let enhanced = handler.enhance(&err);
                if let Err(print_err) = print_json(&json!({"error": enhanced})) {
                    eprintln!("{print_err}");
                }
            } else {
                eprint!("{}", handler.handle(&err));
            }
            ExitCode::FAILURE
        }
    }
}
