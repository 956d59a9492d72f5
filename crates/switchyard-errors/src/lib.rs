//! User-facing error rendering for the switchyard CLI.
//!
//! Library crates return [`ProfileError`]; this crate turns whatever reaches
//! the binary into a titled message with recovery suggestions.

use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use switchyard_core::{Missing, ModeConflict, ProfileError};

/// Enhanced error with user-friendly message and recovery suggestions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedError {
    pub title: String,
    pub message: String,
    pub suggestions: Vec<String>,
    pub error_type: ErrorType,
    pub context: Option<String>,
}

/// Types of errors for better categorization
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Settings and persistence-mode problems
    Configuration,
    /// File access denied
    Permission,
    /// Registry state conflicts
    Runtime,
    /// Invalid identifiers or documents
    Validation,
    /// Something that should exist does not
    NotFound,
    /// Disk and other I/O failures
    Resource,
    Unknown,
}

impl EnhancedError {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        error_type: ErrorType,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            suggestions: Vec::new(),
            error_type,
            context: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions
            .extend(suggestions.into_iter().map(Into::into));
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn into_error(self) -> Error {
        Error::new(self)
    }

    /// Format error for display
    pub fn format(&self, verbose: bool) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}: {}\n", self.error_type.label(), self.title));
        output.push_str(&format!("  {}\n", self.message));

        if verbose && let Some(context) = &self.context {
            output.push_str(&format!("\n  Context: {context}\n"));
        }

        if !self.suggestions.is_empty() {
            output.push_str("\n  Suggestions:\n");
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("    {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl ErrorType {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorType::Configuration => "config",
            ErrorType::Permission => "permission",
            ErrorType::Runtime => "runtime",
            ErrorType::Validation => "invalid",
            ErrorType::NotFound => "not found",
            ErrorType::Resource => "io",
            ErrorType::Unknown => "error",
        }
    }
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

impl std::error::Error for EnhancedError {}

/// Turns errors into user-facing messages.
#[derive(Debug, Clone, Default)]
pub struct ErrorHandler {
    verbose: bool,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include the full error chain as context.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn handle(&self, error: &Error) -> String {
        self.enhance(error).format(self.verbose)
    }

    /// Build the enhanced form: an [`EnhancedError`] anywhere in the chain is
    /// used as is, a [`ProfileError`] gets targeted advice, anything else is
    /// classified by its message.
    pub fn enhance(&self, error: &Error) -> EnhancedError {
        if let Some(enhanced) = error.downcast_ref::<EnhancedError>() {
            return enhanced.clone();
        }

        let enhanced = error
            .chain()
            .find_map(|cause| cause.downcast_ref::<ProfileError>())
            .map(profile_error)
            .unwrap_or_else(|| classify_message(&error.to_string()));

        if self.verbose && error.chain().nth(1).is_some() {
            enhanced.with_context(format!("{error:#}"))
        } else {
            enhanced
        }
    }
}

fn profile_error(err: &ProfileError) -> EnhancedError {
    let message = err.to_string();
    match err {
        ProfileError::InvalidIdentifier { .. } => {
            EnhancedError::new("Invalid Profile Id", message, ErrorType::Validation)
                .with_suggestions([
                    "Use only letters, digits, '.', '_' and '-'",
                    "Profile ids cannot be empty, '.' or '..'",
                ])
        }
        ProfileError::NotFound(Missing::Profile { .. }) => {
            EnhancedError::new("Profile Not Found", message, ErrorType::NotFound)
                .with_suggestions([
                    "Run `switchyard profile list` to see stored profiles",
                    "Check --profiles-dir or SWITCHYARD_PROFILES_DIR",
                ])
        }
        ProfileError::NotFound(Missing::Slot { .. }) => {
            EnhancedError::new("Usage Slot Not Bound", message, ErrorType::NotFound)
                .with_suggestion("Make sure the settings file embeds a configuration for this usage id")
        }
        ProfileError::Validation { .. } | ProfileError::Serialization(_) => {
            EnhancedError::new("Invalid Profile Document", message, ErrorType::Validation)
                .with_suggestions([
                    "Run `switchyard profile validate <file>` to list every problem",
                    "`model` is required; unknown fields are rejected",
                ])
        }
        ProfileError::DuplicateSlot { .. } => {
            EnhancedError::new("Usage Slot Already Bound", message, ErrorType::Runtime)
                .with_suggestion("Switch the existing slot instead of binding it again")
        }
        ProfileError::ModeConflict(conflict) => {
            let flag = match conflict {
                ModeConflict::ReferenceWhileInline { .. } => "Pass --reference to expand stored references",
                ModeConflict::SwitchWhileInline { .. } => "Switching needs reference mode; pass --reference",
            };
            EnhancedError::new("Persistence Mode Conflict", message, ErrorType::Configuration)
                .with_suggestions([flag, "Or set SWITCHYARD_INLINE_CONVERSATIONS=false"])
        }
        ProfileError::IndirectReference { .. } => {
            EnhancedError::new("Nested Profile Reference", message, ErrorType::Validation)
                .with_suggestion("Store the full configuration in the referenced profile")
        }
        ProfileError::Io { source, .. } if source.kind() == ErrorKind::PermissionDenied => {
            EnhancedError::new("Permission Denied", message, ErrorType::Permission)
                .with_suggestion("Profiles are written owner-only (0600); check file ownership")
        }
        ProfileError::Io { .. } => {
            EnhancedError::new("I/O Failure", message, ErrorType::Resource)
                .with_suggestion("Check that the directory exists and the disk is writable")
        }
    }
}

fn classify_message(error_message: &str) -> EnhancedError {
    let lower_error = error_message.to_lowercase();

    if lower_error.contains("key=value") || lower_error.contains("invalid value") {
        return EnhancedError::new("Invalid Argument", error_message, ErrorType::Validation)
            .with_suggestion("Pass fields as key=value, e.g. model=gpt-4o-mini temperature=0.2");
    }

    if lower_error.contains("permission") || lower_error.contains("denied") {
        return EnhancedError::new("Permission Error", error_message, ErrorType::Permission)
            .with_suggestion("Check file permissions");
    }

    if lower_error.contains("home directory") || lower_error.contains("settings") {
        return EnhancedError::new("Configuration Error", error_message, ErrorType::Configuration)
            .with_suggestions([
                "Check ~/.switchyard/settings.json",
                "Set HOME, or pass --profiles-dir / --path explicitly",
            ]);
    }

    EnhancedError::new("Error", error_message, ErrorType::Unknown)
}

/// Constructors for errors the CLI raises itself.
pub mod errors {
    use super::*;

    pub fn invalid_key_value(arg: &str) -> EnhancedError {
        EnhancedError::new(
            "Invalid Argument",
            format!("expected key=value, got '{arg}'"),
            ErrorType::Validation,
        )
        .with_suggestion("Pass fields as key=value, e.g. model=gpt-4o-mini temperature=0.2")
    }

    pub fn missing_env_var(name: &str) -> EnhancedError {
        EnhancedError::new(
            "Missing Environment Variable",
            format!("ENV[{name}] was requested but {name} is not set"),
            ErrorType::Configuration,
        )
        .with_suggestion(format!("Export {name} before running the command"))
    }

    pub fn file_not_found(path: &str) -> EnhancedError {
        EnhancedError::new(
            "File Not Found",
            format!("The file '{path}' does not exist."),
            ErrorType::NotFound,
        )
        .with_suggestion("Check the file path")
    }
}
