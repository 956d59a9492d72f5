use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid profile id `{profile_id}`: {reason}")]
    InvalidIdentifier {
        profile_id: String,
        reason: &'static str,
    },
    #[error(transparent)]
    NotFound(#[from] Missing),
    #[error("invalid profile document: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },
    #[error(
        "usage id `{usage_id}` already exists in registry; use a different usage_id or switch the existing slot"
    )]
    DuplicateSlot { usage_id: String },
    #[error(transparent)]
    ModeConflict(#[from] ModeConflict),
    #[error(
        "profile `{via}` resolves to another profile reference `{profile_id}`; only one level of indirection is supported"
    )]
    IndirectReference { profile_id: String, via: String },
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("profile serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProfileError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![message.into()],
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// What a `NotFound` failure was looking for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Missing {
    #[error("profile not found: {profile_id} -> {}", path.display())]
    Profile { profile_id: String, path: PathBuf },
    #[error("usage id `{usage_id}` not found in registry; bind a configuration first")]
    Slot { usage_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeConflict {
    #[error(
        "encountered profile reference `{profile_id}` while inline persistence is enforced; inline the profile or set SWITCHYARD_INLINE_CONVERSATIONS=false"
    )]
    ReferenceWhileInline { profile_id: String },
    #[error(
        "cannot switch usage id `{usage_id}` while inline persistence is enforced; set SWITCHYARD_INLINE_CONVERSATIONS=false to persist profile references"
    )]
    SwitchWhileInline { usage_id: String },
}
