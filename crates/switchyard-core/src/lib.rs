use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

pub mod config;
pub mod error;
pub mod profile;

pub use config::{
    INLINE_ENV_VAR, SwitchyardConfig, inline_conversations_default, parse_inline_flag,
    resolve_inline, runtime_dir,
};
pub use error::{Missing, ModeConflict, ProfileError};
pub use profile::{
    DEFAULT_USAGE_ID, LlmProfile, ProfileId, SECRET_FIELDS, SecretString, Validation,
    validate_document,
};

pub type Result<T> = std::result::Result<T, ProfileError>;

/// Anything that can resolve a profile id into a configuration.
///
/// Implementations must return a fresh value whose `profile_id` equals the
/// requested id.
pub trait ProfileSource {
    fn load_profile(&self, profile_id: &str) -> Result<LlmProfile>;
}

impl<T: ProfileSource + ?Sized> ProfileSource for &T {
    fn load_profile(&self, profile_id: &str) -> Result<LlmProfile> {
        (**self).load_profile(profile_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEventKind {
    Bound,
    Switched { previous_profile_id: Option<String> },
}

/// Change notification delivered to a registry subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEvent {
    pub registry_id: Uuid,
    pub at: DateTime<Utc>,
    pub kind: RegistryEventKind,
    pub llm: LlmProfile,
}

impl RegistryEvent {
    pub fn usage_id(&self) -> &str {
        &self.llm.usage_id
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SwitchPayload {
    #[serde(default)]
    profile_id: Option<String>,
    #[serde(default)]
    llm: Option<LlmProfile>,
}

/// A runtime switch: activate a stored profile, or install an inline
/// configuration for clients whose profile schema differs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "SwitchPayload")]
pub enum SwitchRequest {
    Profile(String),
    Inline(Box<LlmProfile>),
}

impl SwitchRequest {
    pub fn from_parts(profile_id: Option<String>, llm: Option<LlmProfile>) -> Result<Self> {
        match (profile_id.filter(|id| !id.is_empty()), llm) {
            (Some(profile_id), None) => Ok(Self::Profile(profile_id)),
            (None, Some(llm)) => Ok(Self::Inline(Box::new(llm))),
            _ => Err(ProfileError::validation(
                "switch request: exactly one of profile_id or llm must be provided",
            )),
        }
    }
}

impl TryFrom<SwitchPayload> for SwitchRequest {
    type Error = ProfileError;

    fn try_from(payload: SwitchPayload) -> Result<Self> {
        Self::from_parts(payload.profile_id, payload.llm)
    }
}
