use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::error::ProfileError;

/// Credential-bearing fields. Never written to disk unless explicitly requested.
pub const SECRET_FIELDS: &[&str] = &["api_key", "aws_access_key_id", "aws_secret_access_key"];

pub const DEFAULT_USAGE_ID: &str = "default";

static PROFILE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid profile id regex"));

/// A filesystem-safe profile identifier (the stem of `<profile_id>.json`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn parse(raw: &str) -> Result<Self, ProfileError> {
        let invalid = |reason| ProfileError::InvalidIdentifier {
            profile_id: raw.to_string(),
            reason,
        };
        if raw.is_empty() || raw == "." || raw == ".." {
            return Err(invalid("profile id must not be empty, '.' or '..'"));
        }
        if raw.contains('/') || raw.contains('\\') {
            return Err(invalid("profile ids cannot contain path separators"));
        }
        if !PROFILE_ID_PATTERN.is_match(raw) {
            return Err(invalid(
                "profile ids may only contain alphanumerics, '.', '_', or '-'",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A credential string. Serializes to its raw value; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(\"**********\")")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

fn default_usage_id() -> String {
    DEFAULT_USAGE_ID.to_string()
}

/// Model-backend settings for one usage slot.
///
/// Values are treated as immutable snapshots: a switch produces a new value
/// instead of editing the bound one. Absent optional fields are omitted from
/// the serialized document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmProfile {
    pub model: String,
    /// Logical role this configuration fills. `service_id` is the legacy key.
    #[serde(default = "default_usage_id", alias = "service_id")]
    pub usage_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    #[serde(default, alias = "endpoint", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_retries: Option<u32>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_access_key_id: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_secret_access_key: Option<SecretString>,
}

impl LlmProfile {
    pub fn new(model: impl Into<String>, usage_id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            usage_id: usage_id.into(),
            profile_id: None,
            base_url: None,
            api_version: None,
            temperature: None,
            top_p: None,
            top_k: None,
            max_input_tokens: None,
            max_output_tokens: None,
            seed: None,
            reasoning_effort: None,
            num_retries: None,
            timeout: None,
            metadata: BTreeMap::new(),
            api_key: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
        }
    }

    pub fn with_profile_id(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    /// Parse a profile document strictly, reporting every offending field.
    pub fn from_document(document: Value) -> Result<Self, ProfileError> {
        validate_document(&document).into_result()?;
        serde_json::from_value(document).map_err(|err| ProfileError::validation(err.to_string()))
    }

    /// Serialize to a document, dropping secret fields unless `include_secrets`.
    pub fn to_document(&self, include_secrets: bool) -> Result<Map<String, Value>, ProfileError> {
        let Value::Object(mut document) = serde_json::to_value(self)? else {
            return Err(ProfileError::validation(
                "document: profile did not serialize to an object",
            ));
        };
        if !include_secrets {
            for field in SECRET_FIELDS {
                document.remove(*field);
            }
        }
        Ok(document)
    }
}

/// Outcome of a non-raising document pre-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(Vec<String>),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn errors(&self) -> &[String] {
        match self {
            Self::Valid => &[],
            Self::Invalid(errors) => errors,
        }
    }

    pub fn into_result(self) -> Result<(), ProfileError> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid(errors) => Err(ProfileError::Validation { errors }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Number,
    Unsigned,
    Object,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Number => value.is_number(),
            Self::Unsigned => value.is_u64(),
            Self::Object => value.is_object(),
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Self::Text => "expected a string",
            Self::Number => "expected a number",
            Self::Unsigned => "expected a non-negative integer",
            Self::Object => "expected an object",
        }
    }
}

const DOCUMENT_FIELDS: &[(&str, FieldKind)] = &[
    ("model", FieldKind::Text),
    ("usage_id", FieldKind::Text),
    ("service_id", FieldKind::Text),
    ("profile_id", FieldKind::Text),
    ("base_url", FieldKind::Text),
    ("endpoint", FieldKind::Text),
    ("api_version", FieldKind::Text),
    ("temperature", FieldKind::Number),
    ("top_p", FieldKind::Number),
    ("top_k", FieldKind::Unsigned),
    ("max_input_tokens", FieldKind::Unsigned),
    ("max_output_tokens", FieldKind::Unsigned),
    ("seed", FieldKind::Unsigned),
    ("reasoning_effort", FieldKind::Text),
    ("num_retries", FieldKind::Unsigned),
    ("timeout", FieldKind::Unsigned),
    ("metadata", FieldKind::Object),
    ("api_key", FieldKind::Text),
    ("aws_access_key_id", FieldKind::Text),
    ("aws_secret_access_key", FieldKind::Text),
];

const ALIASES: &[(&str, &str)] = &[("service_id", "usage_id"), ("endpoint", "base_url")];

/// Check a profile document without raising. Messages read `<field>: <problem>`.
pub fn validate_document(document: &Value) -> Validation {
    let Some(fields) = document.as_object() else {
        return Validation::Invalid(vec!["document: expected a JSON object".to_string()]);
    };

    let mut errors = Vec::new();
    for (key, value) in fields {
        let Some((_, kind)) = DOCUMENT_FIELDS.iter().find(|(name, _)| name == key) else {
            errors.push(format!("{key}: unknown field"));
            continue;
        };
        if value.is_null() {
            continue;
        }
        if !kind.accepts(value) {
            errors.push(format!("{key}: {}", kind.expected()));
        }
    }

    match fields.get("model") {
        None | Some(Value::Null) => errors.push("model: field required".to_string()),
        Some(Value::String(model)) if model.trim().is_empty() => {
            errors.push("model: must not be empty".to_string())
        }
        _ => {}
    }

    for (alias, canonical) in ALIASES {
        if fields.contains_key(*alias) && fields.contains_key(*canonical) {
            errors.push(format!("{alias}: conflicts with {canonical}"));
        }
    }

    check_range(fields, "temperature", 0.0, 2.0, &mut errors);
    check_range(fields, "top_p", 0.0, 1.0, &mut errors);

    if errors.is_empty() {
        Validation::Valid
    } else {
        Validation::Invalid(errors)
    }
}

fn check_range(fields: &Map<String, Value>, key: &str, min: f64, max: f64, errors: &mut Vec<String>) {
    if let Some(value) = fields.get(key).and_then(Value::as_f64)
        && !(min..=max).contains(&value)
    {
        errors.push(format!("{key}: must be between {min} and {max}"));
    }
}
