use anyhow::Result;
use serde::Serialize;
use serde_json::{Value, json};
use switchyard_core::{LlmProfile, SECRET_FIELDS};
use switchyard_persist::{PayloadKind, classify};

const REDACTED: &str = "****";

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub(crate) fn redact_profile_for_display(profile: &LlmProfile) -> Result<Value> {
    let mut value = Value::Object(profile.to_document(true)?);
    redact_payload(&mut value);
    Ok(value)
}

/// Mask secret fields of every embedded configuration in `payload`.
pub(crate) fn redact_payload(payload: &mut Value) {
    match payload {
        Value::Object(mapping) => {
            if classify(mapping) == PayloadKind::Configuration {
                for field in SECRET_FIELDS {
                    if let Some(secret) = mapping.get_mut(*field)
                        && !secret.is_null()
                    {
                        *secret = json!(REDACTED);
                    }
                }
            }
            mapping.values_mut().for_each(redact_payload);
        }
        Value::Array(items) => items.iter_mut().for_each(redact_payload),
        _ => {}
    }
}
