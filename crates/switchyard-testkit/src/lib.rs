//! Shared fixtures for switchyard tests: a throwaway profile directory and
//! a few canned configurations.

use anyhow::Result;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use switchyard_core::LlmProfile;
use switchyard_store::ProfileStore;
use tempfile::TempDir;

pub struct ProfileFixture {
    dir: TempDir,
    store: ProfileStore,
}

impl ProfileFixture {
    /// The profile root is `<tmp>/llm-profiles` and does not exist yet.
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let store = ProfileStore::new(dir.path().join("llm-profiles"));
        Ok(Self { dir, store })
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Scratch space next to the profile root, e.g. for settings files.
    pub fn workspace(&self) -> &Path {
        self.dir.path()
    }

    pub fn profile_path(&self, profile_id: &str) -> PathBuf {
        self.store.root().join(format!("{profile_id}.json"))
    }

    /// Write a document verbatim, bypassing the store.
    pub fn write_raw(&self, profile_id: &str, document: &Value) -> Result<PathBuf> {
        fs::create_dir_all(self.store.root())?;
        let path = self.profile_path(profile_id);
        fs::write(&path, serde_json::to_vec_pretty(document)?)?;
        Ok(path)
    }

    pub fn read_raw(&self, profile_id: &str) -> Result<Value> {
        let raw = fs::read_to_string(self.profile_path(profile_id))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

pub fn sample_profile(model: &str, usage_id: &str) -> LlmProfile {
    LlmProfile {
        base_url: Some("https://llm-proxy.example.dev".to_string()),
        temperature: Some(0.0),
        max_output_tokens: Some(4096),
        ..LlmProfile::new(model, usage_id)
    }
}

pub fn secret_profile(model: &str, usage_id: &str) -> LlmProfile {
    LlmProfile {
        api_key: Some("secret".into()),
        aws_access_key_id: Some("id".into()),
        aws_secret_access_key: Some("value".into()),
        ..sample_profile(model, usage_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_starts_without_profile_root() {
        let fixture = ProfileFixture::new().expect("fixture");
        assert!(!fixture.store().root().exists());
        assert!(fixture.store().list().expect("list").is_empty());
    }

    #[test]
    fn raw_documents_round_trip() {
        let fixture = ProfileFixture::new().expect("fixture");
        let doc = serde_json::json!({"model": "m2"});
        fixture.write_raw("beta", &doc).expect("write");
        assert_eq!(fixture.read_raw("beta").expect("read"), doc);
        assert_eq!(fixture.store().list().expect("list"), vec!["beta"]);
    }
}
