//! Durable storage for named LLM profiles.
//!
//! Each profile lives in `<root>/<profile_id>.json`. Writes go through a
//! temporary file in the same directory followed by a rename, so readers only
//! ever observe a complete document. Concurrent writers to the same id are
//! last-writer-wins.

use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use switchyard_core::{
    LlmProfile, Missing, ProfileError, ProfileId, ProfileSource, Result, SwitchyardConfig,
    Validation, validate_document,
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ProfileStore {
    root: PathBuf,
}

impl ProfileStore {
    /// The directory is not created until the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(cfg: &SwitchyardConfig) -> Result<Self> {
        let root = cfg.profiles_dir().ok_or_else(|| {
            ProfileError::validation(
                "profiles_dir: no home directory found; set SWITCHYARD_PROFILES_DIR",
            )
        })?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted ids of every stored profile. A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(ProfileError::io(&self.root, err)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| ProfileError::io(&self.root, err))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") || !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if ProfileId::parse(stem).is_ok() {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn resolve_path(&self, profile_id: &str) -> Result<PathBuf> {
        let id = ProfileId::parse(profile_id)?;
        Ok(self.root.join(id.file_name()))
    }

    pub fn exists(&self, profile_id: &str) -> Result<bool> {
        Ok(self.resolve_path(profile_id)?.is_file())
    }

    /// Persist `profile` under `profile_id`, replacing any previous document.
    ///
    /// Secret fields are dropped unless `include_secrets` is set. The stored
    /// document always carries `profile_id`.
    pub fn save(
        &self,
        profile_id: &str,
        profile: &LlmProfile,
        include_secrets: bool,
    ) -> Result<PathBuf> {
        let path = self.resolve_path(profile_id)?;
        let mut document = profile.to_document(include_secrets)?;
        document.insert(
            "profile_id".to_string(),
            Value::String(profile_id.to_string()),
        );
        let bytes = serde_json::to_vec_pretty(&Value::Object(document))?;

        fs::create_dir_all(&self.root).map_err(|err| ProfileError::io(&self.root, err))?;
        write_atomic(&self.root, &path, &bytes)?;
        info!(
            profile_id,
            path = %path.display(),
            include_secrets,
            "saved profile"
        );
        Ok(path)
    }

    /// Load a profile. The returned `profile_id` always equals `profile_id`,
    /// whatever the document itself says.
    pub fn load(&self, profile_id: &str) -> Result<LlmProfile> {
        let path = self.resolve_path(profile_id)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Missing::Profile {
                    profile_id: profile_id.to_string(),
                    path,
                }
                .into());
            }
            Err(err) => return Err(ProfileError::io(&path, err)),
        };
        let document: Value = serde_json::from_str(&raw)
            .map_err(|err| ProfileError::validation(format!("document: invalid JSON ({err})")))?;

        let mut profile = LlmProfile::from_document(document)?;
        if profile.profile_id.as_deref() != Some(profile_id) {
            profile.profile_id = Some(profile_id.to_string());
        }
        debug!(profile_id, model = %profile.model, "loaded profile");
        Ok(profile)
    }

    /// Pre-check a candidate document without touching the disk.
    pub fn validate(&self, document: &Value) -> Validation {
        validate_document(document)
    }

    pub fn delete(&self, profile_id: &str) -> Result<PathBuf> {
        let path = self.resolve_path(profile_id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(profile_id, path = %path.display(), "deleted profile");
                Ok(path)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(Missing::Profile {
                profile_id: profile_id.to_string(),
                path,
            }
            .into()),
            Err(err) => Err(ProfileError::io(&path, err)),
        }
    }
}

impl ProfileSource for ProfileStore {
    fn load_profile(&self, profile_id: &str) -> Result<LlmProfile> {
        self.load(profile_id)
    }
}

/// Write `bytes` to `path` via a sibling temp file and rename.
///
/// New files are created owner-only; an existing file keeps its permissions.
pub fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|err| ProfileError::io(dir, err))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|err| ProfileError::io(tmp.path(), err))?;

    match fs::metadata(path) {
        Ok(existing) => fs::set_permissions(tmp.path(), existing.permissions())
            .map_err(|err| ProfileError::io(tmp.path(), err))?,
        Err(_) => restrict_to_owner(tmp.path())?,
    }

    tmp.persist(path)
        .map_err(|err| ProfileError::io(path, err.error))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .map_err(|err| ProfileError::io(path, err))?
        .permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms).map_err(|err| ProfileError::io(path, err))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, ProfileStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = ProfileStore::new(dir.path().join("llm-profiles"));
        (dir, store)
    }

    #[test]
    fn list_is_empty_when_directory_is_missing() {
        let (_dir, store) = store();
        assert_eq!(store.list().expect("list"), Vec::<String>::new());
        assert!(!store.root().exists());
    }

    #[test]
    fn list_returns_sorted_stems_and_skips_foreign_files() {
        let (_dir, store) = store();
        fs::create_dir_all(store.root()).expect("root");
        fs::write(store.root().join("b.json"), "{}").expect("b");
        fs::write(store.root().join("a.json"), "{}").expect("a");
        fs::write(store.root().join("notes.txt"), "x").expect("txt");
        fs::write(store.root().join("bad name.json"), "{}").expect("bad");
        fs::create_dir_all(store.root().join("dir.json")).expect("dir");

        assert_eq!(store.list().expect("list"), vec!["a", "b"]);
    }

    #[test]
    fn resolve_path_rejects_unsafe_ids() {
        let (_dir, store) = store();
        for raw in ["../../etc/passwd", "", ".", "..", "a/b"] {
            assert!(matches!(
                store.resolve_path(raw),
                Err(ProfileError::InvalidIdentifier { .. })
            ));
        }
        let path = store.resolve_path("a.b-c_1").expect("safe id");
        assert_eq!(path, store.root().join("a.b-c_1.json"));
    }

    #[test]
    fn failed_identifier_never_creates_the_directory() {
        let (_dir, store) = store();
        let err = store
            .save("../escape", &LlmProfile::new("m", "agent"), false)
            .expect_err("unsafe id");
        assert!(matches!(err, ProfileError::InvalidIdentifier { .. }));
        assert!(!store.root().exists());
    }

    #[test]
    fn load_missing_profile_is_not_found() {
        let (_dir, store) = store();
        let err = store.load("ghost").expect_err("missing");
        assert!(err.is_not_found(), "{err}");
    }

    #[test]
    fn load_reports_invalid_json_as_validation() {
        let (_dir, store) = store();
        fs::create_dir_all(store.root()).expect("root");
        fs::write(store.root().join("gamma.json"), "{").expect("write");
        assert!(matches!(
            store.load("gamma"),
            Err(ProfileError::Validation { .. })
        ));
    }

    #[test]
    fn save_overwrites_whole_document() {
        let (_dir, store) = store();
        let first = LlmProfile {
            temperature: Some(0.4),
            ..LlmProfile::new("m1", "agent")
        };
        store.save("alpha", &first, false).expect("first save");
        store
            .save("alpha", &LlmProfile::new("m2", "agent"), false)
            .expect("second save");

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(store.root().join("alpha.json")).expect("read"))
                .expect("json");
        assert_eq!(
            raw,
            json!({"model": "m2", "usage_id": "agent", "profile_id": "alpha"})
        );
    }

    #[cfg(unix)]
    #[test]
    fn new_documents_are_owner_only_and_existing_modes_survive() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = store();
        let path = store
            .save("alpha", &LlmProfile::new("m1", "agent"), false)
            .expect("save");
        let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).expect("chmod");
        store
            .save("alpha", &LlmProfile::new("m2", "agent"), false)
            .expect("resave");
        let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn delete_removes_document_and_reports_missing() {
        let (_dir, store) = store();
        store
            .save("alpha", &LlmProfile::new("m1", "agent"), false)
            .expect("save");
        store.delete("alpha").expect("delete");
        assert!(!store.exists("alpha").expect("exists"));
        assert!(store.delete("alpha").expect_err("gone").is_not_found());
    }
}
