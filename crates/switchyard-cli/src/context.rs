use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use switchyard_core::SwitchyardConfig;
use switchyard_store::ProfileStore;
use tracing::debug;

/// Everything a command needs: layered config plus the profile store it
/// points at.
pub(crate) struct CliContext {
    pub(crate) config: SwitchyardConfig,
    pub(crate) store: ProfileStore,
}

impl CliContext {
    pub(crate) fn load(profiles_dir: Option<&Path>, verbose: bool) -> Result<Self> {
        let mut config = SwitchyardConfig::load().context("failed to load switchyard settings")?;
        if let Some(dir) = profiles_dir {
            config.profiles_dir = Some(dir.to_path_buf());
        }
        switchyard_observe::init_logging(verbose, config.log_file.as_deref())?;

        let store = ProfileStore::from_config(&config)?;
        debug!(
            root = %store.root().display(),
            inline = config.inline_conversations,
            "loaded cli context"
        );
        Ok(Self { config, store })
    }

    /// An explicit `--inline`/`--reference` wins over the configured default.
    pub(crate) fn inline(&self, explicit: Option<bool>) -> bool {
        explicit.unwrap_or(self.config.inline_conversations)
    }

    pub(crate) fn settings_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.config.agent_settings_path())
            .ok_or_else(|| anyhow!("no home directory found for agent settings; pass --path"))
    }
}
