use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::{Mutex, Once};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Filter directives are read from this variable, e.g. `SWITCHYARD_LOG=switchyard_store=debug`.
pub const LOG_ENV_VAR: &str = "SWITCHYARD_LOG";

static TRACING_INIT: Once = Once::new();

pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "info" } else { "warn" }
}

/// Install the global tracing subscriber once per process.
///
/// Events go to stderr unless `log_file` is given, in which case they are
/// appended there without ANSI colours. Later calls are no-ops, and so is
/// the first one when another global subscriber is already installed.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let file = log_file.map(open_log_file).transpose()?;
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    TRACING_INIT.call_once(move || {
        let builder = tracing_subscriber::fmt()
            .with_target(verbose)
            .with_env_filter(filter);
        let installed = match file {
            Some(file) => builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init(),
            None => builder.with_writer(std::io::stderr).try_init(),
        };
        // An embedding process may already own the global subscriber; keep it.
        if let Err(err) = installed {
            debug!(error = %err, "global tracing subscriber already installed");
        }
    });
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn verbose_raises_default_level() {
        assert_eq!(default_directive(false), "warn");
        assert_eq!(default_directive(true), "info");
    }

    #[test]
    fn log_file_is_created_with_parents_and_appended() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("logs/switchyard.log");

        let mut first = open_log_file(&path).expect("open");
        writeln!(first, "one").expect("write one");
        let mut second = open_log_file(&path).expect("reopen");
        writeln!(second, "two").expect("write two");

        assert_eq!(fs::read_to_string(&path).expect("read"), "one\ntwo\n");
    }

    #[test]
    fn init_writes_events_to_the_log_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("switchyard.log");

        init_logging(true, Some(&path)).expect("init");
        init_logging(false, None).expect("second init is a no-op");
        tracing::warn!(profile_id = "alpha", "observe smoke event");

        let written = fs::read_to_string(&path).expect("read log");
        assert!(written.contains("observe smoke event"), "{written}");
    }
}
