//! Runtime state directory resolution.
//!
//! `GASOLINE_STATE_DIR` wins; otherwise the platform state directory, then `~/.gasoline`. When
//! the chosen directory cannot be created or written the daemon falls back to
//! `<tmp>/gasoline` and queues a one-shot warning for the next tool response.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gasoline_core_types::Warnings;
use tracing::{info, warn};

pub const STATE_DIR_ENV: &str = "GASOLINE_STATE_DIR";
const APP_NAME: &str = "gasoline";

#[cfg(unix)]
const DIR_MODE: u32 = 0o750;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateDir {
    root: PathBuf,
    fallback: bool,
}

impl StateDir {
    /// Uses `root` as-is, creating it when missing.
    pub fn at(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        ensure_private_dir(&root)?;
        Ok(Self {
            root,
            fallback: false,
        })
    }

    pub fn resolve(warnings: &Warnings) -> Self {
        let primary = primary_root();
        match ensure_writable(&primary) {
            Ok(()) => {
                info!(path = %primary.display(), "state directory ready");
                Self {
                    root: primary,
                    fallback: false,
                }
            }
            Err(err) => {
                let fallback = env::temp_dir().join(APP_NAME);
                warn!(primary = %primary.display(), fallback = %fallback.display(), ?err, "state directory unwritable");
                warnings.push(format!(
                    "state_dir_unwritable: {} ({err}); falling back to {}",
                    primary.display(),
                    fallback.display()
                ));
                if let Err(err) = ensure_private_dir(&fallback) {
                    warn!(path = %fallback.display(), ?err, "fallback state directory unavailable");
                }
                Self {
                    root: fallback,
                    fallback: true,
                }
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn default_log_file(&self) -> PathBuf {
        self.logs_dir().join("gasoline.jsonl")
    }

    pub fn recordings_dir(&self) -> PathBuf {
        self.root.join("recordings")
    }
}

fn primary_root() -> PathBuf {
    if let Some(dir) = env::var_os(STATE_DIR_ENV).filter(|v| !v.to_string_lossy().trim().is_empty()) {
        let dir = PathBuf::from(dir);
        return if dir.is_absolute() {
            dir
        } else {
            env::current_dir().map(|cwd| cwd.join(&dir)).unwrap_or(dir)
        };
    }
    if let Some(dir) = dirs::state_dir() {
        return dir.join(APP_NAME);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".gasoline"),
        None => env::temp_dir().join(APP_NAME),
    }
}

fn ensure_writable(dir: &Path) -> io::Result<()> {
    ensure_private_dir(dir)?;
    let probe = dir.join(".write-probe");
    let mut file = fs::File::create(&probe)?;
    file.write_all(b"ok")?;
    drop(file);
    fs::remove_file(&probe)
}

/// Creates `dir` and its parents, restricting the leaf to the owner and group.
pub fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(DIR_MODE))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_override_is_used() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("state");
        env::set_var(STATE_DIR_ENV, &dir);
        let warnings = Warnings::new();
        let state = StateDir::resolve(&warnings);
        env::remove_var(STATE_DIR_ENV);
        assert_eq!(state.root(), dir.as_path());
        assert!(!state.is_fallback());
        assert!(warnings.is_empty());
        assert_eq!(state.default_log_file(), dir.join("logs").join("gasoline.jsonl"));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn unwritable_primary_falls_back_with_warning() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, b"file").expect("write");
        env::set_var(STATE_DIR_ENV, blocker.join("state"));
        let warnings = Warnings::new();
        let state = StateDir::resolve(&warnings);
        env::remove_var(STATE_DIR_ENV);
        assert!(state.is_fallback());
        assert_eq!(state.root(), env::temp_dir().join(APP_NAME).as_path());
        let drained = warnings.drain();
        assert_eq!(drained.len(), 1);
        assert!(drained[0].starts_with("state_dir_unwritable"));
    }
}
