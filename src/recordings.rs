//! Tab recordings uploaded by the extension.
//!
//! Each recording is a `<name>.webm` plus a `<name>_meta.json` sidecar inside the recordings
//! directory. Files are written through a temporary file in the same directory and renamed into
//! place, owner-readable only.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use gasoline_core_types::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::state_dir::ensure_private_dir;

pub const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("video payload is empty")]
    EmptyVideo,
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("path '{0}' is outside the recordings directory")]
    PathNotAllowed(String),
    #[error("recording not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type RecordingResult<T> = Result<T, RecordingError>;

impl From<RecordingError> for ToolError {
    fn from(err: RecordingError) -> Self {
        match err {
            RecordingError::EmptyVideo => ToolError::missing_param("video"),
            RecordingError::InvalidMetadata(msg) => ToolError::invalid_param("metadata", msg),
            RecordingError::PathNotAllowed(path) => ToolError::path_not_allowed(&path),
            RecordingError::NotFound(path) => {
                ToolError::invalid_param("path", format!("recording not found: {path}"))
            }
            RecordingError::Io(err) => ToolError::internal(format!("recording I/O failed: {err}")),
        }
    }
}

/// Sidecar written next to each video. Unknown keys from the extension are kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingMetadata {
    pub name: String,
    pub display_name: String,
    pub created_at: String,
    pub duration_seconds: u64,
    pub size_bytes: u64,
    pub url: String,
    pub tab_id: u64,
    pub resolution: String,
    pub format: String,
    pub fps: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SavedRecording {
    pub name: String,
    pub path: PathBuf,
    pub metadata_path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Clone, Debug)]
pub struct RecordingStore {
    dir: PathBuf,
}

impl RecordingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Blocking; call from `spawn_blocking` inside async code.
    pub fn save(&self, video: &[u8], metadata: Option<&str>) -> RecordingResult<SavedRecording> {
        if video.is_empty() {
            return Err(RecordingError::EmptyVideo);
        }
        let mut meta = match metadata.map(str::trim).filter(|m| !m.is_empty()) {
            Some(raw) => serde_json::from_str::<RecordingMetadata>(raw)
                .map_err(|err| RecordingError::InvalidMetadata(err.to_string()))?,
            None => RecordingMetadata::default(),
        };
        ensure_private_dir(&self.dir)?;

        if meta.display_name.is_empty() {
            meta.display_name = meta.name.clone();
        }
        let slug = sanitize_name(&meta.name);
        let now = Utc::now();
        let mut stem = format!("{slug}--{}", now.format("%Y-%m-%d-%H%M%S"));
        if self.dir.join(format!("{stem}.webm")).exists() {
            stem = format!("{slug}--{}", now.format("%Y-%m-%d-%H%M%S%.9f"));
        }
        meta.name = slug;
        meta.size_bytes = video.len() as u64;
        if meta.created_at.is_empty() {
            meta.created_at = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        }
        if meta.format.is_empty() {
            meta.format = "webm".into();
        }

        let path = self.dir.join(format!("{stem}.webm"));
        let metadata_path = self.dir.join(format!("{stem}_meta.json"));
        write_private(&self.dir, &path, video)?;
        let meta_json = serde_json::to_vec_pretty(&meta)
            .map_err(|err| RecordingError::InvalidMetadata(err.to_string()))?;
        write_private(&self.dir, &metadata_path, &meta_json)?;
        info!(path = %path.display(), bytes = video.len(), "recording saved");
        Ok(SavedRecording {
            name: stem,
            path,
            metadata_path,
            size_bytes: video.len() as u64,
        })
    }

    /// Canonical path of an existing file inside the recordings directory.
    pub fn resolve_reveal(&self, raw: &str) -> RecordingResult<PathBuf> {
        let candidate = Path::new(raw);
        let candidate = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.dir.join(candidate)
        };
        let root = self
            .dir
            .canonicalize()
            .map_err(|_| RecordingError::PathNotAllowed(raw.to_string()))?;
        let resolved = match candidate.canonicalize() {
            Ok(path) => path,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                if lexically_within(&candidate, &self.dir) {
                    return Err(RecordingError::NotFound(raw.to_string()));
                }
                return Err(RecordingError::PathNotAllowed(raw.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        if !resolved.starts_with(&root) {
            debug!(path = raw, "reveal outside recordings directory refused");
            return Err(RecordingError::PathNotAllowed(raw.to_string()));
        }
        Ok(resolved)
    }
}

/// `[A-Za-z0-9._-]`, other runs collapsed to `-`, at most [`MAX_NAME_LEN`] chars.
pub fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    let trimmed: String = out
        .trim_matches(|c| c == '-' || c == '.')
        .chars()
        .take(MAX_NAME_LEN)
        .collect();
    let trimmed = trimmed.trim_end_matches(['-', '.']).to_string();
    if trimmed.is_empty() {
        "recording".to_string()
    } else {
        trimmed
    }
}

/// Program and arguments that open the platform file manager at `path`.
pub fn reveal_command(path: &Path) -> (&'static str, Vec<String>) {
    let display = path.display().to_string();
    if cfg!(target_os = "macos") {
        ("open", vec!["-R".into(), display])
    } else if cfg!(target_os = "windows") {
        ("explorer", vec!["/select,".into(), display])
    } else {
        let dir = path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or(display);
        ("xdg-open", vec![dir])
    }
}

pub async fn reveal(path: &Path) -> io::Result<()> {
    let (program, args) = reveal_command(path);
    let status = tokio::process::Command::new(program)
        .args(&args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{program} exited with {status}"),
        ))
    }
}

fn write_private(dir: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".recording-")
        .suffix(".part")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

fn lexically_within(path: &Path, dir: &Path) -> bool {
    use std::path::Component;
    let Ok(rest) = path.strip_prefix(dir) else {
        return false;
    };
    rest.components().all(|c| matches!(c, Component::Normal(_)))
}
