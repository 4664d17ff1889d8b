//! Upload scratch directory and scoped cleanup

use std::path::{Path, PathBuf};

use crate::Result;

/// Directory that holds per-request temporary audio files
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    /// Use `root` as the upload directory, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Path of the upload directory
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Start a new set of request-scoped scratch files
    #[must_use]
    pub fn scratch(&self) -> ScratchFiles {
        ScratchFiles {
            root: self.root.clone(),
            paths: Vec::new(),
        }
    }
}

/// Temporary files owned by a single request
///
/// Every path handed out by [`ScratchFiles::reserve`] is removed when this
/// value is dropped, whether the request succeeded, failed, or its future
/// was cancelled.
#[derive(Debug)]
pub struct ScratchFiles {
    root: PathBuf,
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    /// Reserve a unique path with the given extension
    ///
    /// The file is not created; whatever ends up at the path is removed on drop.
    pub fn reserve(&mut self, extension: &str) -> PathBuf {
        let path = self
            .root
            .join(format!("{}.{extension}", uuid::Uuid::new_v4()));
        self.paths.push(path.clone());
        path
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::trace!(path = %path.display(), "removed scratch file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch file");
                }
            }
        }
    }
}

/// Pick a file extension for an upload from its MIME type or file name
///
/// The extension is only a hint for `ffmpeg`, which probes the content anyway.
#[must_use]
pub fn extension_for(mime_type: Option<&str>, file_name: Option<&str>) -> String {
    let essence = mime_type
        .and_then(|m| m.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase());

    let from_mime = match essence.as_deref() {
        Some("audio/webm" | "video/webm") => Some("webm"),
        Some("audio/ogg" | "audio/opus") => Some("ogg"),
        Some("audio/wav" | "audio/x-wav" | "audio/wave") => Some("wav"),
        Some("audio/mpeg" | "audio/mp3") => Some("mp3"),
        Some("audio/mp4" | "audio/m4a" | "audio/x-m4a") => Some("m4a"),
        Some("audio/flac" | "audio/x-flac") => Some("flac"),
        _ => None,
    };

    if let Some(ext) = from_mime {
        return ext.to_string();
    }

    file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase)
}
