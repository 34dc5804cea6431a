//! Clip files below a root directory (the mounted SD card).
use std::path::{Path, PathBuf};

use exchange_traits::Assets;

use crate::error::{HwError, Result};

/// Resolves clip paths like `/system/busy_tone.wav` against `root`.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    /// Fails when `root` is not a readable directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let meta = std::fs::metadata(&root)?;
        if !meta.is_dir() {
            return Err(HwError::MissingAsset(root.display().to_string()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a clip path.
    pub fn resolve(&self, clip: &str) -> PathBuf {
        self.root.join(clip.trim_start_matches('/'))
    }
}

impl Assets for DirAssets {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn list(&self, folder: &str) -> Vec<String> {
        let dir = self.resolve(folder);
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(folder, error = %e, "cannot list folder");
                return Vec::new();
            }
        };
        let prefix = folder.trim_end_matches('/');
        let mut files: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .map(|name| format!("{prefix}/{name}"))
            .collect();
        files.sort();
        files
    }
}
