//! The batch conversion pipeline.
//!
//! Data flows one way through the stages; nothing here mutates another
//! stage's state:
//!
//! ```text
//! multipart + query + descriptors JSON
//!        │
//!        ▼
//! options  (ConversionOptions, parsed once per batch)
//! descriptor (DescriptorIndex, parsed once per batch)
//!        │
//!        ▼
//! intake   (per file: validate, move into scratch space, merge descriptor)
//!        │
//!        ▼
//! executor (per processable file: cwebp subprocess, size metrics)
//!        │
//!        ▼
//! report   (ordered ResultRecords, response envelope)
//! ```
//!
//! `runner` drives the stages for a whole batch; `Scratch` guarantees every
//! temporary file the batch created is reclaimed even when the request future
//! is cancelled mid-flight.

pub mod descriptor;
pub mod executor;
pub mod intake;
pub mod options;
pub mod report;
pub mod runner;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Tracks every temporary file a batch creates and removes the survivors on
/// drop. Stages delete their files eagerly when they finish with them; the
/// guard exists for the paths left behind by failures or request
/// cancellation. Removal errors are logged, never propagated.
#[derive(Debug, Default)]
pub struct Scratch {
    paths: Mutex<Vec<PathBuf>>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for reclamation. Safe to call before the file exists;
    /// missing files are skipped at cleanup time.
    pub fn register(&self, path: PathBuf) {
        self.paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(path);
    }
}

/// Remove a file, ignoring "already gone" and logging anything else.
pub(crate) fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove scratch file");
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let paths = self
            .paths
            .get_mut()
            .map(std::mem::take)
            .unwrap_or_else(|poisoned| std::mem::take(poisoned.into_inner()));
        for path in paths {
            remove_quietly(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_registered_files() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.bin");
        let gone = dir.path().join("gone.bin");
        std::fs::write(&kept, b"data").unwrap();
        std::fs::write(&gone, b"data").unwrap();

        let scratch = Scratch::new();
        scratch.register(gone.clone());
        drop(scratch);

        assert!(kept.exists());
        assert!(!gone.exists());
    }

    #[test]
    fn drop_tolerates_already_removed_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-created.bin");
        let scratch = Scratch::new();
        scratch.register(path);
        drop(scratch); // must not panic
    }
}
