//! Temporary output destinations.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory that is deleted when dropped. Outputs go into the
/// `out` subdirectory, which is left for the writer to create.
pub struct TempOutputDir {
    #[allow(dead_code)]
    temp_dir: TempDir,
    out: PathBuf,
}

impl TempOutputDir {
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let out = temp_dir.path().join("out");
        Ok(Self { temp_dir, out })
    }

    /// The output directory handed to the writer.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.out
    }

    /// Every file written so far, sorted by name. Empty if the directory was
    /// never created.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    pub fn files(&self) -> std::io::Result<Vec<PathBuf>> {
        if !self.out.exists() {
            return Ok(Vec::new());
        }
        let mut files = fs::read_dir(&self.out)?
            .map(|e| e.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        files.sort();
        Ok(files)
    }

    /// Files whose name starts with `{content_hash}__`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn files_for(&self, content_hash: &str) -> std::io::Result<Vec<PathBuf>> {
        let prefix = format!("{content_hash}__");
        Ok(self
            .files()?
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect())
    }
}
