//! Write-then-rename file replacement.
//!
//! Content is written to a temporary file in the destination directory and only
//! renamed over the target on `commit`, so readers never observe a partial file.

use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A fully written, fsynced file waiting to be moved into place.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Write `bytes` next to `target` without touching `target` itself.
    pub fn stage(target: impl AsRef<Path>, bytes: &[u8]) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        Ok(Self { temp, target })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically replace the target with the staged content.
    pub fn commit(self) -> Result<()> {
        self.temp.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Stage and commit in one step.
pub fn write_atomic(target: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    StagedFile::stage(target, bytes)?.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_does_not_touch_target_until_commit() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("out.bin");

        let staged = StagedFile::stage(&target, b"hello").unwrap();
        assert!(!target.exists());
        assert_eq!(staged.target(), target.as_path());

        staged.commit().unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
    }

    #[test]
    fn test_dropped_stage_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.bin");
        {
            let _staged = StagedFile::stage(&target, b"partial").unwrap();
        }
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.txt");
        write_atomic(&target, b"one").unwrap();
        write_atomic(&target, b"two").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"two");
    }
}
