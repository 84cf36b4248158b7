//! Marker files in the runtime directory
//!
//! Each marker's existence is the whole signal. The helper shell scripts
//! and later runs of the installer look for them.

use crate::error::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// `~/.local/bin` is already on PATH
    PathIsGood,
    /// User agreed to have `~/.local/bin` added to PATH
    FixPath,
    /// A reboot is needed before the keymapper can work
    Reboot,
}

impl Sentinel {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::PathIsGood => "toshy_installer_says_path_is_good",
            Self::FixPath => "toshy_installer_says_fix_path",
            Self::Reboot => "toshy_installer_says_reboot",
        }
    }

    pub fn path(self, runtime_dir: &Path) -> PathBuf {
        runtime_dir.join(self.file_name())
    }

    pub fn exists(self, runtime_dir: &Path) -> bool {
        self.path(runtime_dir).exists()
    }

    /// Create the marker if it is not there yet
    pub fn set(self, runtime_dir: &Path) -> Result<()> {
        let path = self.path(runtime_dir);
        if !path.exists() {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(b"Nothing to see here.")?;
            tracing::debug!("Created marker {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_is_idempotent() {
        let dir = TempDir::new().unwrap();
        assert!(!Sentinel::Reboot.exists(dir.path()));

        Sentinel::Reboot.set(dir.path()).unwrap();
        Sentinel::Reboot.set(dir.path()).unwrap();

        assert!(Sentinel::Reboot.exists(dir.path()));
        assert!(!Sentinel::FixPath.exists(dir.path()));
        assert_eq!(
            std::fs::read_to_string(Sentinel::Reboot.path(dir.path())).unwrap(),
            "Nothing to see here."
        );
    }
}
