//! Pre-flight sanity checks for the runtime environment
//!
//! Verified before anything else runs:
//! - Not running as root (sudo is used per command instead)
//! - `PATH` is set
//! - `sudo` is available
//! - The installer is not being run from the desktop Trash
//!
//! If any check fails, the program exits with a clear error message.

use crate::command_runner::SAFE_PATH;
use std::path::{Path, PathBuf};

/// Result of environment verification
#[derive(Debug, Default)]
pub struct SanityCheckResult {
    pub is_root: bool,
    pub path_missing: bool,
    pub sudo_missing: bool,
    /// Set when the installer lives in a Trash folder
    pub trash_path: Option<PathBuf>,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        !self.is_root && !self.path_missing && !self.sudo_missing && self.trash_path.is_none()
    }
}

/// Whether `location` sits inside a Trash folder
pub fn is_in_trash(location: &Path, home: &Path) -> bool {
    let trash = home.join(".local").join("share").join("Trash");
    location.starts_with(&trash) || location.to_string_lossy().to_lowercase().contains("/trash/")
}

/// Perform all sanity checks and return the result
pub fn verify_environment(location: &Path, home: &Path) -> SanityCheckResult {
    SanityCheckResult {
        is_root: nix::unistd::geteuid().is_root(),
        path_missing: std::env::var_os("PATH").is_none(),
        sudo_missing: which::which_in("sudo", Some(SAFE_PATH), "/").is_err(),
        trash_path: is_in_trash(location, home).then(|| location.to_path_buf()),
    }
}

/// Print a boxed error message to stderr and exit
pub fn print_error_and_exit(result: &SanityCheckResult) -> ! {
    eprintln!();
    eprintln!("╔══════════════════════════════════════════════════════════════════╗");
    eprintln!("║               Toshy Installer - Pre-flight Check Failed          ║");
    eprintln!("╚══════════════════════════════════════════════════════════════════╝");
    eprintln!();

    if result.is_root {
        eprintln!("❌ ERROR: Running as root");
        eprintln!("   Toshy is installed per user. Run the installer as your regular");
        eprintln!("   user; it asks for the sudo password when it needs it.");
        eprintln!();
    }

    if result.path_missing {
        eprintln!("❌ ERROR: PATH variable is not set. This is abnormal.");
        eprintln!();
    }

    if result.sudo_missing {
        eprintln!("❌ ERROR: 'sudo' not found. Installer will fail without it.");
        eprintln!();
    }

    if let Some(path) = &result.trash_path {
        eprintln!("❌ ERROR: Installer is in the Trash");
        eprintln!("   Path to this file:\n\t{}", path.display());
        eprintln!("   You probably did not intend to run this from the TRASH.");
        eprintln!();
    }

    eprintln!("╔══════════════════════════════════════════════════════════════════╗");
    eprintln!("║  Fix the above issues and try again.                             ║");
    eprintln!("╚══════════════════════════════════════════════════════════════════╝");
    eprintln!();

    std::process::exit(1);
}

/// Verify the environment and exit if any check fails
pub fn run_preflight_checks(location: &Path, home: &Path) {
    tracing::debug!("Running pre-flight sanity checks...");

    let result = verify_environment(location, home);
    if !result.is_ok() {
        print_error_and_exit(&result);
    }

    tracing::info!("Pre-flight checks passed");
}
