//! Command line interface
//!
//! Flags pick one action per run. `--uninstall`, `--show-env` and
//! `--list-distros` must be used alone.

use crate::error::{Result, SetupError};
use clap::Parser;

/// Toshy Installer - some options are mutually exclusive
#[derive(Parser, Debug, Default, Clone, PartialEq, Eq)]
#[command(name = "toshy-setup")]
#[command(about = "Toshy Installer - some options are mutually exclusive")]
#[command(after_help = "Default action: Install Toshy")]
#[command(version)]
pub struct Cli {
    /// Override auto-detection of distro. See "--list-distros"
    #[arg(long, value_name = "NAME")]
    pub override_distro: Option<String>,

    /// Display list of distros to use with "--override-distro"
    #[arg(long)]
    pub list_distros: bool,

    /// Uninstall Toshy
    #[arg(long)]
    pub uninstall: bool,

    /// Show the environment the installer detects, and exit
    #[arg(long)]
    pub show_env: bool,

    /// Apply desktop environment tweaks only, no install
    #[arg(long)]
    pub apply_tweaks: bool,

    /// Remove desktop environment tweaks only, no install
    #[arg(long)]
    pub remove_tweaks: bool,

    /// Install with mostly empty/blank keymapper config file.
    #[arg(long)]
    pub barebones_config: bool,

    /// Skip the install of native packages (for debugging installer).
    #[arg(long)]
    pub skip_native: bool,

    /// See README for more info on this option.
    #[arg(long)]
    pub fancy_pants: bool,
}

/// What the run should do, after validating flag combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Uninstall,
    ShowEnv,
    ListDistros,
    ApplyTweaks,
    RemoveTweaks,
}

/// Flags that must be used alone
const EXIT_AFTER_FLAGS: &[&str] = &["--uninstall", "--show-env", "--list-distros"];

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    fn flags_given(&self) -> usize {
        [
            self.apply_tweaks,
            self.remove_tweaks,
            self.override_distro.is_some(),
            self.barebones_config,
            self.skip_native,
            self.fancy_pants,
            self.uninstall,
            self.show_env,
            self.list_distros,
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    /// Pick the action, rejecting combinations that make no sense
    pub fn action(&self) -> Result<Action> {
        let exit_after = self.uninstall || self.show_env || self.list_distros;
        if exit_after && self.flags_given() > 1 {
            let list: String = EXIT_AFTER_FLAGS.iter().map(|f| format!("\n\t{}", f)).collect();
            return Err(SetupError::usage(format!("These options should be used alone:\n{}", list)));
        }
        if self.apply_tweaks && self.remove_tweaks {
            return Err(SetupError::usage(
                "\"--apply-tweaks\" and \"--remove-tweaks\" cannot be used together",
            ));
        }

        Ok(if self.uninstall {
            Action::Uninstall
        } else if self.show_env {
            Action::ShowEnv
        } else if self.list_distros {
            Action::ListDistros
        } else if self.apply_tweaks {
            Action::ApplyTweaks
        } else if self.remove_tweaks {
            Action::RemoveTweaks
        } else {
            Action::Install
        })
    }
}
