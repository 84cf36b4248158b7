//! Toshy Setup Library
//!
//! Installer and uninstaller for the Toshy keymapper: environment probing,
//! distro classification and package dispatch, device access, config
//! backup and slice merging, and the desktop integrations.

pub mod cli;
pub mod command_runner;
pub mod console;
pub mod deploy;
pub mod desktop;
pub mod distro;
pub mod environment;
pub mod error;
pub mod install_state;
pub mod installer;
pub mod orchestrator;
pub mod packages;
pub mod privilege;
pub mod process_guard;
pub mod prompt;
pub mod quirks;
pub mod runtime;
pub mod sanity;
pub mod sentinel;
pub mod settings;
pub mod slices;
pub mod system_setup;
pub mod tweaks;
pub mod uninstall;

// Re-export main types for convenience
pub use cli::{Action, Cli};
pub use command_runner::{CommandOutput, CommandRunner, CommandSpec, RecordingRunner, SystemRunner};
pub use distro::{DistroGroup, DistroIdentity, PackageManagerFamily, classify};
pub use environment::{EnvInfo, EnvInfoSource, InitSystem, OsReleaseSource};
pub use error::{Result, SetupError};
pub use install_state::{InstallProgress, InstallStage};
pub use installer::NativePackageInstaller;
pub use orchestrator::Installer;
pub use packages::resolve;
pub use process_guard::{ChildRegistry, CommandLifecycle};
pub use prompt::{Confirmation, Prompter, ScriptedPrompter, StdioPrompter};
pub use settings::{InstallerSettings, PythonInterpreter, SetupPaths, SystemPaths};
pub use slices::{SliceMap, extract_slices, merge_slices};
