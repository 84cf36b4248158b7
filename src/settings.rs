//! Run context shared by every installer step
//!
//! One [`InstallerSettings`] is built in `main` and passed `&mut` through
//! the orchestrator. Nothing here is global.

use crate::command_runner::{CommandRunner, CommandSpec};
use crate::distro::{DistroGroup, DistroIdentity};
use crate::environment::{InitSystem, KEY_MISSING};
use crate::error::{Result, SetupError};
use crate::sentinel::Sentinel;
use crate::slices::SliceMap;
use std::path::{Path, PathBuf};

/// Newest stable Python release the installer targets
pub const CURRENT_PYTHON_RELEASE: (u32, u32) = (3, 11);

pub const KEYMAPPER_BRANCH: &str = "environ_api_hyprland";
pub const KEYMAPPER_URL: &str = "https://github.com/RedBearAK/keyszer.git";
pub const KEYMAPPER_CLONE_DIR: &str = "keyszer-temp";
pub const PREFS_DB_NAME: &str = "toshy_user_preferences.sqlite";
pub const CONFIG_FILE_NAME: &str = "toshy_config.py";
pub const INPUT_GROUP: &str = "input";

/// A Python interpreter and its `major.minor` version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonInterpreter {
    pub path: PathBuf,
    pub version: (u32, u32),
}

impl PythonInterpreter {
    pub fn new(path: impl Into<PathBuf>, version: (u32, u32)) -> Self {
        Self {
            path: path.into(),
            version,
        }
    }

    /// `"3.11"`
    pub fn version_string(&self) -> String {
        format!("{}.{}", self.version.0, self.version.1)
    }

    pub fn is_older_than(&self, version: (u32, u32)) -> bool {
        self.version < version
    }

    /// Parse `Python 3.11.4` style output
    pub fn parse_version(text: &str) -> Option<(u32, u32)> {
        let number = text.split_whitespace().find(|w| w.starts_with(|c: char| c.is_ascii_digit()))?;
        let mut parts = number.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts
            .next()?
            .trim_end_matches(|c: char| !c.is_ascii_digit())
            .parse()
            .ok()?;
        Some((major, minor))
    }

    /// Locate `python3` and ask it for its version
    pub fn detect(runner: &mut dyn CommandRunner) -> Self {
        let Some(path) = runner.which("python3") else {
            tracing::warn!("python3 not found on the search path");
            return Self::new("python3", (0, 0));
        };

        let spec = CommandSpec::new(path.display().to_string())
            .arg("--version")
            .capture();
        let version = runner
            .run(&spec)
            .ok()
            .filter(|out| out.success)
            .and_then(|out| {
                // Python 2 printed the version on stderr
                Self::parse_version(&out.stdout).or_else(|| Self::parse_version(&out.stderr))
            })
            .unwrap_or_else(|| {
                tracing::warn!("Could not determine version of {}", path.display());
                (0, 0)
            });

        Self::new(path, version)
    }
}

/// Per-user paths for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupPaths {
    pub home: PathBuf,
    /// `XDG_RUNTIME_DIR`, or `/tmp`
    pub runtime_dir: PathBuf,
    /// Directory holding the files to deploy
    pub source_dir: PathBuf,
    pub toshy_dir: PathBuf,
    pub venv: PathBuf,
    pub backups_dir: PathBuf,
    pub clone_dir: PathBuf,
    pub local_bin: PathBuf,
}

impl SetupPaths {
    pub fn new(home: &Path, runtime_dir: &Path, source_dir: &Path) -> Self {
        let toshy_dir = home.join(".config").join("toshy");
        Self {
            home: home.to_path_buf(),
            runtime_dir: runtime_dir.to_path_buf(),
            source_dir: source_dir.to_path_buf(),
            venv: toshy_dir.join(".venv"),
            toshy_dir,
            backups_dir: home.join(".config").join("toshy_config_backups"),
            clone_dir: source_dir.join(KEYMAPPER_CLONE_DIR),
            local_bin: home.join(".local").join("bin"),
        }
    }

    /// Resolve from the running user's environment.
    /// `TOSHY_SOURCE_DIR` selects the source tree, else the working directory.
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| SetupError::validation("could not determine home directory"))?;
        let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp"));
        let source_dir = match std::env::var_os("TOSHY_SOURCE_DIR").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };
        Ok(Self::new(&home, &runtime_dir, &source_dir))
    }

    pub fn config_file(&self) -> PathBuf {
        self.toshy_dir.join(CONFIG_FILE_NAME)
    }

    pub fn prefs_db(&self) -> PathBuf {
        self.toshy_dir.join(PREFS_DB_NAME)
    }

    /// Where the preferences database waits during redeployment
    pub fn prefs_db_aside(&self) -> PathBuf {
        self.runtime_dir.join(PREFS_DB_NAME)
    }

    pub fn autostart_dir(&self) -> PathBuf {
        self.home.join(".config").join("autostart")
    }

    pub fn applications_dir(&self) -> PathBuf {
        self.home.join(".local").join("share").join("applications")
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.home.join(".local").join("share").join("fonts")
    }

    pub fn xmodmap(&self) -> PathBuf {
        self.home.join(".Xmodmap")
    }
}

/// System locations touched by the installer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPaths {
    pub init_comm: PathBuf,
    pub modules_load_dir: PathBuf,
    pub modules_file: PathBuf,
    pub udev_rules_file: PathBuf,
    pub group_file: PathBuf,
    pub lib_group_file: PathBuf,
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self {
            init_comm: PathBuf::from("/proc/1/comm"),
            modules_load_dir: PathBuf::from("/etc/modules-load.d"),
            modules_file: PathBuf::from("/etc/modules"),
            udev_rules_file: PathBuf::from("/etc/udev/rules.d/90-toshy-keymapper-input.rules"),
            group_file: PathBuf::from("/etc/group"),
            lib_group_file: PathBuf::from("/usr/lib/group"),
        }
    }
}

impl SystemPaths {
    /// Every location under `root`, for tests
    pub fn rooted(root: &Path) -> Self {
        let defaults = Self::default();
        let under = |p: &Path| root.join(p.strip_prefix("/").unwrap_or(p));
        Self {
            init_comm: under(&defaults.init_comm),
            modules_load_dir: under(&defaults.modules_load_dir),
            modules_file: under(&defaults.modules_file),
            udev_rules_file: under(&defaults.udev_rules_file),
            group_file: under(&defaults.group_file),
            lib_group_file: under(&defaults.lib_group_file),
        }
    }
}

/// Everything one run knows and decides
#[derive(Debug, Clone)]
pub struct InstallerSettings {
    pub paths: SetupPaths,
    pub system: SystemPaths,
    pub user_name: String,

    pub override_distro: Option<String>,
    pub init_system: InitSystem,
    pub distro: DistroIdentity,
    /// Version string as reported, before splitting
    pub distro_version: String,
    pub session_type: String,
    pub desktop_env: String,
    /// Set once classification succeeds
    pub group: Option<DistroGroup>,

    pub systemctl_present: bool,
    /// `qdbus-qt5` where available, else `qdbus`
    pub qdbus: String,
    pub python: PythonInterpreter,

    pub barebones_config: bool,
    pub skip_native: bool,
    pub fancy_pants: bool,
    /// `~/.local/bin` was already on the caller's PATH
    pub local_bin_on_path: bool,

    pub backup_succeeded: bool,
    pub existing_slices: Option<SliceMap>,

    pub should_reboot: bool,
    pub tweak_applied: bool,
    pub remind_extensions: bool,
}

impl InstallerSettings {
    /// Fresh settings with host facts taken from `runner`
    pub fn new(paths: SetupPaths, user_name: impl Into<String>, runner: &mut dyn CommandRunner) -> Self {
        let systemctl_present = runner.exists("systemctl");
        let qdbus = if runner.exists("qdbus-qt5") { "qdbus-qt5" } else { "qdbus" }.to_string();
        let python = PythonInterpreter::detect(runner);

        Self {
            paths,
            system: SystemPaths::default(),
            user_name: user_name.into(),
            override_distro: None,
            init_system: InitSystem::Unknown(String::new()),
            distro: DistroIdentity::from_raw(KEY_MISSING, ""),
            distro_version: KEY_MISSING.to_string(),
            session_type: KEY_MISSING.to_string(),
            desktop_env: KEY_MISSING.to_string(),
            group: None,
            systemctl_present,
            qdbus,
            python,
            barebones_config: false,
            skip_native: false,
            fancy_pants: false,
            local_bin_on_path: false,
            backup_succeeded: false,
            existing_slices: None,
            should_reboot: false,
            tweak_applied: false,
            remind_extensions: false,
        }
    }

    pub fn is_kde(&self) -> bool {
        self.desktop_env == "kde"
    }

    pub fn is_gnome(&self) -> bool {
        self.desktop_env == "gnome"
    }

    pub fn is_wayland(&self) -> bool {
        self.session_type == "wayland"
    }

    /// systemd units can be managed on this host
    pub fn uses_systemd_services(&self) -> bool {
        self.systemctl_present && self.init_system.is_systemd()
    }

    /// Remember that a reboot is needed, for this run and for helper scripts
    pub fn request_reboot(&mut self) {
        self.should_reboot = true;
        if let Err(e) = Sentinel::Reboot.set(&self.paths.runtime_dir) {
            tracing::warn!("Could not create reboot marker: {}", e);
        }
    }
}

/// Name of the invoking user
pub fn current_user_name() -> String {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|user| user.name)
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_default()
}
