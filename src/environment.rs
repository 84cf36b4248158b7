//! Runtime environment detection
//!
//! Gaps are never fatal: an unreadable init process name becomes
//! `InitSystem::Unknown` and a missing value becomes [`KEY_MISSING`].

use crate::console;
use crate::distro::DistroIdentity;
use crate::settings::InstallerSettings;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Placeholder for an environment value that could not be determined
pub const KEY_MISSING: &str = "keymissing";

/// Init system, from the command name of PID 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitSystem {
    Systemd,
    SysVinit,
    Upstart,
    OpenRc,
    Runit,
    Initng,
    Unknown(String),
}

impl InitSystem {
    pub fn from_comm(comm: &str) -> Self {
        match comm.trim() {
            "systemd" => Self::Systemd,
            "init" => Self::SysVinit,
            "upstart" => Self::Upstart,
            "openrc" => Self::OpenRc,
            "runit" => Self::Runit,
            "initng" => Self::Initng,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_systemd(&self) -> bool {
        matches!(self, Self::Systemd)
    }
}

impl fmt::Display for InitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Systemd => "Systemd",
            Self::SysVinit => "SysVinit",
            Self::Upstart => "Upstart",
            Self::OpenRc => "OpenRC",
            Self::Runit => "Runit",
            Self::Initng => "Initng",
            Self::Unknown(comm) => return write!(f, "unknown ({})", comm),
        };
        write!(f, "{}", name)
    }
}

/// Read `/proc/1/comm` (or the given path)
pub fn detect_init_system(comm_path: &Path) -> InitSystem {
    match fs::read_to_string(comm_path) {
        Ok(comm) => {
            let init = InitSystem::from_comm(&comm);
            match &init {
                InitSystem::Unknown(name) => println!("Init system process unknown: '{}'", name),
                known => println!("The active init system is: '{}' ({})", comm.trim(), known),
            }
            init
        }
        Err(e) => {
            tracing::error!("Problem when checking init system: {}", e);
            console::problem("ERROR: Init system (process 1) could not be determined.");
            InitSystem::Unknown(String::new())
        }
    }
}

/// Raw environment facts, lowercased
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvInfo {
    pub distro_name: String,
    pub distro_version: String,
    pub session_type: String,
    pub desktop_env: String,
}

impl Default for EnvInfo {
    fn default() -> Self {
        Self {
            distro_name: KEY_MISSING.to_string(),
            distro_version: KEY_MISSING.to_string(),
            session_type: KEY_MISSING.to_string(),
            desktop_env: KEY_MISSING.to_string(),
        }
    }
}

/// Something that can describe the running environment
pub trait EnvInfoSource {
    fn env_info(&self) -> EnvInfo;
}

/// A fixed description, for `--override-distro` style tests and dry runs
impl EnvInfoSource for EnvInfo {
    fn env_info(&self) -> EnvInfo {
        self.clone()
    }
}

/// Reads `/etc/os-release` and the session variables
#[derive(Debug, Clone)]
pub struct OsReleaseSource {
    pub os_release: PathBuf,
}

impl Default for OsReleaseSource {
    fn default() -> Self {
        Self {
            os_release: PathBuf::from("/etc/os-release"),
        }
    }
}

impl EnvInfoSource for OsReleaseSource {
    fn env_info(&self) -> EnvInfo {
        let map = fs::read_to_string(&self.os_release)
            .map(|data| parse_os_release(&data))
            .unwrap_or_else(|e| {
                tracing::warn!("Could not read {}: {}", self.os_release.display(), e);
                HashMap::new()
            });

        let lookup = |key: &str| {
            map.get(key)
                .filter(|v| !v.is_empty())
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|| KEY_MISSING.to_string())
        };

        EnvInfo {
            distro_name: lookup("ID"),
            distro_version: lookup("VERSION_ID"),
            session_type: session_type_from(|k| std::env::var(k).ok()),
            desktop_env: desktop_env_from(|k| std::env::var(k).ok()),
        }
    }
}

pub fn parse_os_release(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let cleaned = value.trim().trim_matches('"').trim_matches('\'');
            map.insert(key.to_string(), cleaned.to_string());
        }
    }
    map
}

fn session_type_from(var: impl Fn(&str) -> Option<String>) -> String {
    if let Some(kind) = var("XDG_SESSION_TYPE").filter(|v| !v.is_empty()) {
        return kind.to_lowercase();
    }
    if var("WAYLAND_DISPLAY").is_some() {
        "wayland".to_string()
    } else if var("DISPLAY").is_some() {
        "x11".to_string()
    } else {
        KEY_MISSING.to_string()
    }
}

fn desktop_env_from(var: impl Fn(&str) -> Option<String>) -> String {
    var("XDG_CURRENT_DESKTOP")
        .filter(|v| !v.is_empty())
        .or_else(|| var("DESKTOP_SESSION").filter(|v| !v.is_empty()))
        .map(|raw| normalize_desktop(&raw))
        .unwrap_or_else(|| KEY_MISSING.to_string())
}

/// Map desktop names such as `KDE`, `plasma` or `ubuntu:GNOME` to one token
pub fn normalize_desktop(raw: &str) -> String {
    const KNOWN: &[(&str, &str)] = &[
        ("kde", "kde"),
        ("plasma", "kde"),
        ("gnome", "gnome"),
        ("x-cinnamon", "cinnamon"),
        ("cinnamon", "cinnamon"),
        ("xfce", "xfce"),
        ("mate", "mate"),
        ("budgie", "budgie"),
        ("budgie-desktop", "budgie"),
        ("lxqt", "lxqt"),
        ("pantheon", "pantheon"),
        ("hyprland", "hyprland"),
        ("sway", "sway"),
        ("unity", "unity"),
    ];

    let lowered = raw.trim().to_lowercase();
    let parts: Vec<&str> = lowered.split(':').map(str::trim).collect();
    for part in &parts {
        if let Some((_, name)) = KNOWN.iter().find(|(alias, _)| alias == part) {
            return name.to_string();
        }
    }
    parts
        .first()
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .unwrap_or_else(|| KEY_MISSING.to_string())
}

/// Fill the environment facts of `settings`
pub fn probe_environment(settings: &mut InstallerSettings, source: &dyn EnvInfoSource) {
    console::section("Getting environment information...");

    settings.init_system = detect_init_system(&settings.system.init_comm);
    println!();

    let info = source.env_info();
    let name = settings
        .override_distro
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or(info.distro_name);

    settings.distro = DistroIdentity::from_raw(&name, &info.distro_version);
    settings.distro_version = info.distro_version;
    settings.session_type = info.session_type;
    settings.desktop_env = info.desktop_env;

    tracing::debug!(
        distro = %settings.distro.name,
        version = %settings.distro_version,
        session = %settings.session_type,
        desktop = %settings.desktop_env,
        "Installer sees this environment"
    );
}

/// Text shown by `--show-env`
pub fn describe(settings: &InstallerSettings) -> String {
    format!(
        "Toshy installer sees this environment:\
         \n\t DISTRO_NAME  = '{}'\
         \n\t DISTRO_VER   = '{}'\
         \n\t SESSION_TYPE = '{}'\
         \n\t DESKTOP_ENV  = '{}'\
         \n\t INIT_SYSTEM  = '{}'",
        settings.distro.name,
        settings.distro_version,
        settings.session_type,
        settings.desktop_env,
        settings.init_system
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_init_system_from_comm() {
        assert_eq!(InitSystem::from_comm("systemd\n"), InitSystem::Systemd);
        assert_eq!(InitSystem::from_comm("init"), InitSystem::SysVinit);
        assert_eq!(InitSystem::from_comm("openrc"), InitSystem::OpenRc);
        assert_eq!(
            InitSystem::from_comm("s6-svscan"),
            InitSystem::Unknown("s6-svscan".to_string())
        );
    }

    #[test]
    fn test_detect_init_system_unreadable() {
        let init = detect_init_system(Path::new("/nonexistent/proc/1/comm"));
        assert_eq!(init, InitSystem::Unknown(String::new()));
    }

    #[test]
    fn test_detect_init_system_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "runit").unwrap();
        assert_eq!(detect_init_system(file.path()), InitSystem::Runit);
    }

    #[test]
    fn test_parse_os_release() {
        let map = parse_os_release("# comment\nID=ubuntu\nVERSION_ID=\"22.04\"\n\nNAME='Ubuntu'\n");
        assert_eq!(map["ID"], "ubuntu");
        assert_eq!(map["VERSION_ID"], "22.04");
        assert_eq!(map["NAME"], "Ubuntu");
    }

    #[test]
    fn test_os_release_source_missing_keys() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ID=Fedora").unwrap();
        let info = OsReleaseSource {
            os_release: file.path().to_path_buf(),
        }
        .env_info();
        assert_eq!(info.distro_name, "fedora");
        assert_eq!(info.distro_version, KEY_MISSING);
    }

    #[test]
    fn test_normalize_desktop() {
        assert_eq!(normalize_desktop("KDE"), "kde");
        assert_eq!(normalize_desktop("plasma"), "kde");
        assert_eq!(normalize_desktop("ubuntu:GNOME"), "gnome");
        assert_eq!(normalize_desktop("X-Cinnamon"), "cinnamon");
        assert_eq!(normalize_desktop("Enlightenment"), "enlightenment");
        assert_eq!(normalize_desktop(""), KEY_MISSING);
    }

    #[test]
    fn test_session_and_desktop_fallbacks() {
        let vars = |pairs: &'static [(&'static str, &'static str)]| {
            move |k: &str| {
                pairs
                    .iter()
                    .find(|(key, _)| *key == k)
                    .map(|(_, v)| v.to_string())
            }
        };
        assert_eq!(session_type_from(vars(&[("XDG_SESSION_TYPE", "Wayland")])), "wayland");
        assert_eq!(session_type_from(vars(&[("DISPLAY", ":0")])), "x11");
        assert_eq!(session_type_from(vars(&[])), KEY_MISSING);
        assert_eq!(desktop_env_from(vars(&[("DESKTOP_SESSION", "plasma")])), "kde");
        assert_eq!(desktop_env_from(vars(&[])), KEY_MISSING);
    }
}
