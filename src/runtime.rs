//! Python virtual environment and pip packages for the keymapper

use crate::command_runner::{CommandRunner, CommandSpec};
use crate::console;
use crate::distro::DistroGroup;
use crate::error::{Result, SetupError};
use crate::settings::{CURRENT_PYTHON_RELEASE, InstallerSettings, PythonInterpreter};

/// Packages installed into the venv after the pip/wheel/setuptools/pillow
/// upgrades. The last six only smooth over the keymapper's own install.
pub const PIP_PACKAGES: &[&str] = &[
    "lockfile",
    "dbus-python",
    "systemd-python",
    // Newer releases fail to build on RHEL 8 and clones
    "pygobject<=3.44.1",
    "tk",
    "sv_ttk",
    "watchdog",
    "psutil",
    "hyprpy",
    "i3ipc",
    "pywayland",
    "inotify-simple",
    "evdev",
    "appdirs",
    "ordered-set",
    "python-xlib==0.31",
    "six",
];

/// Pip package list for this host. Anything mentioning systemd is dropped
/// when there is no `systemctl`.
pub fn pip_packages(systemctl_present: bool) -> Vec<&'static str> {
    PIP_PACKAGES
        .iter()
        .copied()
        .filter(|pkg| systemctl_present || !pkg.contains("systemd"))
        .collect()
}

/// Create the venv if it does not exist yet
pub fn setup_python_vir_env(settings: &mut InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    console::section("Setting up the Python virtual environment...");

    let venv = settings.paths.venv.clone();
    if !venv.exists() {
        if settings.group == Some(DistroGroup::LeapBased) {
            let current = format!("{}.{}", CURRENT_PYTHON_RELEASE.0, CURRENT_PYTHON_RELEASE.1);
            match runner.which(&format!("python{}", current)) {
                Some(path) => {
                    settings.python = PythonInterpreter::new(path, CURRENT_PYTHON_RELEASE);
                    println!("Using Python version {}.", current);
                }
                None => println!("Current stable Python release version ({}) not found. ", current),
            }
        } else {
            println!("Using Python version {}.", settings.python.version_string());
        }

        let spec = CommandSpec::new(settings.python.path.display().to_string())
            .args(["-m", "venv"])
            .arg(venv.display().to_string());
        runner.run_checked(&spec)?;
        // openmandriva only finishes the venv on the second run
        if settings.distro.name == "openmandriva" {
            runner.run_checked(&spec)?;
        }
    }

    println!("Python virtual environment setup complete.");
    console::task_completed();
    Ok(())
}

/// Upgrade the packaging tools, install the pip packages, then the
/// keymapper from the fresh clone
pub fn install_pip_packages(settings: &InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    console::section("Installing/upgrading Python packages...");

    let bin = settings.paths.venv.join("bin");
    let python = bin.join("python").display().to_string();
    let pip = bin.join("pip").display().to_string();
    let upgrade = |what: Vec<String>| CommandSpec::new(pip.as_str()).args(["install", "--upgrade"]).args(what);

    let mut steps = vec![CommandSpec::new(python.as_str()).args(["-m", "pip", "install", "--upgrade", "pip"])];
    for tool in ["wheel", "setuptools", "pillow"] {
        steps.push(upgrade(vec![tool.to_string()]));
    }
    steps.push(upgrade(
        pip_packages(settings.systemctl_present)
            .into_iter()
            .map(str::to_string)
            .collect(),
    ));

    for step in &steps {
        if let Err(e) = runner.run_checked(step) {
            println!("Error installing/upgrading Python packages. Installer exiting.");
            return Err(e);
        }
    }

    let clone = &settings.paths.clone_dir;
    if !clone.exists() {
        return Err(SetupError::general(
            "Temporary \"keyszer\" clone folder missing. Unable to install \"keyszer\".",
        ));
    }
    if let Err(e) = runner.run_checked(&upgrade(vec![clone.display().to_string()])) {
        println!("Error installing/upgrading \"keyszer\".");
        return Err(e);
    }

    console::task_completed();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::RecordingRunner;
    use crate::distro::DistroIdentity;
    use crate::settings::SetupPaths;
    use std::fs;
    use tempfile::TempDir;

    fn settings_in(root: &TempDir, runner: &mut RecordingRunner) -> InstallerSettings {
        let home = root.path().join("home");
        let src = root.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let mut settings = InstallerSettings::new(SetupPaths::new(&home, root.path(), &src), "alice", runner);
        settings.python = PythonInterpreter::new("/usr/bin/python3", (3, 12));
        settings
    }

    #[test]
    fn test_systemd_packages_filtered_without_systemctl() {
        assert!(pip_packages(true).contains(&"systemd-python"));
        let filtered = pip_packages(false);
        assert!(!filtered.iter().any(|p| p.contains("systemd")));
        assert_eq!(filtered.len(), PIP_PACKAGES.len() - 1);
    }

    #[test]
    fn test_venv_created_twice_on_openmandriva() {
        let root = TempDir::new().unwrap();
        let mut runner = RecordingRunner::new();
        let mut settings = settings_in(&root, &mut runner);
        settings.distro = DistroIdentity::from_raw("openmandriva", "5.0");

        setup_python_vir_env(&mut settings, &mut runner).unwrap();

        let venv_runs = runner
            .command_lines()
            .iter()
            .filter(|l| l.starts_with("/usr/bin/python3 -m venv"))
            .count();
        assert_eq!(venv_runs, 2);
    }

    #[test]
    fn test_leap_prefers_current_release_interpreter() {
        let root = TempDir::new().unwrap();
        let mut runner = RecordingRunner::with_programs(&["python3.11"]);
        let mut settings = settings_in(&root, &mut runner);
        settings.group = Some(DistroGroup::LeapBased);

        setup_python_vir_env(&mut settings, &mut runner).unwrap();

        assert_eq!(settings.python.version, CURRENT_PYTHON_RELEASE);
        assert!(runner.ran("/usr/bin/python3.11 -m venv"));
    }

    #[test]
    fn test_existing_venv_is_left_alone() {
        let root = TempDir::new().unwrap();
        let mut runner = RecordingRunner::new();
        let mut settings = settings_in(&root, &mut runner);
        fs::create_dir_all(&settings.paths.venv).unwrap();

        setup_python_vir_env(&mut settings, &mut runner).unwrap();
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_pip_requires_keymapper_clone() {
        let root = TempDir::new().unwrap();
        let mut runner = RecordingRunner::new();
        let settings = settings_in(&root, &mut runner);

        let err = install_pip_packages(&settings, &mut runner).unwrap_err();
        assert!(err.to_string().contains("clone folder missing"));
        assert_eq!(runner.calls().len(), 5);
    }

    #[test]
    fn test_pip_installs_keymapper_last() {
        let root = TempDir::new().unwrap();
        let mut runner = RecordingRunner::new();
        let settings = settings_in(&root, &mut runner);
        fs::create_dir_all(&settings.paths.clone_dir).unwrap();

        install_pip_packages(&settings, &mut runner).unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].ends_with("python -m pip install --upgrade pip"));
        assert!(lines[5].ends_with(&settings.paths.clone_dir.display().to_string()));
    }

    #[test]
    fn test_pip_failure_stops_the_run() {
        let root = TempDir::new().unwrap();
        let mut runner = RecordingRunner::new();
        let settings = settings_in(&root, &mut runner);
        let pip = settings.paths.venv.join("bin/pip").display().to_string();
        runner.respond(&format!("{} install --upgrade wheel", pip), 1, "");

        assert!(install_pip_packages(&settings, &mut runner).is_err());
        assert_eq!(runner.calls().len(), 2);
    }
}
