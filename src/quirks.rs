//! Release-specific preparation before the native package install
//!
//! A fixed dispatch table: each [`Quirk`] names one distro release that
//! needs extra repositories or a newer Python before the package list can
//! install. Failures are fatal, except a single candidate interpreter that
//! fails to install while probing.

use crate::command_runner::{CommandRunner, CommandSpec};
use crate::distro::{DistroGroup, DistroIdentity};
use crate::error::{Result, SetupError};
use crate::installer::check_for_pkg_mgr_cmd;
use crate::settings::{CURRENT_PYTHON_RELEASE, InstallerSettings, PythonInterpreter};
use std::path::PathBuf;

/// Interpreter installed from Software Collections on CentOS 7
const SCL_PYTHON38: &str = "/opt/rh/rh-python38/root/usr/bin/python3.8";

/// Candidate interpreters for RHEL 8 clones, newest first
const RHEL8_PYTHON_CANDIDATES: &[&str] = &["3.14", "3.13", "3.12", "3.11", "3.10", "3.9", "3.8"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quirk {
    /// EOL release: Python 3.8 from SCL, dnf from yum
    CentOs7,
    /// Newer Python from AppStream plus its devel and tkinter packages
    CentOsStream8,
    /// EPEL and CRB repositories for every RHEL-type distro
    RhelFamily,
}

/// Quirks that apply to this distro, in execution order
pub fn quirks_for(group: DistroGroup, identity: &DistroIdentity) -> Vec<Quirk> {
    if group != DistroGroup::RhelBased {
        return Vec::new();
    }

    let mut quirks = Vec::new();
    if identity.name == "centos" {
        match identity.major_version.as_str() {
            "7" => quirks.push(Quirk::CentOs7),
            "8" => quirks.push(Quirk::CentOsStream8),
            _ => {}
        }
    }
    quirks.push(Quirk::RhelFamily);
    quirks
}

/// Run one quirk, updating the interpreter and systemd facts in `settings`
pub fn apply(quirk: Quirk, settings: &mut InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    match quirk {
        Quirk::CentOs7 => centos7(settings, runner),
        Quirk::CentOsStream8 => centos_stream8(settings, runner),
        Quirk::RhelFamily => rhel_family(settings, runner),
    }
}

fn dnf_install<I, S>(packages: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::sudo("dnf").args(["install", "-y"]).args(packages)
}

fn centos7(settings: &mut InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    println!("Doing prep/checks for CentOS 7...");
    check_for_pkg_mgr_cmd(runner, "yum")?;
    let yum_install = || CommandSpec::sudo("yum").args(["install", "-y"]);

    if !settings.python.is_older_than((3, 8)) {
        println!(
            "Good, Python version is 3.8 or later: '{}'",
            settings.python.version_string()
        );
    } else {
        runner.run_checked(&yum_install().arg("centos-release-scl"))?;
        runner.run_checked(&yum_install().args([
            "rh-python38",
            "rh-python38-python-devel",
            "rh-python38-python-tkinter",
            "rh-python38-python-wheel-wheel",
        ]))?;

        settings.python = PythonInterpreter::new(SCL_PYTHON38, (3, 8));
        // systemd packages and services are not used on CentOS 7
        settings.systemctl_present = false;
        tracing::info!("Using SCL Python 3.8, systemd support disabled");
    }

    runner.run_checked(&yum_install().arg("dnf"))?;
    Ok(())
}

/// Minor versions probed on CentOS Stream 8: current+3 down to current-2
fn stream8_candidates() -> Vec<(u32, u32)> {
    let (major, minor) = CURRENT_PYTHON_RELEASE;
    (minor.saturating_sub(2)..=minor + 3)
        .rev()
        .map(|m| (major, m))
        .collect()
}

fn centos_stream8(settings: &mut InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    println!("Doing prep/checks for CentOS Stream 8...");

    if settings.python.is_older_than(CURRENT_PYTHON_RELEASE) {
        println!("Checking for appropriate Python version on system...");
        let found = stream8_candidates().into_iter().find_map(|version| {
            runner
                .which(&format!("python{}.{}", version.0, version.1))
                .map(|path| PythonInterpreter::new(path, version))
        });
        match found {
            Some(python) => {
                println!("Found Python version {} available.", python.version_string());
                settings.python = python;
            }
            None => {
                return Err(SetupError::InterpreterNotFound(
                    "no python3.x newer than the system default on CentOS Stream 8".to_string(),
                ));
            }
        }
    }

    let ver = settings.python.version_string();
    runner.run_checked(&dnf_install([format!("python{}-devel", ver)]))?;
    runner.run_checked(&dnf_install([format!("python{}-tkinter", ver)]))?;
    Ok(())
}

fn rhel_family(settings: &mut InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    println!("Doing prep/checks for RHEL-type distro...");

    check_for_pkg_mgr_cmd(runner, "dnf")?;
    runner.run_checked(&dnf_install(["epel-release"]))?;
    runner.run_checked(&CommandSpec::sudo("dnf").arg("makecache"))?;

    let major = settings.distro.major_version.as_str();
    if settings.distro.name != "centos" && major == "8" {
        runner.run_checked(&CommandSpec::sudo("/usr/bin/crb").arg("enable"))?;
        settings.python = probe_rhel8_python(runner)?;
    }

    if major == "9" {
        runner.run_checked(
            &CommandSpec::sudo("dnf").args(["config-manager", "--set-enabled", "crb"]),
        )?;
    }
    Ok(())
}

/// First candidate already installed or installable
fn probe_rhel8_python(runner: &mut dyn CommandRunner) -> Result<PythonInterpreter> {
    for candidate in RHEL8_PYTHON_CANDIDATES {
        let version = PythonInterpreter::parse_version(candidate)
            .ok_or_else(|| SetupError::general(format!("bad candidate version {}", candidate)))?;
        let interpreter = PythonInterpreter::new(PathBuf::from(format!("/usr/bin/python{}", candidate)), version);

        if runner.exists(&format!("python{}", candidate)) {
            return Ok(interpreter);
        }

        let install = dnf_install([
            format!("python{}", candidate),
            format!("python{}-devel", candidate),
            format!("python{}-tkinter", candidate),
        ]);
        match runner.run(&install) {
            Ok(output) if output.success => return Ok(interpreter),
            _ => println!("No match for potential Python version {}.", candidate),
        }
    }

    Err(SetupError::InterpreterNotFound(format!(
        "tried {}",
        RHEL8_PYTHON_CANDIDATES.join(", ")
    )))
}
