//! Native package installation
//!
//! Dispatches the resolved package list to the distro's package manager.
//! rpm-ostree and pacman get an installed-package pre-filter; the other
//! managers are idempotent on their own.

use crate::command_runner::{CommandRunner, CommandSpec};
use crate::console::{self, Tone};
use crate::distro::{self, PackageManagerFamily};
use crate::error::{Result, SetupError};
use crate::packages;
use crate::privilege;
use crate::quirks;
use crate::settings::InstallerSettings;

/// Fail unless `command` resolves on the search path
pub fn check_for_pkg_mgr_cmd(runner: &mut dyn CommandRunner, command: &str) -> Result<()> {
    privilege::call_attention_to_password_prompt(runner);
    if runner.exists(command) {
        Ok(())
    } else {
        Err(SetupError::PackageManagerMissing(command.to_string()))
    }
}

/// Installs package lists for one package manager family
pub struct NativePackageInstaller<'a> {
    runner: &'a mut dyn CommandRunner,
}

impl<'a> NativePackageInstaller<'a> {
    pub fn new(runner: &'a mut dyn CommandRunner) -> Self {
        Self { runner }
    }

    pub fn install(&mut self, family: PackageManagerFamily, packages: &[String]) -> Result<()> {
        check_for_pkg_mgr_cmd(self.runner, family.command())?;

        match family {
            PackageManagerFamily::RpmOstree => {
                println!("Distro is Fedora-type immutable. Using \"rpm-ostree\" instead of DNF.");
                let missing = self.not_installed(packages, "rpm", "-q")?;
                self.install_list(family, &missing)?;
            }
            PackageManagerFamily::Pacman => {
                let missing = self.not_installed(packages, "pacman", "-Q")?;
                self.install_list(family, &missing)?;
            }
            PackageManagerFamily::Eopkg => {
                let devel = CommandSpec::sudo("eopkg").args(["install", "-y", "-c", "system.devel"]);
                self.runner.run_checked(&devel)?;
                self.install_list(family, packages)?;
            }
            PackageManagerFamily::Dnf | PackageManagerFamily::Zypper | PackageManagerFamily::Apt => {
                self.install_list(family, packages)?;
            }
        }

        // Printed even when nothing needed installing
        println!("All necessary native distro packages are installed.");
        Ok(())
    }

    /// Packages the query command reports as not installed
    fn not_installed(&mut self, packages: &[String], query: &str, flag: &str) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for pkg in packages {
            let spec = CommandSpec::new(query).args([flag, pkg.as_str()]).capture();
            if self.runner.run(&spec)?.success {
                println!(
                    "{}",
                    console::fancy(&format!("Package '{}' is already installed. Skipping.", pkg), Tone::Green, false)
                );
            } else {
                missing.push(pkg.clone());
            }
        }
        Ok(missing)
    }

    fn install_list(&mut self, family: PackageManagerFamily, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            tracing::info!("No packages to install with {}", family.command());
            return Ok(());
        }

        privilege::call_attention_to_password_prompt(self.runner);
        let spec = CommandSpec::sudo(family.command())
            .args(family.install_prefix().iter().copied())
            .args(packages.iter().cloned());
        tracing::info!("Installing {} package(s) with {}", packages.len(), family);
        self.runner.run_checked(&spec)?;
        Ok(())
    }
}

/// Classify, resolve, run quirks, then install
pub fn install_distro_pkgs(settings: &mut InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    console::section("Installing native packages for this distro type...");

    let group = match settings.group {
        Some(group) => group,
        None => {
            let group = distro::classify(&settings.distro.name)?;
            settings.group = Some(group);
            group
        }
    };
    let family = group.family();
    tracing::info!("Distro '{}' is {} using {}", settings.distro.name, group, family);

    // Resolved from the probed host; quirks only affect later steps
    let packages = packages::resolve(
        group,
        &settings.distro.name,
        &settings.distro.major_version,
        settings.systemctl_present,
    );
    tracing::debug!("Resolved packages: {:?}", packages);

    for quirk in quirks::quirks_for(group, &settings.distro) {
        quirks::apply(quirk, settings, runner)?;
    }

    NativePackageInstaller::new(runner).install(family, &packages)?;
    console::task_completed();
    Ok(())
}
