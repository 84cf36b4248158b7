//! Removal of an installed Toshy setup
//!
//! Every step is best effort: problems are reported and the removal keeps
//! going. The user's config folder is left in place.

use crate::command_runner::{CommandRunner, CommandSpec};
use crate::console;
use crate::desktop::{KDE_DBUS_DESKTOP_FILE, KWIN_SCRIPT_NAME, TRAY_DESKTOP_FILE};
use crate::environment::{self, EnvInfoSource};
use crate::error::{Result, SetupError};
use crate::privilege;
use crate::prompt::{self, Prompter};
use crate::settings::InstallerSettings;
use crate::system_setup;
use crate::tweaks;
use std::path::Path;

fn path_spec(path: &Path) -> CommandSpec {
    CommandSpec::new(path.display().to_string())
}

fn report(runner: &mut dyn CommandRunner, spec: &CommandSpec, what: &str) {
    if let Err(e) = runner.run_checked(spec) {
        console::problem(&format!("Problem {}:\n\t{}", what, e));
    }
}

fn pkill(settings: &InstallerSettings, pattern: &str) -> CommandSpec {
    CommandSpec::new("pkill").args(["-u", settings.user_name.as_str(), "-f", pattern])
}

/// Confirm, then take down services, launchers, commands and (optionally)
/// the udev rules
pub fn uninstall_toshy(
    settings: &mut InstallerSettings,
    runner: &mut dyn CommandRunner,
    prompter: &mut dyn Prompter,
    source: &dyn EnvInfoSource,
) -> Result<()> {
    console::section("Uninstalling Toshy...");

    let answer = prompter.ask("\nThis will completely uninstall Toshy. Are you sure? [y/N]: ")?;
    if answer != "y" && answer != "Y" {
        return Err(SetupError::declined_cleanly("Toshy uninstall cancelled."));
    }
    println!("\nToshy uninstall proceeding...\n");

    environment::probe_environment(settings, source);
    tweaks::remove_desktop_tweaks(settings, runner)?;

    let local_bin = settings.paths.local_bin.clone();
    let toshy_dir = settings.paths.toshy_dir.clone();

    runner.run_logged(&path_spec(&local_bin.join("toshy-config-stop")));

    if settings.uses_systemd_services() {
        runner.run_logged(&path_spec(&local_bin.join("toshy-services-stop")));
        runner.run_logged(&path_spec(&toshy_dir.join("scripts/bin/toshy-systemd-remove.sh")));
    } else {
        println!("System does not seem to be using \"systemd\". Skipping removal of services.");
    }

    if settings.is_kde() {
        let remove_script = CommandSpec::new("kpackagetool5").args(["-t", "KWin/Script", "-r", KWIN_SCRIPT_NAME]);
        match runner.run_checked(&remove_script) {
            Ok(_) => println!("Successfully removed the KWin script."),
            Err(e) => console::problem(&format!(
                "Problem removing Toshy KWin script {}:\n\t{}",
                KWIN_SCRIPT_NAME, e
            )),
        }
        report(
            runner,
            &pkill(settings, "toshy_kde_dbus_service"),
            "terminating Toshy KDE D-Bus service script",
        );
    }

    let autostart = settings.paths.autostart_dir();
    report(
        runner,
        &CommandSpec::new("rm").arg("-f").arg(autostart.join(KDE_DBUS_DESKTOP_FILE).display().to_string()),
        "removing Toshy KDE D-Bus service autostart",
    );

    if let Err(e) = runner.run_checked(&pkill(settings, "toshy_tray")) {
        println!("Problem stopping the tray icon process:\n\t{}", e);
    }
    report(
        runner,
        &CommandSpec::new("rm").arg("-f").arg(autostart.join(TRAY_DESKTOP_FILE).display().to_string()),
        "removing Toshy tray icon autostart",
    );

    report(
        runner,
        &path_spec(&toshy_dir.join("scripts/toshy-desktopapps-remove.sh")),
        "removing Toshy desktop apps",
    );
    report(
        runner,
        &path_spec(&toshy_dir.join("scripts/toshy-bincommands-remove.sh")),
        "removing Toshy bin commands apps",
    );

    if prompt::ask_yes_no(prompter, "Remove the Toshy \"udev/uinput\" rules file? [y/N]: ", false)? {
        privilege::elevate_privileges(runner)?;
        let rules = settings.system.udev_rules_file.display().to_string();
        report(
            runner,
            &CommandSpec::sudo("rm").args(["-f".to_string(), rules]),
            "removing Toshy udev rules file",
        );
        system_setup::reload_udev_rules(settings, runner);
    }

    println!("\n\n{}", console::separator());
    println!("Toshy uninstall complete. Reboot if indicated above with ASCII banner.");
    println!("The '~/.config/toshy' folder with your settings has NOT been removed.");
    println!("Please report any problems or leftover files/commands on the GitHub repo:");
    println!("https://github.com/RedBearAK/toshy/issues/");
    println!("{}\n", console::separator());
    Ok(())
}
