//! The install sequence
//!
//! [`Installer`] runs every step in a fixed order against one
//! [`InstallerSettings`]. The first error stops the run; the stage it
//! happened in is recorded in [`InstallProgress`].

use crate::command_runner::{CommandRunner, CommandSpec};
use crate::console::{self, Tone};
use crate::deploy;
use crate::desktop;
use crate::distro;
use crate::environment::{self, EnvInfoSource};
use crate::error::{Result, SetupError};
use crate::install_state::{InstallProgress, InstallStage};
use crate::installer;
use crate::privilege;
use crate::prompt::{self, Prompter};
use crate::runtime;
use crate::sentinel::Sentinel;
use crate::settings::InstallerSettings;
use crate::system_setup::{self, GroupLookup, NameServiceGroups};
use crate::tweaks;
use rand::Rng;
use std::path::PathBuf;

const ISSUES_URL: &str = "https://github.com/RedBearAK/toshy/issues/";
const ASCII_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Four random ASCII letters
pub fn secret_code() -> String {
    let mut rng = rand::thread_rng();
    (0..4)
        .map(|_| ASCII_LETTERS[rng.gen_range(0..ASCII_LETTERS.len())] as char)
        .collect()
}

/// Make the user acknowledge an existing `~/.Xmodmap` by typing `code`
pub fn dot_xmodmap_warning(settings: &InstallerSettings, prompter: &mut dyn Prompter, code: &str) -> Result<()> {
    if !settings.paths.xmodmap().is_file() {
        return Ok(());
    }

    console::warning_box(&[
        "\t WARNING: You have an '.Xmodmap' file in your home folder!!!",
        "   This can cause confusing PROBLEMS if you are remapping any modifier keys!",
    ]);
    let answer = prompter.ask(&format!(
        "You must take responsibility for the issues an '.Xmodmap' file may cause.\
         \n\n\t If you understand, enter the secret code '{}': ",
        code
    ))?;

    if answer == code {
        println!();
        tracing::info!("User has taken responsibility for '.Xmodmap' file");
        println!("Good code. User has taken responsibility for '.Xmodmap' file. Proceeding...\n");
        Ok(())
    } else {
        println!();
        Err(SetupError::declined(
            "Code does not match! Try the installer again after dealing with '.Xmodmap'.",
        ))
    }
}

/// Only an explicit `y`/`Y` lets the install continue
pub fn ask_is_distro_updated(prompter: &mut dyn Prompter) -> Result<()> {
    println!();
    println!(
        "{}",
        console::fancy("(!!) NOTICE: It is ESSENTIAL to have your system completely updated.", Tone::Yellow, false)
    );
    println!();
    let answer = prompter.ask("Have you updated your system recently? [y/N]: ")?;
    if answer == "y" || answer == "Y" {
        Ok(())
    } else {
        println!();
        Err(SetupError::declined(
            "Try the installer again after you've done a full system update. Exiting.",
        ))
    }
}

/// Offer to put `~/.local/bin` on PATH. A yes leaves the fix-path marker
/// for the bin commands script.
pub fn ask_add_home_local_bin(settings: &InstallerSettings, prompter: &mut dyn Prompter) -> Result<()> {
    if settings.local_bin_on_path {
        return Ok(());
    }
    println!();
    if prompt::ask_yes_no(prompter, "The \"~/.local/bin\" folder is not in PATH. OK to add it? [Y/n]: ", true)? {
        Sentinel::FixPath.set(&settings.paths.runtime_dir)?;
    }
    Ok(())
}

/// Classify the detected distro, explaining the options when it is unknown
pub fn validate_distro(settings: &mut InstallerSettings) -> Result<()> {
    match distro::classify(&settings.distro.name) {
        Ok(group) => {
            settings.group = Some(group);
            Ok(())
        }
        Err(e) => {
            println!();
            console::problem(&format!(
                "ERROR: Installer does not know how to handle distro: \"{}\"",
                settings.distro.name
            ));
            println!("\nTry some options in \"toshy-setup --help\".\n");
            println!(
                "Maybe try one of these with \"--override-distro\" option:\n\n\t{}",
                distro::distro_index()
            );
            Err(e)
        }
    }
}

/// Runs the full install against one host
pub struct Installer<'a> {
    settings: &'a mut InstallerSettings,
    runner: &'a mut dyn CommandRunner,
    prompter: &'a mut dyn Prompter,
    source: &'a dyn EnvInfoSource,
    groups: Box<dyn GroupLookup + 'a>,
    progress: InstallProgress,
    backup: Option<PathBuf>,
}

impl<'a> Installer<'a> {
    pub fn new(
        settings: &'a mut InstallerSettings,
        runner: &'a mut dyn CommandRunner,
        prompter: &'a mut dyn Prompter,
        source: &'a dyn EnvInfoSource,
    ) -> Self {
        Self {
            settings,
            runner,
            prompter,
            source,
            groups: Box::new(NameServiceGroups),
            progress: InstallProgress::new(),
            backup: None,
        }
    }

    /// Replace the name service as the source of group information
    pub fn with_group_lookup(mut self, groups: impl GroupLookup + 'a) -> Self {
        self.groups = Box::new(groups);
        self
    }

    pub fn progress(&self) -> &InstallProgress {
        &self.progress
    }

    /// Run every stage; on error the stage is marked failed and the error
    /// returned unchanged
    pub fn run(&mut self) -> Result<()> {
        let result = self.run_stages();
        if let Err(e) = &result {
            let stage = self.progress.current_stage();
            let _ = self.progress.fail();
            tracing::error!(stage = %stage, "Install stopped: {}", e);
            if stage.touches_user_config() {
                if let Some(backup) = &self.backup {
                    println!("Your previous Toshy config folder is backed up at '{}'.", backup.display());
                }
            }
        }
        result
    }

    fn run_stages(&mut self) -> Result<()> {
        self.progress.transition_to(InstallStage::Acknowledgements)?;
        dot_xmodmap_warning(self.settings, self.prompter, &secret_code())?;
        ask_is_distro_updated(self.prompter)?;
        ask_add_home_local_bin(self.settings, self.prompter)?;

        self.progress.transition_to(InstallStage::ProbingEnvironment)?;
        environment::probe_environment(self.settings, self.source);
        validate_distro(self.settings)?;

        self.progress.transition_to(InstallStage::ElevatingPrivileges)?;
        privilege::elevate_privileges(self.runner)?;

        if self.settings.skip_native {
            self.progress.skip(InstallStage::NativePackages)?;
        } else {
            self.progress.transition_to(InstallStage::NativePackages)?;
            installer::install_distro_pkgs(self.settings, self.runner)?;
        }

        self.progress.transition_to(InstallStage::InputDevice)?;
        system_setup::load_uinput_module(self.settings, self.runner)?;
        system_setup::install_udev_rules(self.settings, self.runner)?;
        system_setup::verify_user_groups(self.settings, self.runner, self.groups.as_ref())?;

        self.progress.transition_to(InstallStage::CloningKeymapper)?;
        deploy::clone_keymapper_branch(self.settings, self.runner)?;

        self.progress.transition_to(InstallStage::BackingUpConfig)?;
        self.backup = deploy::backup_toshy_config(self.settings, self.prompter)?;

        self.progress.transition_to(InstallStage::DeployingFiles)?;
        deploy::install_toshy_files(self.settings)?;

        self.progress.transition_to(InstallStage::PythonEnvironment)?;
        runtime::setup_python_vir_env(self.settings, self.runner)?;
        runtime::install_pip_packages(self.settings, self.runner)?;

        self.progress.transition_to(InstallStage::DesktopIntegration)?;
        desktop::install_bin_commands(self.settings, self.runner)?;
        desktop::install_desktop_apps(self.settings, self.runner)?;
        // The D-Bus service script also does this; running it here picks up script changes
        if self.settings.is_kde() {
            desktop::setup_kwin2dbus_script(self.settings, self.runner);
        }
        desktop::setup_kde_dbus_service(self.settings)?;
        desktop::setup_systemd_services(self.settings, self.runner);
        desktop::autostart_tray_icon(self.settings)?;

        self.progress.transition_to(InstallStage::DesktopTweaks)?;
        tweaks::apply_desktop_tweaks(self.settings, self.runner)?;

        self.progress.transition_to(InstallStage::Finishing)?;
        if self.settings.is_gnome() {
            desktop::check_gnome_tray_extension(self.runner);
        }
        finish_install(self.settings, self.runner)?;

        self.progress.transition_to(InstallStage::Completed)?;
        Ok(())
    }
}

fn closing_lines(lines: &[&str]) {
    for line in lines {
        println!("==  {}", line);
    }
    let sep = console::separator();
    println!("{sep}\n{sep}\n");
}

/// Reboot notice, or start the tray app right away
pub fn finish_install(settings: &mut InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    if settings.should_reboot || Sentinel::Reboot.exists(&settings.paths.runtime_dir) {
        // Marker stays for reruns before the reboot
        settings.request_reboot();
        console::reboot_banner();
        closing_lines(&[
            "Toshy install complete. Report issues on the GitHub repo.",
            ISSUES_URL,
            ">>  ALERT: Permissions changed. You MUST reboot for Toshy to work.",
        ]);
    } else {
        let tray = settings.paths.local_bin.join("toshy-tray");
        if let Err(e) = runner.spawn_detached(&CommandSpec::new(tray.display().to_string())) {
            tracing::warn!("Could not start the tray icon: {}", e);
        }
        let sep = console::separator();
        println!("\n\n\n{sep}\n{sep}");
        closing_lines(&[
            "Toshy install complete. Rebooting should not be necessary.",
            "Report issues on the GitHub repo.",
            ISSUES_URL,
        ]);
        if settings.is_wayland() && settings.is_kde() {
            println!("Switch to a different window ONCE to get KWin script to start working!");
        }
    }

    if settings.remind_extensions || (settings.is_gnome() && settings.is_wayland()) {
        println!("You MUST install GNOME EXTENSIONS if using Wayland+GNOME! See Toshy README.");
    }
    Ok(())
}

/// `--apply-tweaks`
pub fn run_apply_tweaks(
    settings: &mut InstallerSettings,
    runner: &mut dyn CommandRunner,
    source: &dyn EnvInfoSource,
) -> Result<()> {
    environment::probe_environment(settings, source);
    tweaks::apply_desktop_tweaks(settings, runner)?;
    if settings.should_reboot {
        console::reboot_banner();
        closing_lines(&[
            "Tweaks application complete. Report issues on the GitHub repo.",
            ISSUES_URL,
            ">>  ALERT: Something odd happened. You should probably reboot.",
        ]);
    }
    Ok(())
}

/// `--remove-tweaks`
pub fn run_remove_tweaks(
    settings: &mut InstallerSettings,
    runner: &mut dyn CommandRunner,
    source: &dyn EnvInfoSource,
) -> Result<()> {
    environment::probe_environment(settings, source);
    tweaks::remove_desktop_tweaks(settings, runner)
}
