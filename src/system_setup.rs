//! Device access for the keymapper
//!
//! The keymapper needs the `uinput` module loaded at boot, a udev rule
//! giving the `input` group access to input devices, and the user in that
//! group. Group membership and failed udev reloads only take effect after a
//! reboot, so they raise the reboot flag instead of failing.

use crate::command_runner::{CommandRunner, CommandSpec};
use crate::console;
use crate::distro::DistroGroup;
use crate::error::{Result, SetupError};
use crate::privilege::call_attention_to_password_prompt;
use crate::settings::{INPUT_GROUP, InstallerSettings};
use std::fs;
use std::path::{Path, PathBuf};

/// `sudo tee [-a] <path>` fed with `content`, output discarded
fn sudo_write(path: &Path, content: &str, append: bool) -> CommandSpec {
    let mut spec = CommandSpec::sudo("tee");
    if append {
        spec = spec.arg("-a");
    }
    spec.arg(path.display().to_string()).stdin_data(content).silent()
}

// ============================================================================
// uinput kernel module
// ============================================================================

pub fn load_uinput_module(settings: &InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    console::section("Checking status of \"uinput\" kernel module...");

    let lsmod = runner.run(&CommandSpec::new("lsmod").capture())?;
    let loaded = lsmod
        .stdout
        .lines()
        .any(|line| line.split_whitespace().next() == Some("uinput"));

    if loaded {
        println!("The \"uinput\" module is already loaded.");
    } else {
        println!("The \"uinput\" module is not loaded, loading now...");
        call_attention_to_password_prompt(runner);
        runner.run_checked(&CommandSpec::sudo("modprobe").arg("uinput"))?;
    }

    persist_uinput_module(settings, runner)?;
    console::task_completed();
    Ok(())
}

/// Load `uinput` at boot via modules-load.d, or `/etc/modules` without it
fn persist_uinput_module(settings: &InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    let system = &settings.system;

    if system.modules_load_dir.is_dir() {
        let conf = system.modules_load_dir.join("uinput.conf");
        if !conf.exists() {
            call_attention_to_password_prompt(runner);
            runner.run_checked(&sudo_write(&conf, "uinput\n", false))?;
            tracing::info!("Created {}", conf.display());
        }
    } else if system.modules_file.is_file() {
        let current = fs::read_to_string(&system.modules_file)?;
        if !current.contains("uinput") {
            call_attention_to_password_prompt(runner);
            runner.run_checked(&sudo_write(&system.modules_file, "uinput\n", true))?;
            tracing::info!("Appended uinput to {}", system.modules_file.display());
        }
    }
    Ok(())
}

// ============================================================================
// udev rules
// ============================================================================

/// Rules file content, with the ACL rule when `setfacl` is available
pub fn udev_rule_content(setfacl: Option<&Path>) -> String {
    let acl_rule = setfacl
        .map(|path| format!(", RUN+=\"{} -m g::rw /dev/uinput\"", path.display()))
        .unwrap_or_default();
    format!(
        "SUBSYSTEM==\"input\", GROUP=\"input\"\n\
         KERNEL==\"uinput\", SUBSYSTEM==\"misc\", GROUP=\"input\", MODE=\"0660\"{}\n",
        acl_rule
    )
}

pub fn install_udev_rules(settings: &mut InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    console::section("Installing \"udev\" rules file for keymapper...");

    let rules_file = settings.system.udev_rules_file.clone();
    let content = udev_rule_content(runner.which("setfacl").as_deref());
    let current = fs::read_to_string(&rules_file).ok();

    if current.as_deref() == Some(content.as_str()) {
        println!("Correct \"udev\" rules already in place.");
    } else {
        call_attention_to_password_prompt(runner);
        println!("Using these \"udev\" rules for \"uinput\" device:\n\n{}", content);
        runner.run_checked(&sudo_write(&rules_file, &content, false))?;
        println!("Toshy \"udev\" rules file successfully installed.");
        reload_udev_rules(settings, runner);
    }

    console::task_completed();
    Ok(())
}

/// Reload and trigger udev. Failure means the rules apply after reboot.
pub fn reload_udev_rules(settings: &mut InstallerSettings, runner: &mut dyn CommandRunner) {
    call_attention_to_password_prompt(runner);
    let reload = CommandSpec::sudo("udevadm").args(["control", "--reload-rules"]);
    let trigger = CommandSpec::sudo("udevadm").arg("trigger");

    let result = runner
        .run_checked(&reload)
        .and_then(|_| runner.run_checked(&trigger));
    match result {
        Ok(_) => println!("Reloaded the \"udev\" rules successfully."),
        Err(e) => {
            println!("Failed to reload \"udev\" rules:\n\t{}", e);
            settings.request_reboot();
        }
    }
}

// ============================================================================
// input group
// ============================================================================

/// Source of group existence and membership
pub trait GroupLookup {
    /// Members of `group`, or None if the group does not exist
    fn members(&self, group: &str) -> Option<Vec<String>>;
}

/// The system name service, so groups from systemd-userdb, sssd, LDAP or
/// `/usr/lib/group` are found as well as those in `/etc/group`
#[derive(Debug, Default, Clone, Copy)]
pub struct NameServiceGroups;

impl GroupLookup for NameServiceGroups {
    fn members(&self, group: &str) -> Option<Vec<String>> {
        match nix::unistd::Group::from_name(group) {
            Ok(found) => found.map(|g| g.mem),
            Err(e) => {
                tracing::warn!("Group lookup for \"{}\" failed: {}", group, e);
                None
            }
        }
    }
}

/// A group(5) file read directly
#[derive(Debug, Clone)]
pub struct GroupFile(pub PathBuf);

impl GroupLookup for GroupFile {
    fn members(&self, group: &str) -> Option<Vec<String>> {
        group_members(&self.0, group)
    }
}

/// Members of `group` in a group(5) file, or None if the group is absent
pub fn group_members(group_file: &Path, group: &str) -> Option<Vec<String>> {
    let data = fs::read_to_string(group_file).ok()?;
    data.lines().find_map(|line| {
        let mut fields = line.split(':');
        if fields.next()? != group {
            return None;
        }
        let members = fields.nth(2).unwrap_or("");
        Some(
            members
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect(),
        )
    })
}

fn create_group(
    settings: &InstallerSettings,
    runner: &mut dyn CommandRunner,
    groups: &dyn GroupLookup,
    group: &str,
) -> Result<()> {
    if groups.members(group).is_some() {
        println!("Group \"{}\" already exists.", group);
        return Ok(());
    }

    println!("Creating \"{}\" group...", group);
    call_attention_to_password_prompt(runner);

    if settings.group == Some(DistroGroup::FedoraImmutables) {
        // Immutable Fedora ships the group in /usr/lib/group only; usermod
        // fails until the line is copied to /etc/group.
        let lib_groups = fs::read_to_string(&settings.system.lib_group_file)?;
        let prefix = format!("{}:", group);
        let line = lib_groups
            .lines()
            .find(|l| l.starts_with(&prefix))
            .ok_or_else(|| {
                SetupError::validation(format!(
                    "group \"{}\" not found in {}",
                    group,
                    settings.system.lib_group_file.display()
                ))
            })?;
        runner.run_checked(&sudo_write(&settings.system.group_file, &format!("{}\n", line), true))?;
        println!("Added '{}' group to system.", group);
    } else {
        runner.run_checked(&CommandSpec::sudo("groupadd").arg(group))?;
        println!("Group \"{}\" created successfully.", group);
    }
    Ok(())
}

pub fn verify_user_groups(
    settings: &mut InstallerSettings,
    runner: &mut dyn CommandRunner,
    groups: &dyn GroupLookup,
) -> Result<()> {
    console::section("Checking if user is in \"input\" group...");
    create_group(settings, runner, groups, INPUT_GROUP)?;

    let members = groups.members(INPUT_GROUP).unwrap_or_default();
    if members.iter().any(|m| m == &settings.user_name) {
        println!(
            "User \"{}\" is a member of group \"{}\".",
            settings.user_name, INPUT_GROUP
        );
    } else {
        call_attention_to_password_prompt(runner);
        runner.run_checked(
            &CommandSpec::sudo("usermod").args(["-aG", INPUT_GROUP, settings.user_name.as_str()]),
        )?;
        println!(
            "User \"{}\" added to group \"{}\".",
            settings.user_name, INPUT_GROUP
        );
        settings.request_reboot();
    }

    console::task_completed();
    Ok(())
}
