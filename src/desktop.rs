//! Desktop integrations
//!
//! Terminal commands, launcher entries, the KWin script and D-Bus service
//! pieces on KDE, systemd units and the tray autostart entry. The helper
//! shell scripts shipped in the config folder do the per-file work; this
//! module runs them in order and fixes up what they leave behind.

use crate::command_runner::{CommandRunner, CommandSpec};
use crate::console;
use crate::error::{Result, SetupError};
use crate::settings::InstallerSettings;
use std::fs;
use std::io;
use std::path::Path;

pub const KWIN_SCRIPT_NAME: &str = "toshy-dbus-notifyactivewindow";
pub const TRAY_DESKTOP_FILE: &str = "Toshy_Tray.desktop";
pub const GUI_DESKTOP_FILE: &str = "Toshy_GUI.desktop";
pub const KDE_DBUS_DESKTOP_FILE: &str = "Toshy_KDE_DBus_Service.desktop";
pub const APPINDICATOR_UUID: &str = "appindicatorsupport@rgcjonas.gmail.com";

/// Ask KWin to reread its config. Failure is reported, never fatal.
pub fn kwin_reconfigure(settings: &InstallerSettings, runner: &mut dyn CommandRunner) {
    let spec = CommandSpec::new(settings.qdbus.as_str())
        .args(["org.kde.KWin", "/KWin", "reconfigure"])
        .silent();
    if !runner.run_logged(&spec) {
        console::problem("Error while running KWin reconfigure.");
    }
}

/// Replace every literal `$HOME` in `path` with the user's home folder
pub fn replace_home_in_file(path: &Path, home: &Path) -> io::Result<()> {
    let data = fs::read_to_string(path)?;
    fs::write(path, data.replace("$HOME", &home.display().to_string()))
}

fn run_helper_script(settings: &InstallerSettings, runner: &mut dyn CommandRunner, relative: &str) -> Result<()> {
    let script = settings.paths.toshy_dir.join(relative);
    runner.run_checked(&CommandSpec::new(script.display().to_string()))?;
    Ok(())
}

/// Symlinks for the `toshy-*` terminal commands
pub fn install_bin_commands(settings: &InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    console::section("Installing Toshy terminal commands...");
    if let Err(e) = run_helper_script(settings, runner, "scripts/toshy-bincommands-setup.sh") {
        println!();
        console::problem(&format!("Problem while installing terminal commands:\n\t{}", e));
        return Err(e);
    }
    console::task_completed();
    Ok(())
}

/// Launcher entries for the tray and preferences apps
pub fn install_desktop_apps(settings: &InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    console::section("Installing Toshy desktop apps...");
    if let Err(e) = run_helper_script(settings, runner, "scripts/toshy-desktopapps-setup.sh") {
        println!();
        console::problem(&format!("Problem installing Toshy desktop apps:\n\t{}", e));
        return Err(e);
    }

    let apps = settings.paths.applications_dir();
    for file in [TRAY_DESKTOP_FILE, GUI_DESKTOP_FILE] {
        replace_home_in_file(&apps.join(file), &settings.paths.home)?;
    }
    console::task_completed();
    Ok(())
}

/// Install and enable the KWin script that reports window focus changes
pub fn setup_kwin2dbus_script(settings: &InstallerSettings, runner: &mut dyn CommandRunner) {
    console::section("Setting up the Toshy KWin script...");
    if !runner.exists("kpackagetool5") || !runner.exists("kwriteconfig5") {
        println!("One or more KDE CLI tools not found. Assuming older KDE...");
        return;
    }

    let script_dir = settings
        .paths
        .toshy_dir
        .join("kde-kwin-dbus-service")
        .join(KWIN_SCRIPT_NAME);

    let remove = CommandSpec::new("kpackagetool5")
        .args(["-t", "KWin/Script", "-r", KWIN_SCRIPT_NAME])
        .capture();
    if runner.run(&remove).is_ok_and(|out| out.success) {
        println!("Successfully removed existing KWin script.");
    }

    // Installed straight from the script folder, not from a zipped
    // `.kwinscript` package; kpackagetool accepts either
    let install = CommandSpec::new("kpackagetool5")
        .args(["-t", "KWin/Script", "-i"])
        .arg(script_dir.display().to_string())
        .capture();
    match runner.run_checked(&install) {
        Ok(_) => println!("Successfully installed the KWin script."),
        Err(e) => console::problem(&format!("Error installing the KWin script. The error was:\n\t{}", e)),
    }

    let enable = CommandSpec::new("kwriteconfig5")
        .args(["--file", "kwinrc", "--group", "Plugins", "--key"])
        .arg(format!("{}Enabled", KWIN_SCRIPT_NAME))
        .arg("true")
        .capture();
    match runner.run_checked(&enable) {
        Ok(_) => println!("Successfully enabled the KWin script."),
        Err(e) => console::problem(&format!("Error enabling the KWin script. The error was:\n\t{}", e)),
    }

    kwin_reconfigure(settings, runner);
    console::task_completed();
}

/// Prepare the D-Bus service folders and drop the old autostart entry.
/// The service itself is started by systemd or on demand.
pub fn setup_kde_dbus_service(settings: &InstallerSettings) -> Result<()> {
    console::section("Setting up the Toshy KDE D-Bus service...");
    let paths = &settings.paths;

    let desktop_file = paths.toshy_dir.join("desktop").join(KDE_DBUS_DESKTOP_FILE);
    if let Err(e) = replace_home_in_file(&desktop_file, &paths.home) {
        tracing::warn!("Could not update {}: {}", desktop_file.display(), e);
    }

    let dbus_services = paths.home.join(".local/share/dbus-1/services");
    for dir in [dbus_services, paths.autostart_dir()] {
        fs::create_dir_all(&dir).map_err(|e| {
            SetupError::general(format!(
                "Problem trying to make sure '{}' is a directory:\n\t{}",
                dir.display(),
                e
            ))
        })?;
    }

    let old_autostart = paths.autostart_dir().join(KDE_DBUS_DESKTOP_FILE);
    if old_autostart.is_file() {
        match fs::remove_file(&old_autostart) {
            Ok(()) => println!("Removed older KDE D-Bus desktop entry autostart."),
            Err(e) => tracing::debug!("Problem removing old D-Bus service desktop entry autostart: {}", e),
        }
    }

    println!("Toshy KDE D-Bus service should automatically start when needed.");
    console::task_completed();
    Ok(())
}

/// Run the systemd setup script when the host manages services with systemd
pub fn setup_systemd_services(settings: &InstallerSettings, runner: &mut dyn CommandRunner) {
    console::section("Setting up the Toshy systemd services...");
    if settings.uses_systemd_services() {
        let script = settings.paths.toshy_dir.join("scripts/bin/toshy-systemd-setup.sh");
        runner.run_logged(&CommandSpec::new(script.display().to_string()));
        println!("Finished setting up Toshy systemd services.");
    } else {
        println!("System does not seem to be using \"systemd\" as init system.");
    }
    console::task_completed();
}

/// Link the tray launcher into `~/.config/autostart`
pub fn autostart_tray_icon(settings: &InstallerSettings) -> Result<()> {
    console::section("Setting up tray icon to load automatically at login...");
    let autostart = settings.paths.autostart_dir();
    fs::create_dir_all(&autostart).map_err(|e| {
        SetupError::general(format!(
            "Problem trying to make sure '{}' is directory.\n\t{}",
            autostart.display(),
            e
        ))
    })?;

    let target = settings.paths.applications_dir().join(TRAY_DESKTOP_FILE);
    let link = autostart.join(TRAY_DESKTOP_FILE);
    if link.symlink_metadata().is_ok() {
        fs::remove_file(&link)?;
    }
    std::os::unix::fs::symlink(&target, &link)?;

    println!("Toshy tray icon should appear in system tray at each login.");
    console::task_completed();
    Ok(())
}

/// Parse `gsettings get org.gnome.shell enabled-extensions` output
pub fn parse_extension_list(output: &str) -> Vec<String> {
    output
        .trim()
        .trim_start_matches("@as")
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|item| item.trim().trim_matches('\'').to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Whether GNOME Shell has `uuid` enabled
pub fn is_extension_enabled(runner: &mut dyn CommandRunner, uuid: &str) -> bool {
    let spec = CommandSpec::new("gsettings")
        .args(["get", "org.gnome.shell", "enabled-extensions"])
        .capture();
    match runner.run_checked(&spec) {
        Ok(out) => parse_extension_list(&out.stdout).iter().any(|ext| ext == uuid),
        Err(e) => {
            console::problem(&format!("Unable to check enabled extensions:\n\t{}", e));
            false
        }
    }
}

/// Tell GNOME users whether the tray icon has an extension to live in
pub fn check_gnome_tray_extension(runner: &mut dyn CommandRunner) {
    println!();
    if is_extension_enabled(runner, APPINDICATOR_UUID) {
        println!("AppIndicator extension is enabled. Tray icon should work.");
    } else {
        println!();
        println!(
            "{}",
            console::fancy(
                "(!!) RECOMMENDATION: Install 'AppIndicator' GNOME extension\n\
                 Easiest method: 'flatpak install extensionmanager', search for 'appindicator'\n",
                console::Tone::Yellow,
                false,
            )
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::RecordingRunner;
    use crate::environment::InitSystem;
    use crate::settings::SetupPaths;
    use tempfile::TempDir;

    fn settings_in(root: &TempDir) -> InstallerSettings {
        let home = root.path().join("home");
        fs::create_dir_all(&home).unwrap();
        let mut runner = RecordingRunner::new();
        InstallerSettings::new(SetupPaths::new(&home, root.path(), root.path()), "alice", &mut runner)
    }

    #[test]
    fn test_replace_home_in_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("x.desktop");
        fs::write(&file, "Exec=$HOME/.local/bin/toshy-tray\nIcon=$HOME/i.svg\n").unwrap();

        replace_home_in_file(&file, Path::new("/home/alice")).unwrap();

        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "Exec=/home/alice/.local/bin/toshy-tray\nIcon=/home/alice/i.svg\n"
        );
    }

    #[test]
    fn test_desktop_apps_script_failure_is_fatal() {
        let root = TempDir::new().unwrap();
        let settings = settings_in(&root);
        let mut runner = RecordingRunner::new();
        let script = settings.paths.toshy_dir.join("scripts/toshy-desktopapps-setup.sh");
        runner.respond(&script.display().to_string(), 2, "");

        assert!(install_desktop_apps(&settings, &mut runner).is_err());
    }

    #[test]
    fn test_desktop_apps_expand_home() {
        let root = TempDir::new().unwrap();
        let settings = settings_in(&root);
        let apps = settings.paths.applications_dir();
        fs::create_dir_all(&apps).unwrap();
        fs::write(apps.join(TRAY_DESKTOP_FILE), "Exec=$HOME/tray").unwrap();
        fs::write(apps.join(GUI_DESKTOP_FILE), "Exec=$HOME/gui").unwrap();
        let mut runner = RecordingRunner::new();

        install_desktop_apps(&settings, &mut runner).unwrap();

        let home = settings.paths.home.display().to_string();
        assert_eq!(
            fs::read_to_string(apps.join(TRAY_DESKTOP_FILE)).unwrap(),
            format!("Exec={}/tray", home)
        );
    }

    #[test]
    fn test_kwin_script_skipped_without_kde_tools() {
        let root = TempDir::new().unwrap();
        let settings = settings_in(&root);
        let mut runner = RecordingRunner::with_programs(&["kpackagetool5"]);
        setup_kwin2dbus_script(&settings, &mut runner);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_kwin_script_install_sequence() {
        let root = TempDir::new().unwrap();
        let settings = settings_in(&root);
        let mut runner = RecordingRunner::with_programs(&["kpackagetool5", "kwriteconfig5"]);
        runner.respond("kpackagetool5 -t KWin/Script -r", 1, "");

        setup_kwin2dbus_script(&settings, &mut runner);

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("kpackagetool5 -t KWin/Script -i "));
        assert!(lines[1].ends_with("kde-kwin-dbus-service/toshy-dbus-notifyactivewindow"));
        assert_eq!(
            lines[2],
            "kwriteconfig5 --file kwinrc --group Plugins --key toshy-dbus-notifyactivewindowEnabled true"
        );
        assert_eq!(lines[3], "qdbus org.kde.KWin /KWin reconfigure");
    }

    #[test]
    fn test_kde_dbus_service_removes_old_autostart() {
        let root = TempDir::new().unwrap();
        let settings = settings_in(&root);
        let autostart = settings.paths.autostart_dir();
        fs::create_dir_all(&autostart).unwrap();
        fs::write(autostart.join(KDE_DBUS_DESKTOP_FILE), "").unwrap();

        setup_kde_dbus_service(&settings).unwrap();

        assert!(!autostart.join(KDE_DBUS_DESKTOP_FILE).exists());
        assert!(settings.paths.home.join(".local/share/dbus-1/services").is_dir());
    }

    #[test]
    fn test_systemd_services_need_systemd_init() {
        let root = TempDir::new().unwrap();
        let mut settings = settings_in(&root);
        settings.systemctl_present = true;
        let mut runner = RecordingRunner::new();

        setup_systemd_services(&settings, &mut runner);
        assert!(runner.calls().is_empty());

        settings.init_system = InitSystem::Systemd;
        setup_systemd_services(&settings, &mut runner);
        assert!(runner.command_lines()[0].ends_with("scripts/bin/toshy-systemd-setup.sh"));
    }

    #[test]
    fn test_tray_autostart_link_is_replaced() {
        let root = TempDir::new().unwrap();
        let settings = settings_in(&root);

        autostart_tray_icon(&settings).unwrap();
        autostart_tray_icon(&settings).unwrap();

        let link = settings.paths.autostart_dir().join(TRAY_DESKTOP_FILE);
        assert_eq!(
            fs::read_link(&link).unwrap(),
            settings.paths.applications_dir().join(TRAY_DESKTOP_FILE)
        );
    }

    #[test]
    fn test_parse_extension_list() {
        let out = "['appindicatorsupport@rgcjonas.gmail.com', 'dash-to-dock@micxgx.gmail.com']\n";
        assert_eq!(
            parse_extension_list(out),
            vec!["appindicatorsupport@rgcjonas.gmail.com", "dash-to-dock@micxgx.gmail.com"]
        );
        assert!(parse_extension_list("@as []").is_empty());
    }

    #[test]
    fn test_extension_check_uses_gsettings() {
        let mut runner = RecordingRunner::new();
        runner.respond("gsettings get org.gnome.shell", 0, "['appindicatorsupport@rgcjonas.gmail.com']");
        assert!(is_extension_enabled(&mut runner, APPINDICATOR_UUID));

        let mut runner = RecordingRunner::new();
        runner.respond("gsettings get", 1, "");
        assert!(!is_extension_enabled(&mut runner, APPINDICATOR_UUID));
    }
}
