//! Desktop environment tweaks
//!
//! Small settings changes that make GNOME and KDE Plasma behave better with
//! Mac-style shortcuts, plus the optional "fancy-pants" extras.

use crate::command_runner::{CommandRunner, CommandSpec};
use crate::console;
use crate::desktop::kwin_reconfigure;
use crate::error::{Result, SetupError};
use crate::settings::InstallerSettings;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SWITCHER_REPO: &str = "https://github.com/RedBearAK/kwin-application-switcher.git";
pub const SWITCHER_BRANCH: &str = "grouping_fix";
pub const SWITCHER_DIR_NAME: &str = "kwin-application-switcher";
const SWITCHER_TITLE: &str = "KWin Application Switcher";

pub const FONT_FILE: &str = "FantasqueSansMono-LargeLineHeight-NoLoopK-NameSuffix.zip";
pub const FONT_URL: &str = "https://github.com/spinda/fantasque-sans-ligatures/releases/download/v1.8.1";

fn kwriteconfig(file: &str, group: &str, key: &str, value: Option<&str>) -> CommandSpec {
    let spec = CommandSpec::new("kwriteconfig5").args(["--file", file, "--group", group, "--key", key]);
    match value {
        Some(value) => spec.arg(value),
        None => spec.arg("--delete"),
    }
}

// ============================================================================
// GNOME
// ============================================================================

pub fn apply_tweaks_gnome(runner: &mut dyn CommandRunner) {
    runner.run_logged(&CommandSpec::new("gsettings").args(["set", "org.gnome.mutter", "overlay-key", ""]));
    println!("Disabled Super key opening the GNOME overview. (Use Cmd+Space instead.)");

    runner.run_logged(&CommandSpec::new("gsettings").args([
        "set",
        "org.gnome.Terminal.Legacy.Keybindings:/org/gnome/terminal/legacy/keybindings/",
        "preferences",
        "<Control>comma",
    ]));
    println!("Set a keybinding for GNOME Terminal preferences.");

    runner.run_logged(&CommandSpec::new("dconf").args(["write", "/org/gnome/nautilus/list-view/use-tree-view", "true"]));
    runner.run_logged(&CommandSpec::new("dconf").args([
        "write",
        "/org/gnome/nautilus/preferences/default-folder-viewer",
        "'list-view'",
    ]));
    println!("Set Nautilus default to \"List\" view with \"Expandable folders\" enabled.");
}

pub fn remove_tweaks_gnome(runner: &mut dyn CommandRunner) {
    runner.run_logged(&CommandSpec::new("gsettings").args(["reset", "org.gnome.mutter", "overlay-key"]));
    println!("Removed tweak to disable GNOME \"overlay-key\" binding to Meta/Super.");

    for binding in ["switch-applications", "switch-group"] {
        runner.run_logged(&CommandSpec::new("gsettings").args(["reset", "org.gnome.desktop.wm.keybindings", binding]));
    }
    println!("Removed tweak to enable more Mac-like task switching");
}

// ============================================================================
// KDE Plasma
// ============================================================================

pub fn apply_tweaks_kde(settings: &InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    if !runner.exists("kwriteconfig5") {
        println!("KDE 5.x tools not present. Skipping KDE tweaks.");
        return Ok(());
    }

    runner.run_checked(&kwriteconfig("kwinrc", "ModifierOnlyShortcuts", "Meta", Some("")))?;
    println!("Disabled Meta key opening application menu. (Use Cmd+Space instead.)");
    kwin_reconfigure(settings, runner);

    if settings.fancy_pants {
        install_application_switcher(settings, runner);
        kwin_reconfigure(settings, runner);

        runner.run_checked(&kwriteconfig("kwinrc", "TabBox", "LayoutName", Some("big_icons")))?;
        println!("Set task switcher style to: \"Large Icons\"");
        runner.run_checked(&kwriteconfig("kwinrc", "TabBox", "HighlightWindows", Some("false")))?;
        println!("Disabled task switcher option: \"Show selected window\"");
        runner.run_checked(&kwriteconfig("kwinrc", "TabBox", "ApplicationsMode", Some("1")))?;
        println!("Enabled task switcher option: \"Only one window per application\"");
        kwin_reconfigure(settings, runner);

        runner.run_checked(&kwriteconfig("kdeglobals", "KDE", "SingleClick", Some("false")))?;
        println!("Disabled single-click to open/launch files/folders");
        restart_plasmashell(runner);
    }
    Ok(())
}

/// Clone and install the grouping application switcher. Problems are
/// warnings only.
fn install_application_switcher(settings: &InstallerSettings, runner: &mut dyn CommandRunner) {
    println!("Installing \"Application Switcher\" KWin script...");
    if !runner.exists("git") {
        console::problem(&format!("Unable to clone {}. Install 'git' and try again.", SWITCHER_TITLE));
        return;
    }

    let switcher_dir = settings.paths.source_dir.join(SWITCHER_DIR_NAME);
    if switcher_dir.exists() {
        if let Err(e) = fs::remove_dir_all(&switcher_dir) {
            tracing::warn!("Problem removing existing switcher clone folder: {}", e);
        }
    }

    let clone = CommandSpec::new("git")
        .args(["clone", "--branch", SWITCHER_BRANCH, SWITCHER_REPO])
        .arg(switcher_dir.display().to_string());
    if !runner.run_logged(&clone) {
        tracing::warn!("Unable to install {}. Clone did not succeed.", SWITCHER_TITLE);
        return;
    }

    let install = CommandSpec::new("./install.sh").current_dir(&switcher_dir).silent();
    if runner.run_logged(&install) {
        println!("Installed \"{}\" KWin script.", SWITCHER_TITLE);
    } else {
        tracing::warn!("Something went wrong installing {}.", SWITCHER_TITLE);
    }
}

fn restart_plasmashell(runner: &mut dyn CommandRunner) {
    if runner.exists("kquitapp5") {
        print!("Stopping Plasma shell... ");
        let quit = CommandSpec::new("kquitapp5").arg("plasmashell").capture();
        match runner.run_checked(&quit) {
            Ok(_) => println!("Plasma shell stopped."),
            Err(e) => console::problem(&format!("\nProblem while stopping Plasma shell:\n\t{}", e)),
        }
    } else {
        console::problem("The \"kquitapp5\" command is not found. Skipping plasmashell restart.");
    }

    println!("Starting Plasma shell (backgrounded)... ");
    if let Err(e) = runner.spawn_detached(&CommandSpec::new("kstart5").arg("plasmashell")) {
        console::problem(&format!("Problem starting Plasma shell:\n\t{}", e));
    }
}

pub fn remove_tweaks_kde(settings: &InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    if !runner.exists("kwriteconfig5") {
        return Ok(());
    }

    runner.run_checked(&kwriteconfig("kwinrc", "ModifierOnlyShortcuts", "Meta", None))?;
    runner.run_checked(&kwriteconfig("kwinrc", "TabBox", "ApplicationsMode", None))?;
    kwin_reconfigure(settings, runner);

    println!("Re-enabled Meta key opening application menu.");
    println!("Disabled \"Only one window per application\" task switcher option.");
    Ok(())
}

// ============================================================================
// Font
// ============================================================================

/// Download, unpack and register the fancy-pants terminal font.
/// Returns the font name when it was installed.
pub fn install_font(settings: &InstallerSettings, runner: &mut dyn CommandRunner) -> Result<Option<String>> {
    print!("Installing font: Downloading… ");
    let run_dir = &settings.paths.runtime_dir;
    let zip_path = run_dir.join(FONT_FILE);
    let link = format!("{}/{}", FONT_URL, FONT_FILE);

    let download = if runner.exists("curl") {
        CommandSpec::new("curl").arg("-Lo").arg(zip_path.display().to_string()).arg(link)
    } else if runner.exists("wget") {
        CommandSpec::new("wget").arg("-O").arg(zip_path.display().to_string()).arg(link)
    } else {
        println!("\nERROR: Neither 'curl' nor 'wget' is available. Can't install font.");
        return Ok(None);
    };
    runner.run_logged(&download.silent());

    if !zip_path.is_file() {
        return Ok(None);
    }
    if !runner.exists("unzip") {
        println!("\nERROR: 'unzip' is not available. Can't install font.");
        return Ok(None);
    }

    let folder_name = FONT_FILE.trim_end_matches(".zip").to_string();
    let extract_dir = run_dir.join(&folder_name);
    print!("Unzipping… ");
    let unzip = CommandSpec::new("unzip")
        .args(["-o", "-q"])
        .arg(zip_path.display().to_string())
        .arg("-d")
        .arg(extract_dir.display().to_string());
    runner.run_checked(&unzip)?;

    print!("Moving… ");
    let fonts_dir = settings.paths.fonts_dir();
    fs::create_dir_all(&fonts_dir)?;
    // TTF rather than OTF: less stem darkening on KDE
    let ttf_dir = find_ttf_dir(&extract_dir)
        .ok_or_else(|| SetupError::general(format!("No TTF folder found in '{}'", extract_dir.display())))?;
    move_ttf_files(&ttf_dir, &fonts_dir)?;

    print!("Refreshing font cache… ");
    runner.run_logged(&CommandSpec::new("fc-cache").args(["-f", "-v"]).silent());
    println!("Done.");

    println!("Installed font: '{}'", folder_name);
    Ok(Some(folder_name))
}

/// `TTF` directly under `root`, or under its single top-level folder
fn find_ttf_dir(root: &Path) -> Option<PathBuf> {
    let direct = root.join("TTF");
    if direct.is_dir() {
        return Some(direct);
    }
    WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_dir() && entry.file_name() == "TTF")
        .map(|entry| entry.into_path())
}

fn move_ttf_files(from: &Path, to: &Path) -> Result<usize> {
    let mut moved = 0;
    for entry in fs::read_dir(from)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "ttf") {
            if let Some(name) = path.file_name() {
                let dest = to.join(name);
                if fs::rename(&path, &dest).is_err() {
                    fs::copy(&path, &dest)?;
                    fs::remove_file(&path)?;
                }
                moved += 1;
            }
        }
    }
    Ok(moved)
}

// ============================================================================
// Entry points
// ============================================================================

/// Apply the tweaks known for the detected desktop
pub fn apply_desktop_tweaks(settings: &mut InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    console::section("Applying any known desktop environment tweaks...");
    if settings.fancy_pants {
        println!("Fancy-Pants install invoked. Additional steps will be taken.");
    }

    if settings.is_gnome() {
        println!("Applying GNOME desktop tweaks...");
        apply_tweaks_gnome(runner);
        settings.tweak_applied = true;
    }
    if settings.is_kde() {
        println!("Applying KDE Plasma desktop tweaks...");
        apply_tweaks_kde(settings, runner)?;
        settings.tweak_applied = true;
    }

    if settings.fancy_pants && install_font(settings, runner)?.is_some() {
        settings.tweak_applied = true;
    }

    if !settings.tweak_applied {
        println!("If nothing printed, no tweaks available for \"{}\" yet.", settings.desktop_env);
    }
    console::task_completed();
    Ok(())
}

/// Undo the tweaks known for the detected desktop
pub fn remove_desktop_tweaks(settings: &InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    console::section("Removing any applied desktop environment tweaks...");

    if settings.is_gnome() {
        println!("Removing GNOME desktop tweaks...");
        remove_tweaks_gnome(runner);
    }
    if settings.is_kde() {
        println!("Removing KDE Plasma desktop tweaks...");
        remove_tweaks_kde(settings, runner)?;
    }

    println!("Removed known desktop tweaks applied by installer.");
    console::task_completed();
    Ok(())
}
