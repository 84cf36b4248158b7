//! Keymapper clone, config backup and file deployment
//!
//! The existing config folder is read and backed up before anything in it
//! is replaced. Slice extraction, the barebones decision and the merge into
//! the new config all happen before the first destructive write, so a bad
//! marker or a declined prompt leaves the user's files as they were.

use crate::command_runner::{CommandRunner, CommandSpec};
use crate::console;
use crate::error::{Result, SetupError};
use crate::prompt::Prompter;
use crate::settings::{
    CONFIG_FILE_NAME, InstallerSettings, KEYMAPPER_BRANCH, KEYMAPPER_CLONE_DIR, KEYMAPPER_URL,
};
use crate::slices::{self, SliceScanner};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Source tree entries never deployed into the config folder
pub const DEPLOY_IGNORE: &[&str] = &[
    ".github",
    ".gitignore",
    "__pycache__",
    KEYMAPPER_CLONE_DIR,
    "kwin-application-switcher",
    "LICENSE",
    "packages.json",
    "README.md",
];

/// Copy `source` into `target`, skipping any entry whose file name is in
/// `ignore` (and everything below it)
pub fn copy_tree(source: &Path, target: &Path, ignore: &[&str]) -> Result<()> {
    if !source.is_dir() {
        return Err(SetupError::validation(format!(
            "cannot copy {}: not a directory",
            source.display()
        )));
    }

    let walker = WalkDir::new(source)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| ignore.contains(&name))
        });

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| SetupError::general(format!("bad path while copying: {}", e)))?;
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
        } else if entry.file_type().is_symlink() {
            let link_target = fs::read_link(entry.path())?;
            if destination.symlink_metadata().is_ok() {
                fs::remove_file(&destination)?;
            }
            std::os::unix::fs::symlink(link_target, &destination)?;
        } else {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

/// Fresh clone of the keymapper branch next to the installer files
pub fn clone_keymapper_branch(settings: &InstallerSettings, runner: &mut dyn CommandRunner) -> Result<()> {
    console::section(&format!("Cloning keyszer branch ({})...", KEYMAPPER_BRANCH));

    if !runner.exists("git") {
        return Err(SetupError::validation(
            "\"git\" is not installed, for some reason. Cannot continue.",
        ));
    }

    let clone_dir = &settings.paths.clone_dir;
    if clone_dir.exists() {
        if let Err(e) = fs::remove_dir_all(clone_dir) {
            tracing::error!("Problem removing existing '{}' folder: {}", clone_dir.display(), e);
        }
    }

    let spec = CommandSpec::new("git").args([
        "clone".to_string(),
        "-b".to_string(),
        KEYMAPPER_BRANCH.to_string(),
        KEYMAPPER_URL.to_string(),
        clone_dir.display().to_string(),
    ]);
    runner.run_checked(&spec)?;

    console::task_completed();
    Ok(())
}

/// `toshy_<timestamp>` directory for this run's backup
pub fn backup_dir_name() -> String {
    format!("toshy{}", chrono::Local::now().format("_%Y%m%d_%H%M%S"))
}

/// Read and reconcile the existing config, set the preferences database
/// aside and copy the config folder to a timestamped backup.
/// Returns the backup location, if anything was backed up.
pub fn backup_toshy_config(
    settings: &mut InstallerSettings,
    prompter: &mut dyn Prompter,
) -> Result<Option<PathBuf>> {
    console::section("Backing up existing Toshy config folder...");
    let paths = settings.paths.clone();

    if !paths.toshy_dir.exists() {
        println!("No existing Toshy folder to backup.");
        settings.backup_succeeded = true;
        console::task_completed();
        return Ok(None);
    }

    let config_file = paths.config_file();
    if config_file.is_file() {
        let existing = fs::read_to_string(&config_file)?;
        println!("Prepared existing config file data for merging into new config.");
        let extracted = slices::extract_slices(&existing)?;
        let reconciled = slices::reconcile_slices(extracted, settings.barebones_config, prompter)?;
        settings.barebones_config = reconciled.barebones;
        settings.existing_slices = Some(reconciled.slices);
    } else {
        println!("No existing config file found in {}.", paths.toshy_dir.display());
    }

    let db = paths.prefs_db();
    if db.is_file() {
        let aside = paths.prefs_db_aside();
        let _ = fs::remove_file(&aside);
        if let Err(e) = fs::copy(&db, &aside) {
            console::problem(&format!(
                "Problem copying preferences db file to '{}':\n\t{}",
                paths.runtime_dir.display(),
                e
            ));
        }
    } else {
        println!("No existing preferences db file found in {}.", paths.toshy_dir.display());
    }

    let backup = paths.backups_dir.join(backup_dir_name());
    copy_tree(&paths.toshy_dir, &backup, &[".venv"])?;
    println!("Backup completed to '{}'", backup.display());
    settings.backup_succeeded = true;

    console::task_completed();
    Ok(Some(backup))
}

/// Replace the config folder with the installer files, install the default
/// or barebones config with the user's slices, and restore the preferences
/// database
pub fn install_toshy_files(settings: &InstallerSettings) -> Result<()> {
    console::section("Installing Toshy files...");
    if !settings.backup_succeeded {
        return Err(SetupError::general("Backup of Toshy config folder failed? Bailing out."));
    }
    let paths = &settings.paths;
    if paths.source_dir == paths.toshy_dir {
        return Err(SetupError::validation(
            "installer is running from inside the config folder it would replace",
        ));
    }

    let template_name = if settings.barebones_config {
        "toshy_config_barebones.py"
    } else {
        CONFIG_FILE_NAME
    };
    let template = paths.source_dir.join("default-toshy-config").join(template_name);
    let template_text = fs::read_to_string(&template)?;

    let config_text = match &settings.existing_slices {
        Some(stored) => SliceScanner::new()?.merge(&template_text, stored)?,
        None => template_text,
    };

    if paths.toshy_dir.exists() {
        if let Err(e) = fs::remove_dir_all(&paths.toshy_dir) {
            tracing::error!("Problem removing existing Toshy config folder after backup: {}", e);
        }
    }

    let exe_name = std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));
    let mut ignore: Vec<&str> = DEPLOY_IGNORE.to_vec();
    if let Some(name) = exe_name.as_deref() {
        ignore.push(name);
    }
    copy_tree(&paths.source_dir, &paths.toshy_dir, &ignore)?;

    fs::write(paths.config_file(), &config_text)?;
    if settings.barebones_config {
        println!("Installed default \"barebones\" Toshy config file.");
    } else {
        println!("Installed default Toshy config file.");
    }
    println!("Toshy files installed in '{}'.", paths.toshy_dir.display());

    let aside = paths.prefs_db_aside();
    if aside.is_file() {
        match fs::copy(&aside, paths.prefs_db()) {
            Ok(_) => println!("Copied preferences db file from existing config folder."),
            Err(e) => console::problem(&format!(
                "Problem copying preferences db file from '{}':\n\t{}",
                paths.runtime_dir.display(),
                e
            )),
        }
    }

    if settings.existing_slices.as_ref().is_some_and(|s| !s.is_empty()) {
        println!("Existing user customizations applied to the new config file.");
    }
    console::task_completed();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::RecordingRunner;
    use crate::prompt::ScriptedPrompter;
    use crate::settings::{PREFS_DB_NAME, SetupPaths};
    use tempfile::TempDir;

    fn settings_in(root: &TempDir) -> InstallerSettings {
        let home = root.path().join("home");
        let run = root.path().join("run");
        let src = root.path().join("src");
        for dir in [&home, &run, &src] {
            fs::create_dir_all(dir).unwrap();
        }
        let mut runner = RecordingRunner::new();
        InstallerSettings::new(SetupPaths::new(&home, &run, &src), "alice", &mut runner)
    }

    #[test]
    fn test_copy_tree_honours_ignore_list() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("keyszer-temp/deep")).unwrap();
        fs::create_dir_all(src.join("scripts")).unwrap();
        fs::write(src.join("README.md"), "readme").unwrap();
        fs::write(src.join("scripts/run.sh"), "#!/bin/sh").unwrap();
        fs::write(src.join("keyszer-temp/deep/file"), "x").unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst, DEPLOY_IGNORE).unwrap();

        assert!(dst.join("scripts/run.sh").is_file());
        assert!(!dst.join("README.md").exists());
        assert!(!dst.join("keyszer-temp").exists());
    }

    #[test]
    fn test_clone_requires_git() {
        let root = TempDir::new().unwrap();
        let settings = settings_in(&root);
        let mut runner = RecordingRunner::new();
        assert!(clone_keymapper_branch(&settings, &mut runner).is_err());
        assert!(runner.calls().is_empty());

        let mut runner = RecordingRunner::with_programs(&["git"]);
        clone_keymapper_branch(&settings, &mut runner).unwrap();
        assert!(runner.ran(&format!("git clone -b {} {}", KEYMAPPER_BRANCH, KEYMAPPER_URL)));
    }

    #[test]
    fn test_backup_without_existing_folder() {
        let root = TempDir::new().unwrap();
        let mut settings = settings_in(&root);
        let mut p = ScriptedPrompter::default();

        assert_eq!(backup_toshy_config(&mut settings, &mut p).unwrap(), None);
        assert!(settings.backup_succeeded);
        assert!(settings.existing_slices.is_none());
    }

    #[test]
    fn test_backup_skips_venv_and_sets_db_aside() {
        let root = TempDir::new().unwrap();
        let mut settings = settings_in(&root);
        let toshy = settings.paths.toshy_dir.clone();
        fs::create_dir_all(toshy.join(".venv/bin")).unwrap();
        fs::write(toshy.join(".venv/bin/python"), "").unwrap();
        fs::write(toshy.join(PREFS_DB_NAME), [0u8, 1, 2, 255]).unwrap();
        fs::write(toshy.join(CONFIG_FILE_NAME), "no markers\n").unwrap();
        let mut p = ScriptedPrompter::default();

        let backup = backup_toshy_config(&mut settings, &mut p).unwrap().unwrap();

        assert!(backup.join(CONFIG_FILE_NAME).is_file());
        assert!(!backup.join(".venv").exists());
        assert_eq!(fs::read(settings.paths.prefs_db_aside()).unwrap(), vec![0u8, 1, 2, 255]);
        assert_eq!(settings.existing_slices, Some(Default::default()));
    }

    #[test]
    fn test_backup_mismatched_markers_is_fatal_before_copy() {
        let root = TempDir::new().unwrap();
        let mut settings = settings_in(&root);
        let toshy = settings.paths.toshy_dir.clone();
        fs::create_dir_all(&toshy).unwrap();
        fs::write(toshy.join(CONFIG_FILE_NAME), "###  SLICE_MARK_START: x  ###\n").unwrap();
        let mut p = ScriptedPrompter::default();

        let err = backup_toshy_config(&mut settings, &mut p).unwrap_err();
        assert!(matches!(err, SetupError::MismatchedMarkers(_)));
        assert!(!settings.paths.backups_dir.exists());
        assert!(!settings.backup_succeeded);
    }

    #[test]
    fn test_install_requires_backup() {
        let root = TempDir::new().unwrap();
        let settings = settings_in(&root);
        assert!(install_toshy_files(&settings).is_err());
    }

    #[test]
    fn test_install_picks_barebones_template() {
        let root = TempDir::new().unwrap();
        let mut settings = settings_in(&root);
        let defaults = settings.paths.source_dir.join("default-toshy-config");
        fs::create_dir_all(&defaults).unwrap();
        fs::write(defaults.join("toshy_config.py"), "full\n").unwrap();
        fs::write(defaults.join("toshy_config_barebones.py"), "bare\n").unwrap();
        settings.backup_succeeded = true;
        settings.barebones_config = true;

        install_toshy_files(&settings).unwrap();

        assert_eq!(fs::read_to_string(settings.paths.config_file()).unwrap(), "bare\n");
        assert!(settings.paths.toshy_dir.join("default-toshy-config").is_dir());
    }
}
