//! Tests for carrying user slices across a config upgrade
//!
//! These tests verify:
//! - Slice bodies survive a redeploy while everything else is replaced
//! - Broken marker pairs stop the run
//! - The barebones override confirmation and its exit statuses

use std::fs;
use tempfile::TempDir;
use toshy_setup::command_runner::RecordingRunner;
use toshy_setup::deploy;
use toshy_setup::prompt::ScriptedPrompter;
use toshy_setup::settings::{InstallerSettings, SetupPaths};
use toshy_setup::slices::{self, ConfigState};
use toshy_setup::SetupError;

const TAIL: &str = "  ###  EDITS OUTSIDE THESE MARKS WILL BE LOST ON UPGRADE";

fn slice(name: &str, body: &str) -> String {
    format!(
        "###  SLICE_MARK_START: {name}{TAIL}\n{body}###  SLICE_MARK_END: {name}{TAIL}\n"
    )
}

// =============================================================================
// Extract and merge
// =============================================================================

#[test]
fn test_two_slices_carried_into_new_config() {
    let old = format!(
        "old header\n{}old middle\n{}old footer\n",
        slice("alpha", "user_alpha = 1\n"),
        slice("beta", "user_beta = 2\n")
    );
    let new = format!(
        "new header\n{}new middle\n{}new footer\n",
        slice("alpha", "# default alpha\n"),
        slice("beta", "")
    );

    let extracted = slices::extract_slices(&old).unwrap();
    assert_eq!(extracted.len(), 2);

    let merged = slices::merge_slices(&new, &extracted).unwrap();
    assert!(merged.starts_with("new header\n"));
    assert!(merged.contains("user_alpha = 1\n"));
    assert!(merged.contains("user_beta = 2\n"));
    assert!(!merged.contains("# default alpha"));
    assert!(!merged.contains("old middle"));
    assert!(merged.ends_with("new footer\n"));

    // Merging again changes nothing
    let again = slices::merge_slices(&merged, &extracted).unwrap();
    assert_eq!(again, merged);
}

#[test]
fn test_slice_missing_from_new_config_is_dropped() {
    let old = slice("retired", "gone = True\n");
    let extracted = slices::extract_slices(&old).unwrap();
    let new = "no markers at all\n";
    assert_eq!(slices::merge_slices(new, &extracted).unwrap(), new);
}

#[test]
fn test_missing_end_marker_is_an_error() {
    let text = format!("###  SLICE_MARK_START: alpha{TAIL}\nbody\n");
    let err = slices::extract_slices(&text).unwrap_err();
    assert!(matches!(err, SetupError::MismatchedMarkers(_)));
}

#[test]
fn test_config_state_classification() {
    let empty = slices::SliceMap::new();
    let mut full = slices::SliceMap::new();
    full.insert("keymaps".to_string(), "x\n".to_string());
    let mut bare = slices::SliceMap::new();
    bare.insert("barebones_user_cfg".to_string(), "".to_string());

    assert_eq!(ConfigState::of(None, false), ConfigState::NoExistingConfig);
    assert_eq!(ConfigState::of(Some(&empty), false), ConfigState::ExistingNoSlices);
    assert_eq!(ConfigState::of(Some(&full), false), ConfigState::ExistingWithSlices);
    assert_eq!(ConfigState::of(Some(&bare), false), ConfigState::BarebonesExisting);
    assert_eq!(ConfigState::of(Some(&full), true), ConfigState::BarebonesRequestedOverFull);
}

// =============================================================================
// Backup with barebones override
// =============================================================================

fn settings_with_config(root: &TempDir, config: &str) -> InstallerSettings {
    let home = root.path().join("home");
    let mut runner = RecordingRunner::new();
    let settings = InstallerSettings::new(
        SetupPaths::new(&home, root.path(), root.path()),
        "alice",
        &mut runner,
    );
    fs::create_dir_all(&settings.paths.toshy_dir).unwrap();
    fs::write(settings.paths.config_file(), config).unwrap();
    settings
}

#[test]
fn test_barebones_override_invalid_answers_exit_one() {
    let root = TempDir::new().unwrap();
    let mut settings = settings_with_config(&root, &slice("keymaps", "mine = 1\n"));
    settings.barebones_config = true;
    let mut prompter = ScriptedPrompter::new(["maybe", "sure", ""]);

    let err = deploy::backup_toshy_config(&mut settings, &mut prompter).unwrap_err();

    assert_eq!(err.exit_code(), 1);
    assert_eq!(prompter.asked().len(), slices::BAREBONES_CONFIRM_ATTEMPTS);
    assert!(!settings.paths.backups_dir.exists());
    assert!(!settings.backup_succeeded);
}

#[test]
fn test_barebones_override_declined_exits_zero() {
    let root = TempDir::new().unwrap();
    let mut settings = settings_with_config(&root, &slice("keymaps", "mine = 1\n"));
    settings.barebones_config = true;
    let mut prompter = ScriptedPrompter::new(["N"]);

    let err = deploy::backup_toshy_config(&mut settings, &mut prompter).unwrap_err();

    assert_eq!(err.exit_code(), 0);
    assert!(!settings.paths.backups_dir.exists());
}

#[test]
fn test_barebones_override_confirmed_discards_slices() {
    let root = TempDir::new().unwrap();
    let mut settings = settings_with_config(&root, &slice("keymaps", "mine = 1\n"));
    settings.barebones_config = true;
    let mut prompter = ScriptedPrompter::new(["YES"]);

    let backup = deploy::backup_toshy_config(&mut settings, &mut prompter)
        .unwrap()
        .expect("config folder should be backed up");

    assert!(backup.join("toshy_config.py").is_file());
    assert!(settings.barebones_config);
    assert_eq!(settings.existing_slices, Some(slices::SliceMap::new()));
}

#[test]
fn test_backup_keeps_slices_and_skips_venv() {
    let root = TempDir::new().unwrap();
    let mut settings = settings_with_config(&root, &slice("keymaps", "mine = 1\n"));
    fs::create_dir_all(settings.paths.venv.join("bin")).unwrap();
    fs::write(settings.paths.venv.join("bin/python"), "").unwrap();
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

    let backup = deploy::backup_toshy_config(&mut settings, &mut prompter)
        .unwrap()
        .unwrap();

    assert!(prompter.asked().is_empty());
    assert!(!backup.join(".venv").exists());
    let kept = settings.existing_slices.unwrap();
    // Body keeps the line break that ends the start marker
    assert_eq!(kept["keymaps"], "\nmine = 1\n");
}
