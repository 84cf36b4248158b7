//! Tests for distro classification and package resolution
//!
//! These tests verify:
//! - Every known distro ID lands in exactly one group
//! - Group to package manager mapping
//! - Base lists pass through resolution untouched when no rule applies

use toshy_setup::distro::{self, DistroGroup, DistroIdentity, PackageManagerFamily};
use toshy_setup::packages;
use toshy_setup::SetupError;

// =============================================================================
// Classification
// =============================================================================

#[test]
fn test_every_known_distro_classifies() {
    for name in distro::all_distro_names() {
        let group = distro::classify(name).unwrap();
        assert!(group.members().contains(&name), "{} misfiled under {}", name, group);
    }
}

#[test]
fn test_group_table_has_no_duplicates() {
    distro::validate_groups().unwrap();
    packages::validate_rule_tables(&packages::DEFAULT_TABLES).unwrap();
}

#[test]
fn test_unknown_distro_rejected() {
    let err = distro::classify("gentoo").unwrap_err();
    assert!(matches!(err, SetupError::UnsupportedDistro(ref name) if name == "gentoo"));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_classification_is_exact_match() {
    // Substrings of a member are not members
    assert!(distro::classify("arc").is_err());
    assert!(distro::classify("ubuntu-server").is_err());
}

#[test]
fn test_family_mapping() {
    let cases = [
        ("ubuntu", PackageManagerFamily::Apt),
        ("debian", PackageManagerFamily::Apt),
        ("fedora", PackageManagerFamily::Dnf),
        ("rocky", PackageManagerFamily::Dnf),
        ("openmandriva", PackageManagerFamily::Dnf),
        ("kinoite-experimental", PackageManagerFamily::RpmOstree),
        ("opensuse-tumbleweed", PackageManagerFamily::Zypper),
        ("opensuse-leap", PackageManagerFamily::Zypper),
        ("manjaro", PackageManagerFamily::Pacman),
        ("solus", PackageManagerFamily::Eopkg),
    ];
    for (name, family) in cases {
        assert_eq!(distro::classify(name).unwrap().family(), family, "{}", name);
    }
}

#[test]
fn test_family_members_aggregate_groups() {
    let apt = PackageManagerFamily::Apt.members();
    assert!(apt.contains(&"pop"));
    assert!(apt.contains(&"kali"));
    assert!(!apt.contains(&"fedora"));
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_ubuntu_gets_base_list_unchanged() {
    let identity = DistroIdentity::from_raw("Ubuntu", "22.04");
    assert_eq!(identity.name, "ubuntu");
    assert_eq!(identity.major_version, "22");
    assert_eq!(identity.minor_version, "04");

    let group = distro::classify(&identity.name).unwrap();
    assert_eq!(group, DistroGroup::UbuntuBased);

    let resolved = packages::resolve(group, &identity.name, &identity.major_version, true);
    let base: Vec<String> = group.base_packages().iter().map(|p| p.to_string()).collect();
    assert_eq!(resolved, base);
}

#[test]
fn test_missing_version_uses_sentinels() {
    let identity = DistroIdentity::from_raw("arch", "");
    assert_eq!(identity.major_version, distro::NO_MAJOR_VERSION);
    assert_eq!(identity.minor_version, distro::NO_MINOR_VERSION);
}

#[test]
fn test_no_systemd_packages_without_systemctl() {
    for name in distro::all_distro_names() {
        let group = distro::classify(name).unwrap();
        let resolved = packages::resolve(group, name, "1", false);
        assert!(resolved.iter().all(|p| !p.contains("systemd")), "{}", name);
    }
}

#[test]
fn test_distro_index_lists_every_name() {
    let index = distro::distro_index();
    for name in distro::all_distro_names() {
        assert!(index.contains(name), "{} missing from index", name);
    }
    assert!(index.starts_with("A: "));
}
