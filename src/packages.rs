//! Native package list resolution
//!
//! Pure functions: the final list depends only on the group, the distro ID,
//! its major version and whether an init service manager is present.
//!
//! Order of operations:
//! 1. Copy the group's base list
//! 2. Append additions for `(distro, major)` then `(distro, any version)`
//! 3. Apply removals for `(distro, major)` then `(distro, any version)`
//! 4. Drop names containing `systemd` when there is no `systemctl`
//!
//! Removals run after every addition, so a wildcard removal cancels a
//! version-specific addition.

use crate::distro::{self, DistroGroup};
use crate::error::{Result, SetupError};

/// Extra or removed packages for one distro, optionally pinned to a major
/// version (`None` matches any version)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageRule {
    pub distro: &'static str,
    pub version: Option<&'static str>,
    pub packages: &'static [&'static str],
}

impl PackageRule {
    fn matches(&self, distro: &str, version: Option<&str>) -> bool {
        self.distro == distro && self.version == version
    }
}

/// Rule tables consulted during resolution
#[derive(Debug, Clone, Copy)]
pub struct RuleTables {
    pub additions: &'static [PackageRule],
    pub removals: &'static [PackageRule],
}

pub const EXTRA_PACKAGES: &[PackageRule] = &[];

pub const REMOVE_PACKAGES: &[PackageRule] = &[PackageRule {
    distro: "centos",
    version: Some("7"),
    packages: &["dbus-daemon", "gnome-shell-extension-appindicator"],
}];

pub const DEFAULT_TABLES: RuleTables = RuleTables {
    additions: EXTRA_PACKAGES,
    removals: REMOVE_PACKAGES,
};

/// Base package list for a group
pub fn base_list(group: DistroGroup) -> &'static [&'static str] {
    match group {
        DistroGroup::FedoraBased | DistroGroup::FedoraImmutables => &[
            "cairo-devel",
            "cairo-gobject-devel",
            "dbus-daemon",
            "dbus-devel",
            "evtest",
            "gcc",
            "git",
            "gobject-introspection-devel",
            "libappindicator-gtk3",
            "libnotify",
            "python3-dbus",
            "python3-devel",
            "python3-pip",
            "python3-tkinter",
            "systemd-devel",
            "xset",
            "zenity",
        ],
        DistroGroup::RhelBased => &[
            "cairo-devel",
            "cairo-gobject-devel",
            "dbus-daemon",
            "dbus-devel",
            "gcc",
            "git",
            "gobject-introspection-devel",
            "libappindicator-gtk3",
            "libnotify",
            "python3-dbus",
            "python3-devel",
            "python3-pip",
            "python3-tkinter",
            "systemd-devel",
            "xset",
            "zenity",
        ],
        DistroGroup::TumbleweedBased => &[
            "cairo-devel",
            "dbus-1-daemon",
            "dbus-1-devel",
            "gcc",
            "git",
            "gobject-introspection-devel",
            "libappindicator3-devel",
            "libnotify-tools",
            "python3-dbus-python-devel",
            "python3-devel",
            "python3-tk",
            "systemd-devel",
            "tk",
            "typelib-1_0-AyatanaAppIndicator3-0_1",
            "zenity",
        ],
        // TODO: move Leap to python312 packages once Leap ships them
        DistroGroup::LeapBased => &[
            "cairo-devel",
            "dbus-1-devel",
            "gcc",
            "git",
            "gobject-introspection-devel",
            "libappindicator3-devel",
            "libnotify-tools",
            "python3-dbus-python-devel",
            "python311",
            "python311-devel",
            "python311-tk",
            "systemd-devel",
            "tk",
            "typelib-1_0-AyatanaAppIndicator3-0_1",
            "zenity",
        ],
        DistroGroup::MandrivaBased => &[
            "cairo-devel",
            "dbus-daemon",
            "dbus-devel",
            "git",
            "gobject-introspection-devel",
            "lib64ayatana-appindicator3_1",
            "lib64ayatana-appindicator3-gir0.1",
            "lib64cairo-gobject2",
            "lib64python-devel",
            "lib64systemd-devel",
            "libnotify",
            "python-dbus",
            "python-dbus-devel",
            "python-ensurepip",
            "python3-pip",
            "task-devel",
            "tkinter",
            "xset",
            "zenity",
        ],
        DistroGroup::UbuntuBased | DistroGroup::DebianBased => &[
            "curl",
            "git",
            "gir1.2-ayatanaappindicator3-0.1",
            "input-utils",
            "libcairo2-dev",
            "libdbus-1-dev",
            "libgirepository1.0-dev",
            "libnotify-bin",
            "libsystemd-dev",
            "python3-dbus",
            "python3-dev",
            "python3-pip",
            "python3-tk",
            "python3-venv",
            "zenity",
        ],
        DistroGroup::ArchBased => &[
            "cairo",
            "dbus",
            "evtest",
            "git",
            "gobject-introspection",
            "libappindicator-gtk3",
            "libnotify",
            "pkg-config",
            "python",
            "python-dbus",
            "python-pip",
            "systemd",
            "tk",
            "zenity",
        ],
        DistroGroup::SolusBased => &[
            "gcc",
            "git",
            "libayatana-appindicator",
            "libcairo-devel",
            "libnotify",
            "pip",
            "python3-dbus",
            "python3-devel",
            "python3-tkinter",
            "python-dbus-devel",
            "python-gobject-devel",
            "systemd-devel",
            "zenity",
        ],
    }
}

/// Resolve against the built-in rule tables
pub fn resolve(
    group: DistroGroup,
    distro_name: &str,
    major_version: &str,
    has_init_service_manager: bool,
) -> Vec<String> {
    resolve_with(
        &DEFAULT_TABLES,
        base_list(group),
        distro_name,
        major_version,
        has_init_service_manager,
    )
}

/// Resolve a base list against explicit rule tables
pub fn resolve_with(
    tables: &RuleTables,
    base: &[&str],
    distro_name: &str,
    major_version: &str,
    has_init_service_manager: bool,
) -> Vec<String> {
    let mut packages: Vec<String> = base.iter().map(|p| p.to_string()).collect();
    let version_keys = [Some(major_version), None];

    for version in version_keys {
        for rule in tables.additions.iter().filter(|r| r.matches(distro_name, version)) {
            packages.extend(rule.packages.iter().map(|p| p.to_string()));
        }
    }

    for version in version_keys {
        for rule in tables.removals.iter().filter(|r| r.matches(distro_name, version)) {
            packages.retain(|p| !rule.packages.contains(&p.as_str()));
        }
    }

    if !has_init_service_manager {
        packages.retain(|p| !p.contains("systemd"));
    }

    packages
}

/// Every distro named by a rule must be classifiable
pub fn validate_rule_tables(tables: &RuleTables) -> Result<()> {
    for rule in tables.additions.iter().chain(tables.removals) {
        if distro::classify(rule.distro).is_err() {
            return Err(SetupError::table(format!(
                "package rule names unknown distro \"{}\"",
                rule.distro
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centos7_removals() {
        let pkgs = resolve(DistroGroup::RhelBased, "centos", "7", false);
        assert!(!pkgs.contains(&"dbus-daemon".to_string()));
        assert!(pkgs.contains(&"dbus-devel".to_string()));

        let pkgs = resolve(DistroGroup::RhelBased, "centos", "8", true);
        assert!(pkgs.contains(&"dbus-daemon".to_string()));
    }

    #[test]
    fn test_systemd_filter() {
        let base = ["gcc", "systemd-devel", "libsystemd-dev"];
        let tables = RuleTables {
            additions: &[],
            removals: &[],
        };

        let without = resolve_with(&tables, &base, "fedora", "39", false);
        assert_eq!(without, vec!["gcc"]);

        let with = resolve_with(&tables, &base, "fedora", "39", true);
        assert_eq!(with, vec!["gcc", "systemd-devel", "libsystemd-dev"]);
    }

    #[test]
    fn test_removal_after_addition() {
        const ADD: &[PackageRule] = &[PackageRule {
            distro: "fedora",
            version: Some("1"),
            packages: &["b"],
        }];
        const REMOVE: &[PackageRule] = &[PackageRule {
            distro: "fedora",
            version: None,
            packages: &["b"],
        }];
        let tables = RuleTables {
            additions: ADD,
            removals: REMOVE,
        };

        assert_eq!(resolve_with(&tables, &["a"], "fedora", "1", true), vec!["a"]);
    }

    #[test]
    fn test_additions_order_specific_then_wildcard() {
        const ADD: &[PackageRule] = &[
            PackageRule {
                distro: "debian",
                version: None,
                packages: &["wild"],
            },
            PackageRule {
                distro: "debian",
                version: Some("12"),
                packages: &["pinned"],
            },
        ];
        let tables = RuleTables {
            additions: ADD,
            removals: &[],
        };

        assert_eq!(
            resolve_with(&tables, &["base"], "debian", "12", true),
            vec!["base", "pinned", "wild"]
        );
        assert_eq!(
            resolve_with(&tables, &["base"], "debian", "11", true),
            vec!["base", "wild"]
        );
    }

    #[test]
    fn test_base_table_untouched_by_resolution() {
        let before = base_list(DistroGroup::RhelBased).len();
        let _ = resolve(DistroGroup::RhelBased, "centos", "7", false);
        assert_eq!(base_list(DistroGroup::RhelBased).len(), before);
    }

    #[test]
    fn test_rule_tables_validate() {
        validate_rule_tables(&DEFAULT_TABLES).unwrap();

        const BAD: &[PackageRule] = &[PackageRule {
            distro: "plan9",
            version: None,
            packages: &["x"],
        }];
        let tables = RuleTables {
            additions: BAD,
            removals: &[],
        };
        assert!(matches!(
            validate_rule_tables(&tables),
            Err(SetupError::Table(_))
        ));
    }
}
