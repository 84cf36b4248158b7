//! Distro classification
//!
//! Distro IDs are free text from `/etc/os-release`, so classification is an
//! explicit allow-list: a distro is supported only if its ID is a member of
//! exactly one [`DistroGroup`]. Each group implies one
//! [`PackageManagerFamily`].

use crate::error::{Result, SetupError};
use std::collections::{BTreeMap, HashSet};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Sentinel for a missing major version
pub const NO_MAJOR_VERSION: &str = "NO_VER";
/// Sentinel for a missing minor version
pub const NO_MINOR_VERSION: &str = "no_mnr_ver";

/// Distro ID and version split for table lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistroIdentity {
    pub name: String,
    pub major_version: String,
    pub minor_version: String,
}

impl DistroIdentity {
    /// Build from a raw ID and version string such as `"22.04"`
    pub fn from_raw(name: &str, version: &str) -> Self {
        let mut parts = version.split('.');
        let major = parts.next().filter(|s| !s.is_empty());
        let minor = parts.next().filter(|s| !s.is_empty());

        Self {
            name: name.trim().to_lowercase(),
            major_version: major.unwrap_or(NO_MAJOR_VERSION).to_string(),
            minor_version: minor.unwrap_or(NO_MINOR_VERSION).to_string(),
        }
    }
}

/// Distro group, in classification order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum DistroGroup {
    FedoraBased,
    RhelBased,
    FedoraImmutables,
    TumbleweedBased,
    LeapBased,
    MandrivaBased,
    UbuntuBased,
    DebianBased,
    ArchBased,
    SolusBased,
}

impl DistroGroup {
    /// Distro IDs belonging to this group
    pub fn members(self) -> &'static [&'static str] {
        match self {
            Self::FedoraBased => &["fedora", "fedoralinux", "ultramarine", "nobara"],
            Self::RhelBased => &["rhel", "almalinux", "rocky", "eurolinux", "centos"],
            Self::FedoraImmutables => &["silverblue-experimental", "kinoite-experimental"],
            Self::TumbleweedBased => &["opensuse-tumbleweed"],
            Self::LeapBased => &["opensuse-leap"],
            Self::MandrivaBased => &["openmandriva"],
            Self::UbuntuBased => &[
                "ubuntu",
                "mint",
                "pop",
                "elementary",
                "neon",
                "tuxedo",
                "zorin",
            ],
            Self::DebianBased => &["lmde", "peppermint", "debian", "kali", "q4os"],
            Self::ArchBased => &["arch", "arcolinux", "endeavouros", "manjaro"],
            Self::SolusBased => &["solus"],
        }
    }

    /// Package manager used by every distro in the group
    pub fn family(self) -> PackageManagerFamily {
        match self {
            Self::FedoraImmutables => PackageManagerFamily::RpmOstree,
            Self::FedoraBased | Self::RhelBased | Self::MandrivaBased => PackageManagerFamily::Dnf,
            Self::TumbleweedBased | Self::LeapBased => PackageManagerFamily::Zypper,
            Self::UbuntuBased | Self::DebianBased => PackageManagerFamily::Apt,
            Self::ArchBased => PackageManagerFamily::Pacman,
            Self::SolusBased => PackageManagerFamily::Eopkg,
        }
    }

    /// Base native package list
    pub fn base_packages(self) -> &'static [&'static str] {
        crate::packages::base_list(self)
    }
}

/// Native package manager family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum PackageManagerFamily {
    RpmOstree,
    Dnf,
    Zypper,
    Apt,
    Pacman,
    Eopkg,
}

impl PackageManagerFamily {
    /// Executable that must be on the search path
    pub fn command(self) -> &'static str {
        match self {
            Self::RpmOstree => "rpm-ostree",
            Self::Dnf => "dnf",
            Self::Zypper => "zypper",
            Self::Apt => "apt",
            Self::Pacman => "pacman",
            Self::Eopkg => "eopkg",
        }
    }

    /// Arguments following `sudo <command>` for an install
    pub fn install_prefix(self) -> &'static [&'static str] {
        match self {
            Self::RpmOstree => &[
                "install",
                "--idempotent",
                "--allow-inactive",
                "--apply-live",
                "-y",
            ],
            Self::Dnf | Self::Apt | Self::Eopkg => &["install", "-y"],
            Self::Zypper => &["--non-interactive", "install"],
            Self::Pacman => &["-S", "--noconfirm"],
        }
    }

    /// Distro IDs handled by this family, aggregated from group membership
    pub fn members(self) -> Vec<&'static str> {
        DistroGroup::iter()
            .filter(|g| g.family() == self)
            .flat_map(|g| g.members().iter().copied())
            .collect()
    }
}

/// Classify a lowercased distro ID. The first group in declaration order
/// containing the name wins.
pub fn classify(distro_name: &str) -> Result<DistroGroup> {
    DistroGroup::iter()
        .find(|group| group.members().contains(&distro_name))
        .ok_or_else(|| SetupError::UnsupportedDistro(distro_name.to_string()))
}

/// Every known distro ID, sorted
pub fn all_distro_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = DistroGroup::iter()
        .flat_map(|g| g.members().iter().copied())
        .collect();
    names.sort_unstable();
    names
}

/// Known distro IDs grouped by first letter, e.g.
/// `A: almalinux, arch, arcolinux` with lines joined by `"\n\t"`
pub fn distro_index() -> String {
    let mut by_letter: BTreeMap<char, Vec<&str>> = BTreeMap::new();
    for name in all_distro_names() {
        if let Some(first) = name.chars().next() {
            by_letter.entry(first).or_default().push(name);
        }
    }

    by_letter
        .into_iter()
        .map(|(letter, names)| format!("{}: {}", letter.to_ascii_uppercase(), names.join(", ")))
        .collect::<Vec<_>>()
        .join("\n\t")
}

/// Reject a group table where one distro ID belongs to several groups
pub fn validate_groups() -> Result<()> {
    let mut seen = HashSet::new();
    for group in DistroGroup::iter() {
        for name in group.members() {
            if !seen.insert(*name) {
                return Err(SetupError::table(format!(
                    "distro \"{}\" is listed in more than one group (second: {})",
                    name, group
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_raw() {
        let id = DistroIdentity::from_raw("Ubuntu", "22.04");
        assert_eq!(id.name, "ubuntu");
        assert_eq!(id.major_version, "22");
        assert_eq!(id.minor_version, "04");

        let id = DistroIdentity::from_raw("arch", "");
        assert_eq!(id.major_version, NO_MAJOR_VERSION);
        assert_eq!(id.minor_version, NO_MINOR_VERSION);

        let id = DistroIdentity::from_raw("fedora", "39");
        assert_eq!(id.major_version, "39");
        assert_eq!(id.minor_version, NO_MINOR_VERSION);

        let id = DistroIdentity::from_raw("opensuse-leap", "15.5.1");
        assert_eq!(id.major_version, "15");
        assert_eq!(id.minor_version, "5");
    }

    #[test]
    fn test_classify_known_and_unknown() {
        assert_eq!(classify("ubuntu").unwrap(), DistroGroup::UbuntuBased);
        assert_eq!(classify("openmandriva").unwrap(), DistroGroup::MandrivaBased);
        assert_eq!(classify("centos").unwrap(), DistroGroup::RhelBased);

        match classify("plan9") {
            Err(SetupError::UnsupportedDistro(name)) => assert_eq!(name, "plan9"),
            other => panic!("expected UnsupportedDistro, got {:?}", other),
        }
        // Exact membership only
        assert!(classify("ubuntu-server").is_err());
        assert!(classify("Ubuntu").is_err());
    }

    #[test]
    fn test_family_mapping() {
        assert_eq!(DistroGroup::MandrivaBased.family(), PackageManagerFamily::Dnf);
        assert_eq!(DistroGroup::FedoraImmutables.family(), PackageManagerFamily::RpmOstree);
        assert_eq!(DistroGroup::LeapBased.family(), PackageManagerFamily::Zypper);
        assert_eq!(DistroGroup::SolusBased.family(), PackageManagerFamily::Eopkg);

        let dnf = PackageManagerFamily::Dnf.members();
        assert!(dnf.contains(&"fedora"));
        assert!(dnf.contains(&"rocky"));
        assert!(dnf.contains(&"openmandriva"));
        assert!(!dnf.contains(&"ubuntu"));
    }

    #[test]
    fn test_group_names_are_kebab_case() {
        assert_eq!(DistroGroup::FedoraImmutables.to_string(), "fedora-immutables");
        assert_eq!(
            "tumbleweed-based".parse::<DistroGroup>().unwrap(),
            DistroGroup::TumbleweedBased
        );
        assert_eq!(PackageManagerFamily::RpmOstree.to_string(), "rpm-ostree");
    }

    #[test]
    fn test_distro_index_format() {
        let index = distro_index();
        let first = index.split("\n\t").next().unwrap();
        assert_eq!(first, "A: almalinux, arch, arcolinux");
        assert!(index.contains("\n\tU: ubuntu, ultramarine"));
    }

    #[test]
    fn test_default_groups_are_disjoint() {
        validate_groups().unwrap();
    }
}
