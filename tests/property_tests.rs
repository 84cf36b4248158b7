//! Property-Based Tests for toshy-setup
//!
//! Uses proptest for testing invariants:
//! - Classification is total over the known distro IDs
//! - Package resolution is deterministic
//! - Slice bodies survive extract then merge

use proptest::prelude::*;
use toshy_setup::distro::{self, DistroGroup};
use toshy_setup::packages;
use toshy_setup::slices;

fn known_distro() -> impl Strategy<Value = &'static str> {
    prop::sample::select(distro::all_distro_names())
}

// =============================================================================
// Classification and resolution
// =============================================================================

proptest! {
    /// Every known ID classifies into the group that lists it
    #[test]
    fn classification_is_total(name in known_distro()) {
        let group = distro::classify(name).unwrap();
        prop_assert!(group.members().contains(&name));
    }

    /// Lowercase names outside the table never classify
    #[test]
    fn unknown_names_rejected(name in "[a-z]{1,12}") {
        prop_assume!(!distro::all_distro_names().contains(&name.as_str()));
        prop_assert!(distro::classify(&name).is_err());
    }

    /// Same inputs, same list
    #[test]
    fn resolve_is_deterministic(name in known_distro(), major in "[0-9]{1,2}", systemd in any::<bool>()) {
        let group: DistroGroup = distro::classify(name).unwrap();
        let first = packages::resolve(group, name, &major, systemd);
        let second = packages::resolve(group, name, &major, systemd);
        prop_assert_eq!(first, second);
    }

    /// Resolution never invents packages outside the base list plus additions
    #[test]
    fn resolve_stays_within_base(name in known_distro(), systemd in any::<bool>()) {
        let group = distro::classify(name).unwrap();
        let base = group.base_packages();
        let resolved = packages::resolve(group, name, "1", systemd);
        prop_assert!(resolved.iter().all(|p| base.contains(&p.as_str())));
    }
}

// =============================================================================
// Slice round trip
// =============================================================================

fn marked(name: &str, body: &str) -> String {
    format!("###  SLICE_MARK_START: {name}  ###\n{body}###  SLICE_MARK_END: {name}  ###\n")
}

proptest! {
    /// A body extracted from an old file lands unchanged in the new one
    #[test]
    fn slice_body_round_trips(
        name in "[a-z_]{1,10}",
        lines in prop::collection::vec("[a-zA-Z0-9 =_]{0,20}", 0..5),
        header in "[a-z ]{0,20}",
    ) {
        let body: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        let old = format!("{}\n{}", header, marked(&name, &body));
        let new = format!("fresh\n{}tail\n", marked(&name, "default\n"));

        let extracted = slices::extract_slices(&old).unwrap();
        let merged = slices::merge_slices(&new, &extracted).unwrap();

        prop_assert_eq!(&slices::extract_slices(&merged).unwrap(), &extracted);
        prop_assert!(merged.starts_with("fresh\n"));
        prop_assert!(merged.ends_with("tail\n"));
    }
}
