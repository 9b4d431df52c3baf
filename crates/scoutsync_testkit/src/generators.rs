//! Property-based test generators using proptest.
//!
//! Addresses are drawn from small alphabets so that generated desired and
//! observed sets overlap often enough to exercise updates as well as
//! creates and deletes.

use proptest::prelude::*;
use scoutsync_core::DirectoryGroup;

/// Strategy for local parts: a short lower-case name.
pub fn local_part_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-e]{1,3}").expect("Invalid regex")
}

/// Strategy for addresses in `domain`.
pub fn address_strategy(domain: &'static str) -> impl Strategy<Value = String> {
    local_part_strategy().prop_map(move |local| format!("{local}@{domain}"))
}

/// Strategy for member addresses as a registry might deliver them: random
/// case and an optional `+tag` suffix.
pub fn raw_member_strategy() -> impl Strategy<Value = String> {
    (
        local_part_strategy(),
        prop::option::of(prop::string::string_regex("[a-z]{1,4}").expect("Invalid regex")),
        prop::sample::select(vec!["x.org", "y.org"]),
        any::<bool>(),
    )
        .prop_map(|(local, tag, domain, upper)| {
            let address = match tag {
                Some(tag) => format!("{local}+{tag}@{domain}"),
                None => format!("{local}@{domain}"),
            };
            if upper {
                address.to_uppercase()
            } else {
                address
            }
        })
}

/// Strategy for one managed group at `address`.
pub fn group_strategy(address: String) -> impl Strategy<Value = DirectoryGroup> {
    (
        prop::collection::btree_set(raw_member_strategy(), 0..6),
        prop::option::of(prop::sample::select(vec!["Leaders", "Youth", "Board"])),
        prop::sample::select(vec!["A", "B"]),
    )
        .prop_map(move |(members, description, title)| {
            let mut group = DirectoryGroup::new(address.clone())
                .with_title(format!("{title} (Scoutnet)"))
                .with_alias(address.clone())
                .with_members(members);
            group.description = description.map(str::to_string);
            group
        })
}

/// Strategy for a set of groups in `domain` with unique addresses.
pub fn groups_strategy(
    domain: &'static str,
    max: usize,
) -> impl Strategy<Value = Vec<DirectoryGroup>> {
    prop::collection::btree_set(address_strategy(domain), 0..=max).prop_flat_map(|addresses| {
        addresses
            .into_iter()
            .map(group_strategy)
            .collect::<Vec<_>>()
    })
}

/// Strategy for unmanaged groups: titles never carry the managed tag.
pub fn unmanaged_groups_strategy(
    domain: &'static str,
) -> impl Strategy<Value = Vec<DirectoryGroup>> {
    prop::collection::btree_set(local_part_strategy(), 0..3).prop_map(move |locals| {
        locals
            .into_iter()
            .map(|local| {
                DirectoryGroup::new(format!("manual-{local}@{domain}"))
                    .with_title(format!("Manual {local}"))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    proptest! {
        #[test]
        fn generated_addresses_are_unique(groups in groups_strategy("d.com", 6)) {
            let addresses: BTreeSet<&str> = groups.iter().map(|g| g.address.as_str()).collect();
            prop_assert_eq!(addresses.len(), groups.len());
        }

        #[test]
        fn generated_groups_are_managed(groups in groups_strategy("d.com", 4)) {
            for group in &groups {
                let title = group.title.clone().unwrap_or_default();
                prop_assert!(title.ends_with("(Scoutnet)"));
                prop_assert!(group.aliases.contains(&group.address));
            }
        }

        #[test]
        fn unmanaged_titles_lack_tag(groups in unmanaged_groups_strategy("d.com")) {
            for group in &groups {
                prop_assert!(!group.title.clone().unwrap_or_default().contains("(Scoutnet)"));
            }
        }
    }
}
