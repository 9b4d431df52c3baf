//! Desired-state building and roster classification across modules.

use chrono::NaiveDate;
use proptest::prelude::*;
use scoutsync_core::address::member_key;
use scoutsync_core::roster::parse_date;
use scoutsync_core::{
    DirectoryUser, DiscrepancyReport, GroupBuilder, GroupBuilderConfig, MailingList, Population,
    RegistryUser, RewriteRule, RosterConfig,
};

fn builder() -> GroupBuilder {
    let config = GroupBuilderConfig::new("example.com").unwrap();
    let mut rewrites = config.rewrites.clone();
    rewrites.push(RewriteRule::new(r"^(.+)@old\.se$", "${1}@new.se").unwrap());
    GroupBuilder::new(config.with_rewrites(rewrites))
}

#[test]
fn list_becomes_one_group_per_accepted_alias() {
    let list = MailingList::new("styrelse")
        .with_title("Styrelsen")
        .with_description("  Kårens styrelse\r\n")
        .with_alias("Styrelse@Example.com")
        .with_alias("board@example.com")
        .with_alias("styrelse@elsewhere.org")
        .with_member("kim@old.se")
        .with_member("Lo@googlemail.com");

    let groups = builder().build_groups(&list);

    let addresses: Vec<&str> = groups.iter().map(|g| g.address.as_str()).collect();
    assert_eq!(addresses, vec!["styrelse@example.com", "board@example.com"]);
    for group in &groups {
        assert_eq!(group.title.as_deref(), Some("Styrelsen (Scoutnet)"));
        assert_eq!(group.description.as_deref(), Some("Kårens styrelse"));
        assert!(group.members.contains("kim@new.se"));
        assert!(group.members.contains("lo@gmail.com"));
        assert_eq!(group.aliases.len(), 1);
        assert!(group.aliases.contains(&group.address));
    }
}

#[test]
fn population_and_discrepancies() {
    let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    let users = vec![
        RegistryUser::new("1", "Anna", "Berg")
            .with_unit("Spårarna")
            .with_date_of_birth(parse_date("2008-10-18").unwrap()),
        RegistryUser::new("2", "Bo", "Ek")
            .with_unit("Spårarna")
            .with_date_of_birth(parse_date("2008-10-19").unwrap()),
        RegistryUser::new("3", "Cia", "Lind")
            .with_unit("Utmanarna")
            .with_date_of_birth(parse_date("2000-01-01").unwrap()),
        RegistryUser::new("4", "Dan", "Ros").with_unit("Utmanarna"),
    ];
    let config = RosterConfig::default().with_youth_units(["Utmanarna"]);

    let population = Population::classify(&users, &config, today);

    // Turns 18 today counts; one day short does not.
    let adults: Vec<&str> = population.adults.iter().map(|u| u.member_no.as_str()).collect();
    assert_eq!(adults, vec!["1", "3"]);
    // Cia is already an adult; Dan has no birth date but is in a youth unit.
    let youths: Vec<&str> = population.youths.iter().map(|u| u.member_no.as_str()).collect();
    assert_eq!(youths, vec!["4"]);

    let directory = vec![
        DirectoryUser::new("Anna", "Berg", "anna@example.com"),
        DirectoryUser::new("anna", "berg", "anna2@example.com"),
    ];
    let report = DiscrepancyReport::by_name(&population.all(), &directory);
    let missing: Vec<&str> = report
        .missing_in_directory
        .iter()
        .map(|u| u.first_name.as_str())
        .collect();
    assert_eq!(missing, vec!["Cia", "Dan"]);
    assert_eq!(report.missing_in_registry.len(), 1);
    assert!(!report.is_clean());
}

proptest! {
    #[test]
    fn only_in_domain_aliases_survive(
        locals in prop::collection::vec("[a-z]{1,6}", 1..6),
        foreign in prop::collection::vec("[a-z]{1,6}", 0..4),
    ) {
        let mut list = MailingList::new("l").with_title("L");
        for local in &locals {
            list = list.with_alias(format!("{local}@Example.COM"));
        }
        for local in &foreign {
            list = list.with_alias(format!("{local}@other.net"));
        }

        let groups = builder().build_groups(&list);

        for group in &groups {
            prop_assert!(group.address.ends_with("@example.com"));
            prop_assert_eq!(group.address.to_lowercase(), group.address.clone());
        }
        let mut expected: Vec<String> = locals.iter().map(|l| format!("{l}@example.com")).collect();
        expected.sort();
        expected.dedup();
        let mut actual: Vec<String> = groups.iter().map(|g| g.address.clone()).collect();
        actual.sort();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn member_keys_drop_tags_and_case(
        local in "[a-z]{1,8}",
        tag in prop::option::of("[a-z0-9]{1,5}"),
        upper in any::<bool>(),
    ) {
        let raw = match &tag {
            Some(tag) => format!("{local}+{tag}@Host.org"),
            None => format!("{local}@Host.org"),
        };
        let raw = if upper { raw.to_uppercase() } else { raw };
        prop_assert_eq!(member_key(&raw), format!("{local}@host.org"));
    }
}
