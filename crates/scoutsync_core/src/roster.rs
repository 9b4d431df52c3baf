//! Roster classification and registry/directory discrepancy reporting.
//!
//! Everything here is pure: the caller fetches both rosters and passes them
//! in. Matching a registry user to a directory user is a pluggable predicate
//! because the two systems share no stable key.

use crate::error::{CoreError, CoreResult};
use crate::model::{DirectoryUser, RegistryUser};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// Age in whole years at which a member counts as an adult.
pub const ADULT_AGE: u32 = 18;

/// Default name of the registry unit whose members never get accounts
/// through the adult rule.
pub const DEFAULT_OTHER_MEMBERS_UNIT: &str = "Övriga kårmedlemmar";

/// Which registry users make up the desired directory population.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterConfig {
    /// Unit excluded from the adult population.
    pub other_members_unit: String,
    /// Units whose members are included regardless of age.
    pub youth_units: Vec<String>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            other_members_unit: DEFAULT_OTHER_MEMBERS_UNIT.to_string(),
            youth_units: Vec::new(),
        }
    }
}

impl RosterConfig {
    /// Sets the youth units.
    pub fn with_youth_units<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.youth_units = units.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the excluded unit.
    pub fn with_other_members_unit(mut self, unit: impl Into<String>) -> Self {
        self.other_members_unit = unit.into();
        self
    }
}

/// Parses a registry `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| CoreError::InvalidDate {
        value: value.to_string(),
    })
}

/// Age in whole years on `today`; `None` if born after `today`.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    today.years_since(date_of_birth)
}

/// The desired directory population split by rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Population {
    /// Members aged 18 or more, outside the excluded unit.
    pub adults: Vec<RegistryUser>,
    /// Members of youth units not already counted as adults.
    pub youths: Vec<RegistryUser>,
}

impl Population {
    /// Classifies `users` as of `today`.
    pub fn classify(users: &[RegistryUser], config: &RosterConfig, today: NaiveDate) -> Self {
        let adults: Vec<RegistryUser> = users
            .iter()
            .filter(|user| is_adult(user, today))
            .filter(|user| user.unit.as_deref() != Some(config.other_members_unit.as_str()))
            .cloned()
            .collect();

        let adult_ids: HashSet<&str> = adults.iter().map(|u| u.member_no.as_str()).collect();
        let youths: Vec<RegistryUser> = users
            .iter()
            .filter(|user| {
                user.unit
                    .as_deref()
                    .is_some_and(|unit| config.youth_units.iter().any(|y| y == unit))
            })
            .filter(|user| !adult_ids.contains(user.member_no.as_str()))
            .cloned()
            .collect();

        info!(
            adults = adults.len(),
            youths = youths.len(),
            "classified registry population"
        );
        Self { adults, youths }
    }

    /// All members of the population, adults first.
    pub fn all(&self) -> Vec<RegistryUser> {
        self.adults.iter().chain(&self.youths).cloned().collect()
    }

    /// Total number of members.
    pub fn len(&self) -> usize {
        self.adults.len() + self.youths.len()
    }

    /// Returns true when nobody qualifies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_adult(user: &RegistryUser, today: NaiveDate) -> bool {
    match user.date_of_birth {
        Some(dob) => age_on(dob, today).is_some_and(|age| age >= ADULT_AGE),
        None => {
            warn!(member_no = %user.member_no, "no date of birth, not counted as adult");
            false
        }
    }
}

/// Exact, case-sensitive first- and last-name equality.
///
/// Two people with the same name collide and a name change breaks the
/// match; callers that have a better key should pass their own predicate.
pub fn match_by_name(registry: &RegistryUser, directory: &DirectoryUser) -> bool {
    registry.first_name == directory.first_name && registry.last_name == directory.last_name
}

/// Registry users with no matching directory user.
pub fn find_missing_in_directory<F>(
    registry: &[RegistryUser],
    directory: &[DirectoryUser],
    matches: F,
) -> BTreeSet<RegistryUser>
where
    F: Fn(&RegistryUser, &DirectoryUser) -> bool,
{
    registry
        .iter()
        .filter(|r| !directory.iter().any(|d| matches(r, d)))
        .cloned()
        .collect()
}

/// Directory users with no matching registry user.
pub fn find_missing_in_registry<F>(
    registry: &[RegistryUser],
    directory: &[DirectoryUser],
    matches: F,
) -> BTreeSet<DirectoryUser>
where
    F: Fn(&RegistryUser, &DirectoryUser) -> bool,
{
    directory
        .iter()
        .filter(|d| {
            let found = registry.iter().any(|r| matches(r, d));
            if !found {
                debug!(email = %d.primary_email, "no registry match for directory user");
            }
            !found
        })
        .cloned()
        .collect()
}

/// Both directions of the roster comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscrepancyReport {
    /// Registry users without a directory account.
    pub missing_in_directory: BTreeSet<RegistryUser>,
    /// Directory accounts without a registry user.
    pub missing_in_registry: BTreeSet<DirectoryUser>,
}

impl DiscrepancyReport {
    /// Compares the rosters with `matches`.
    pub fn compare<F>(registry: &[RegistryUser], directory: &[DirectoryUser], matches: F) -> Self
    where
        F: Fn(&RegistryUser, &DirectoryUser) -> bool,
    {
        Self {
            missing_in_directory: find_missing_in_directory(registry, directory, &matches),
            missing_in_registry: find_missing_in_registry(registry, directory, &matches),
        }
    }

    /// Compares the rosters by name.
    pub fn by_name(registry: &[RegistryUser], directory: &[DirectoryUser]) -> Self {
        Self::compare(registry, directory, match_by_name)
    }

    /// Returns true when both rosters agree.
    pub fn is_clean(&self) -> bool {
        self.missing_in_directory.is_empty() && self.missing_in_registry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn today() -> NaiveDate {
        date("2024-06-15")
    }

    #[test]
    fn whole_year_age() {
        assert_eq!(age_on(date("2006-06-15"), today()), Some(18));
        assert_eq!(age_on(date("2006-06-16"), today()), Some(17));
        assert_eq!(age_on(date("2030-01-01"), today()), None);
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("15/06/2024").is_err());
        assert_eq!(parse_date(" 2024-06-15 ").unwrap(), today());
    }

    #[test]
    fn other_members_unit_is_never_adult() {
        let config = RosterConfig::default().with_youth_units(["Spårare"]);
        let users = vec![
            RegistryUser::new("1", "Ada", "Lind")
                .with_unit(DEFAULT_OTHER_MEMBERS_UNIT)
                .with_date_of_birth(date("2004-01-01")),
            RegistryUser::new("2", "Bo", "Ek")
                .with_unit("Ledare")
                .with_date_of_birth(date("1980-01-01")),
        ];
        let population = Population::classify(&users, &config, today());
        assert_eq!(population.adults.len(), 1);
        assert_eq!(population.adults[0].member_no, "2");
        assert!(population.youths.is_empty());
    }

    #[test]
    fn youth_units_are_included_regardless_of_age() {
        let config = RosterConfig::default().with_youth_units(["Spårare", "Upptäckare"]);
        let users = vec![
            RegistryUser::new("1", "Cai", "Ny")
                .with_unit("Spårare")
                .with_date_of_birth(date("2014-03-01")),
            RegistryUser::new("2", "Dan", "Ny")
                .with_unit("Upptäckare")
                .with_date_of_birth(date("2000-03-01")),
            RegistryUser::new("3", "Eva", "Ny")
                .with_unit("Äventyrare")
                .with_date_of_birth(date("2012-03-01")),
        ];
        let population = Population::classify(&users, &config, today());
        let youth_ids: Vec<_> = population.youths.iter().map(|u| u.member_no.as_str()).collect();
        assert_eq!(youth_ids, vec!["1"]);
        assert_eq!(population.adults[0].member_no, "2");
        assert_eq!(population.len(), 2);
    }

    #[test]
    fn missing_date_of_birth_is_not_adult() {
        let users = vec![RegistryUser::new("9", "Fia", "Ek").with_unit("Ledare")];
        let population = Population::classify(&users, &RosterConfig::default(), today());
        assert!(population.is_empty());
    }

    #[test]
    fn discrepancies_by_name() {
        let registry = vec![
            RegistryUser::new("1", "Anna", "Berg"),
            RegistryUser::new("2", "Olle", "Sten"),
        ];
        let directory = vec![
            DirectoryUser::new("Anna", "Berg", "anna@example.com"),
            DirectoryUser::new("Per", "Holm", "per@example.com"),
            DirectoryUser::new("Per", "Holm", "per.holm@example.com"),
        ];

        let report = DiscrepancyReport::by_name(&registry, &directory);
        assert_eq!(report.missing_in_directory.len(), 1);
        assert_eq!(
            report.missing_in_directory.iter().next().unwrap().member_no,
            "2"
        );
        assert_eq!(report.missing_in_registry.len(), 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn name_matching_is_case_sensitive() {
        let r = RegistryUser::new("1", "anna", "berg");
        let d = DirectoryUser::new("Anna", "Berg", "anna@example.com");
        assert!(!match_by_name(&r, &d));
    }

    #[test]
    fn custom_matcher_by_email() {
        let registry = vec![RegistryUser::new("1", "Anna", "Berg").with_email("anna@example.com")];
        let directory = vec![DirectoryUser::new("Anna", "Lund", "anna@example.com")];

        let by_email = |r: &RegistryUser, d: &DirectoryUser| {
            r.email_primary.as_deref() == Some(d.primary_email.as_str())
        };
        assert!(DiscrepancyReport::compare(&registry, &directory, by_email).is_clean());
        assert!(!DiscrepancyReport::by_name(&registry, &directory).is_clean());
    }
}
