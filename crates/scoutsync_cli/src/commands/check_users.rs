//! Check-users command implementation.

use crate::auth::token_source;
use crate::config::AppConfig;
use crate::http::ReqwestClient;
use chrono::{Local, NaiveDate};
use scoutsync_core::{DirectoryUser, DiscrepancyReport, Population, RegistryUser};
use scoutsync_engine::{DirectoryApi, DirectoryReader, HttpDirectory};
use scoutsync_registry::RegistryClient;
use std::fmt::Write as _;
use tracing::warn;

/// Runs the check-users command.
pub fn run(config: &AppConfig, client: ReqwestClient) -> Result<(), Box<dyn std::error::Error>> {
    let registry = RegistryClient::new(client.clone(), config.registry_config());
    let users = registry.fetch_users()?;

    let tokens = token_source(&config.directory, client.clone())?;
    let directory = HttpDirectory::new(client, tokens, config.domain()?);

    let today = Local::now().date_naive();
    print!("{}", check(config, &users, &directory, today)?);
    Ok(())
}

/// Compares the registry population with the directory's users and
/// renders the result.
pub fn check<D: DirectoryApi>(
    config: &AppConfig,
    users: &[RegistryUser],
    directory: &D,
    today: NaiveDate,
) -> Result<String, Box<dyn std::error::Error>> {
    let roster = config.roster_config();
    if !roster.youth_units.is_empty() {
        warn!(units = ?roster.youth_units, "including youth units");
    }
    let population = Population::classify(users, &roster, today);

    let directory_users = DirectoryReader::new(directory, config.directory.max_results).users()?;
    let report = DiscrepancyReport::by_name(&population.all(), &directory_users);
    Ok(render(&population, &directory_users, &report))
}

fn row(out: &mut String, last_name: &str, first_name: &str) {
    let _ = writeln!(out, "  {last_name:<20.20} {first_name:<15.15}");
}

/// Renders the counts line and both discrepancy lists.
pub fn render(
    population: &Population,
    directory_users: &[DirectoryUser],
    report: &DiscrepancyReport,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Directory: {} users, Registry: {} users ({} adults, {} youths)",
        directory_users.len(),
        population.len(),
        population.adults.len(),
        population.youths.len()
    );

    let _ = writeln!(out, "Missing in directory ({}):", report.missing_in_directory.len());
    let mut missing: Vec<&RegistryUser> = report.missing_in_directory.iter().collect();
    missing.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
    for user in missing {
        row(&mut out, &user.last_name, &user.first_name);
    }

    let _ = writeln!(out, "Missing in registry ({}):", report.missing_in_registry.len());
    let mut extra: Vec<&DirectoryUser> = report.missing_in_registry.iter().collect();
    extra.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
    for user in extra {
        row(&mut out, &user.last_name, &user.first_name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoutsync_core::DirectoryUser;
    use scoutsync_engine::MemoryDirectory;

    fn user(no: &str, first: &str, last: &str, unit: &str, born: &str) -> RegistryUser {
        RegistryUser::new(no, first, last)
            .with_unit(unit)
            .with_date_of_birth(NaiveDate::parse_from_str(born, "%Y-%m-%d").unwrap())
    }

    #[test]
    fn reports_both_directions() {
        let config = AppConfig::parse(
            "[registry]\nyouth_units = [\"Utmanarna\"]\n[directory]\ndomain = \"example.com\"\n",
        )
        .unwrap();
        let users = vec![
            user("1", "Anna", "Berg", "Spårarna", "1980-04-01"),
            user("2", "Bo", "Ek", "Spårarna", "1990-12-31"),
            user("3", "Cia", "Lind", "Utmanarna", "2010-06-15"),
            user("4", "Dan", "Ros", "Spårarna", "2015-01-01"),
            user("5", "Eva", "Sund", "Övriga kårmedlemmar", "1970-03-03"),
        ];
        let directory = MemoryDirectory::new();
        directory.seed_user(DirectoryUser::new("Anna", "Berg", "anna@example.com"));
        directory.seed_user(DirectoryUser::new("Gus", "Holm", "gus@example.com"));
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();

        let text = check(&config, &users, &directory, today).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Directory: 2 users, Registry: 3 users (2 adults, 1 youths)"
        );
        assert_eq!(lines[1], "Missing in directory (2):");
        assert_eq!(lines[2], format!("  {:<20} {:<15}", "Ek", "Bo"));
        assert_eq!(lines[3], format!("  {:<20} {:<15}", "Lind", "Cia"));
        assert_eq!(lines[4], "Missing in registry (1):");
        assert_eq!(lines[5], format!("  {:<20} {:<15}", "Holm", "Gus"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn long_names_are_cut_to_column_width() {
        let report = DiscrepancyReport {
            missing_in_registry: [DirectoryUser::new(
                "Maximiliana-Charlotta",
                "Andersson-Bergström-Lindqvist",
                "max@example.com",
            )]
            .into_iter()
            .collect(),
            ..DiscrepancyReport::default()
        };

        let text = render(&Population::default(), &[], &report);

        let row = text.lines().last().unwrap();
        assert_eq!(row, "  Andersson-Bergström- Maximiliana-Cha");
        assert_eq!(row.chars().count(), 2 + 20 + 1 + 15);
    }

    #[test]
    fn clean_roster_renders_empty_lists() {
        let text = render(&Population::default(), &[], &DiscrepancyReport::default());
        assert_eq!(
            text,
            "Directory: 0 users, Registry: 0 users (0 adults, 0 youths)\n\
             Missing in directory (0):\n\
             Missing in registry (0):\n"
        );
    }
}
