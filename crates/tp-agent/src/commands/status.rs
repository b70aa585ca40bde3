//! Status command for showing persisted tracking state.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use tp_store::{PersistedState, Store};

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let store = Store::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let identity = tp_store::load_identity(&store)?;
    let PersistedState {
        queue,
        stats,
        tracking_enabled,
    } = store.load_state()?;

    writeln!(writer, "tabpulse status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    match identity {
        Some(identity) => writeln!(writer, "Installation: {identity}")?,
        None => writeln!(writer, "Installation: not yet assigned")?,
    }
    writeln!(
        writer,
        "Tracking: {}",
        if tracking_enabled { "enabled" } else { "disabled" }
    )?;
    writeln!(writer, "Queued events: {}", queue.len())?;
    if let Some(oldest) = queue.first() {
        writeln!(
            writer,
            "Oldest queued: {}",
            oldest.occurred_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
    }
    writeln!(writer, "Events tracked: {}", stats.events_tracked)?;
    writeln!(writer, "Distinct domains: {}", stats.distinct_domains())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use tp_core::{ActivityStats, Domain, Event};
    use tp_store::keys;

    fn config_for(dir: &tempfile::TempDir) -> Config {
        Config {
            database_path: dir.path().join("tabpulse.db"),
            ..Config::default()
        }
    }

    fn render(config: &Config) -> String {
        let mut output = Vec::new();
        run(&mut output, config).unwrap();
        String::from_utf8(output)
            .unwrap()
            .replace(&config.database_path.display().to_string(), "[TEMP]/tabpulse.db")
    }

    #[test]
    fn test_status_command_on_fresh_database() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_for(&temp);

        assert_snapshot!(render(&config), @r"
        tabpulse status
        Database: [TEMP]/tabpulse.db
        Installation: not yet assigned
        Tracking: enabled
        Queued events: 0
        Events tracked: 0
        Distinct domains: 0
        ");
    }

    #[test]
    fn test_status_command_outputs_persisted_state() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_for(&temp);
        {
            let mut store = Store::open(&config.database_path).unwrap();
            let domain = Domain::new("example.com").unwrap();
            let events = [
                Event::active(domain.clone(), "2025-01-01T09:00:00Z".parse().unwrap()),
                Event::inactive(domain, "2025-01-01T09:30:00Z".parse().unwrap()),
            ];
            let mut stats = ActivityStats::default();
            for event in &events {
                stats.record(event);
            }
            store.save_queue_and_stats(&events, &stats).unwrap();
            store
                .set(
                    keys::INSTALLATION_ID,
                    "\"0b6e3a64-1c2f-4f5e-9a7d-3e8b2c1d4f5a\"".to_string(),
                )
                .unwrap();
            store.save_tracking_enabled(false).unwrap();
        }

        assert_snapshot!(render(&config), @r"
        tabpulse status
        Database: [TEMP]/tabpulse.db
        Installation: 0b6e3a64-1c2f-4f5e-9a7d-3e8b2c1d4f5a
        Tracking: disabled
        Queued events: 2
        Oldest queued: 2025-01-01T09:00:00Z
        Events tracked: 2
        Distinct domains: 1
        ");
    }
}
