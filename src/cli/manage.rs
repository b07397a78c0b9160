use std::path::PathBuf;

use anyhow::Result;
use clap::CommandFactory;
use tracing::info;

use crate::{daemon::storage::kv::KeyValueStore, tracking::Engine};

use super::Args;

pub async fn process_set_category_command<S: KeyValueStore>(
    engine: &Engine<S>,
    name: &str,
    patterns: &[String],
) -> Result<()> {
    let rule = engine.set_category_rule(name, patterns).await?;
    println!("{}\t{}", rule.name, rule.domain_patterns.join(", "));
    Ok(())
}

/// Writes the export to `output`, or to stdout when no file is given.
pub async fn process_export_command<S: KeyValueStore>(
    engine: &Engine<S>,
    output: Option<PathBuf>,
) -> Result<()> {
    let export = engine.export_all().await?;
    let json = serde_json::to_string_pretty(&export)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, json).await?;
            info!("Exported data to {path:?}");
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub async fn process_clear_command<S: KeyValueStore>(engine: &Engine<S>, yes: bool) -> Result<()> {
    if !yes {
        return Err(Args::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "Clearing deletes all tracked time and categories, pass --yes to confirm",
            )
            .into());
    }
    engine.clear_all_data().await?;
    println!("All data has been cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::{process_clear_command, process_export_command, process_set_category_command};
    use crate::{
        daemon::storage::{entities::ExportSnapshot, memory::MemoryStore},
        tracking::{Engine, EngineConfig},
        utils::clock::ManualClock,
    };

    fn engine() -> Engine<MemoryStore> {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2018, 7, 4, 12, 0, 0).unwrap(),
        ));
        Engine::new(MemoryStore::new(), clock, EngineConfig::default())
    }

    #[tokio::test]
    async fn test_export_to_file() -> Result<()> {
        let engine = engine();
        engine.initialize().await?;
        process_set_category_command(&engine, "news", &["bbc.co.uk".into()]).await?;
        let dir = tempdir()?;
        let path = dir.path().join("export.json");

        process_export_command(&engine, Some(path.clone())).await?;

        let export: ExportSnapshot = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(export, engine.export_all().await?);
        assert_eq!(export.categories.0.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_requires_confirmation() -> Result<()> {
        let engine = engine();
        engine.initialize().await?;

        assert!(process_clear_command(&engine, false).await.is_err());
        assert_eq!(engine.categories().await?.0.len(), 3);

        process_clear_command(&engine, true).await?;
        assert!(engine.categories().await?.0.is_empty());
        Ok(())
    }
}
