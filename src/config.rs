//! Tunables of the engine and the daemon. Loaded from defaults, then `config.toml` in the
//! application directory, then an explicitly passed file, then `SITETIME_*` environment variables.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::{
    daemon::storage::entities::CategoryRule,
    tracking::{default_categories, EngineConfig},
};

pub const CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "SITETIME_";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Sessions not longer than this are discarded.
    pub min_dwell_ms: u32,
    pub checkpoint_interval_secs: u64,
    pub rollup_interval_secs: u64,
    pub max_write_attempts: u32,
    pub max_pending_flushes: usize,
    pub work_category: String,
    pub default_categories: Vec<CategoryRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_dwell_ms: 1000,
            checkpoint_interval_secs: 60,
            rollup_interval_secs: 24 * 60 * 60,
            max_write_attempts: 5,
            max_pending_flushes: 1024,
            work_category: "work".into(),
            default_categories: default_categories(),
        }
    }
}

impl Config {
    pub fn load_from(app_dir: &Path, config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(app_dir.join(CONFIG_FILE)));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX)).extract()
    }

    pub fn default_path(app_dir: &Path) -> PathBuf {
        app_dir.join(CONFIG_FILE)
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            min_dwell: chrono::Duration::milliseconds(i64::from(self.min_dwell_ms)),
            max_write_attempts: self.max_write_attempts.max(1),
            max_pending_flushes: self.max_pending_flushes.max(1),
            work_category: self.work_category.clone(),
            default_categories: self.default_categories.clone(),
        }
    }

    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_interval_secs.max(1))
    }

    pub fn rollup_interval(&self) -> Duration {
        Duration::from_secs(self.rollup_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use anyhow::Result;
    use tempfile::tempdir;

    use super::Config;
    use crate::{daemon::storage::entities::CategoryRule, tracking::EngineConfig};

    #[test]
    fn test_defaults_without_files() -> Result<()> {
        let dir = tempdir()?;

        let config = Config::load_from(dir.path(), None)?;

        assert_eq!(config, Config::default());
        assert_eq!(config.engine(), EngineConfig::default());
        assert_eq!(config.checkpoint_interval(), Duration::from_secs(60));
        assert_eq!(config.rollup_interval(), Duration::from_secs(86400));
        Ok(())
    }

    #[test]
    fn test_files_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            Config::default_path(dir.path()),
            r#"
min_dwell_ms = 2500
work_category = "focus"

[[default_categories]]
name = "focus"
domainPatterns = ["github.com"]
"#,
        )?;
        let explicit = dir.path().join("other.toml");
        fs::write(&explicit, "checkpoint_interval_secs = 0\n")?;

        let config = Config::load_from(dir.path(), Some(&explicit))?;

        assert_eq!(config.min_dwell_ms, 2500);
        assert_eq!(config.max_write_attempts, 5);
        assert_eq!(
            config.default_categories,
            vec![CategoryRule::new("focus", &["github.com"])]
        );
        let engine = config.engine();
        assert_eq!(engine.min_dwell, chrono::Duration::milliseconds(2500));
        assert_eq!(engine.work_category, "focus");
        assert_eq!(config.checkpoint_interval(), Duration::from_secs(1));
        Ok(())
    }

    #[test]
    fn test_invalid_value_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            Config::default_path(dir.path()),
            "max_write_attempts = \"many\"\n",
        )?;

        assert!(Config::load_from(dir.path(), None).is_err());
        Ok(())
    }
}
