use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

/// Environment variable consulted before the config file.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// OpenWeatherMap API key. `OPENWEATHER_API_KEY` takes precedence when
    /// set in the environment.
    pub api_key: Option<String>,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "skycast", "skycast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// Resolve the credential: environment first, then config file. Empty
    /// values count as absent.
    pub fn resolved_api_key(&self) -> Option<String> {
        pick_key(std::env::var(API_KEY_ENV).ok(), self.api_key.clone())
    }
}

fn pick_key(env: Option<String>, file: Option<String>) -> Option<String> {
    env.filter(|k| !k.is_empty()).or(file.filter(|k| !k.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_key_wins_over_file_key() {
        let key = pick_key(Some("ENV_KEY".into()), Some("FILE_KEY".into()));
        assert_eq!(key.as_deref(), Some("ENV_KEY"));
    }

    #[test]
    fn file_key_used_when_env_absent_or_empty() {
        assert_eq!(
            pick_key(None, Some("FILE_KEY".into())).as_deref(),
            Some("FILE_KEY")
        );
        assert_eq!(
            pick_key(Some(String::new()), Some("FILE_KEY".into())).as_deref(),
            Some("FILE_KEY")
        );
    }

    #[test]
    fn missing_key_resolves_to_none() {
        assert_eq!(pick_key(None, None), None);
        assert_eq!(pick_key(Some(String::new()), Some(String::new())), None);
    }

    #[test]
    fn set_api_key_round_trips_through_toml() {
        let mut cfg = Config::default();
        cfg.set_api_key("OPEN_KEY".into());

        let serialized = toml::to_string_pretty(&cfg).expect("config serializes");
        let parsed: Config = toml::from_str(&serialized).expect("config parses");
        assert_eq!(parsed.api_key.as_deref(), Some("OPEN_KEY"));
    }
}
