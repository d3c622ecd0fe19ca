use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};
use tracing::{info, warn};

fn default_log_level() -> String {
    "info".to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_search_debounce() -> u64 {
    300 // ms
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_search_debounce")]
    pub search_debounce_ms: u64,
    /// Organization whose requests are shown when none is given explicitly.
    #[serde(default)]
    pub organization_id: Option<String>,

    #[serde(default)]
    pub trust_invalid_server_cert: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout(),
            search_debounce_ms: default_search_debounce(),
            organization_id: None,
            trust_invalid_server_cert: false,
        }
    }
}

impl Config {
    pub fn get_server_url(&self) -> Result<String> {
        match &self.api_url {
            Some(url) => Ok(url.trim_end_matches('/').to_string()),
            None => Err(anyhow!(
                "API URL not set. Run `reqctl login --api-url <url>` to set it"
            )),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let contents =
                fs::read_to_string(config_path).context("Failed to read config file")?;
            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            Ok(config)
        } else {
            warn!("Config file not found, using defaults");
            let config = Self::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        let config_dir = config_path
            .parent()
            .context("Failed to get config directory")?;

        fs::create_dir_all(config_dir).context("Failed to create config directory")?;

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, contents).context("Failed to write config file")?;

        info!("Config saved to: {:?}", config_path);
        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("reqctl").join("config.json"))
    }
}
