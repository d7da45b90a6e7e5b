use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub web: WebConfig,
    pub geoip: GeoipConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoipConfig {
    /// Directory holding the database file and its checksum sidecar
    pub data_dir: PathBuf,
    /// MaxMind edition identifier, e.g. "GeoLite2-Country" or "GeoLite2-City"
    pub edition: String,
    /// MaxMind license key used to authenticate downloads
    pub license_key: String,
    /// Maximum number of decoded records kept in the lookup cache
    pub cache_size: u64,
    /// How often the background scheduler checks for database updates
    pub refresh_interval_hours: u64,
    /// Download endpoint; only overridden in tests
    pub download_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            geoip: GeoipConfig {
                data_dir: PathBuf::from("./data/geoip"),
                edition: "GeoLite2-Country".to_string(),
                license_key: String::new(),
                cache_size: 1024,
                refresh_interval_hours: 168,
                download_url: "https://download.maxmind.com/app/geoip_download".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::create_dir_all(&default_config.geoip.data_dir)?;
            std::fs::write(&config_file, contents)?;
            Ok(default_config)
        }
    }
}

impl GeoipConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_hours * 3600)
    }
}
