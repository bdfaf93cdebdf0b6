use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{
    cache::{DEFAULT_TTL_SECS, default_ttl},
    provider::ProviderId,
};

/// Environment variable that switches on offline mock data.
pub const MOCK_DATA_ENV: &str = "WEATHER_USE_MOCK_DATA";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MOCK_DELAY_MS: u64 = 800;

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Overrides the provider's public endpoint, e.g. for a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Optional default provider id, e.g. "openweather" or "weatherapi".
    pub default_provider: Option<String>,

    /// Serve fixed per-city observations instead of calling a provider.
    #[serde(default)]
    pub mock_data: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Simulated latency of mock mode, so loading states stay visible.
    #[serde(default = "default_mock_delay_ms")]
    pub mock_delay_ms: u64,

    /// Must stay last: TOML emits plain values before tables.
    ///
    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_mock_delay_ms() -> u64 {
    DEFAULT_MOCK_DELAY_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: None,
            mock_data: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_TTL_SECS,
            mock_delay_ms: DEFAULT_MOCK_DELAY_MS,
            providers: HashMap::new(),
        }
    }
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "No default provider configured.\n\
                 Hint: run `weather configure <provider>` \
                 (e.g. `weather configure openweather`) first."
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
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

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "city-weather", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the key-value file that remembers the selected city.
    pub fn state_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("state.json"))
    }

    /// Apply overrides read through `lookup` (normally `std::env::var`).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(MOCK_DATA_ENV) {
            let value = value.trim().to_lowercase();
            self.mock_data = value == "true" || value == "1";
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Convenience helper: set/replace a provider API key and optionally set default provider.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        let base_url = self
            .providers
            .remove(provider_id.as_str())
            .and_then(|existing| existing.base_url);
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { api_key, base_url });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Set or clear the endpoint override of an already configured provider.
    pub fn set_provider_base_url(&mut self, provider_id: ProviderId, base_url: Option<String>) {
        if let Some(cfg) = self.providers.get_mut(provider_id.as_str()) {
            cfg.base_url = base_url.filter(|url| !url.trim().is_empty());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id).map(|cfg| cfg.api_key.as_str())
    }

    pub fn provider_base_url(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id)
            .and_then(|cfg| cfg.base_url.as_deref())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        i64::try_from(self.cache_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(default_ttl)
    }

    pub fn mock_delay(&self) -> Duration {
        Duration::from_millis(self.mock_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn default_provider_id_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_provider_id().unwrap_err();

        assert!(err.to_string().contains("No default provider configured"));
    }

    #[test]
    fn set_api_key_and_default_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::OpenWeather);

        let key = cfg.provider_api_key(ProviderId::OpenWeather);
        assert_eq!(key, Some("OPEN_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::OpenWeather));
        assert!(!cfg.is_provider_configured(ProviderId::WeatherApi));
    }

    #[test]
    fn upsert_does_not_override_existing_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "WEATHER_KEY".into());

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::OpenWeather);

        cfg.set_default_provider(ProviderId::WeatherApi);
        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::WeatherApi);
    }

    #[test]
    fn upsert_keeps_base_url_override() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "OLD".into());
        cfg.set_provider_base_url(ProviderId::WeatherApi, Some("http://proxy.local".into()));

        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "NEW".into());

        assert_eq!(cfg.provider_api_key(ProviderId::WeatherApi), Some("NEW"));
        assert_eq!(
            cfg.provider_base_url(ProviderId::WeatherApi),
            Some("http://proxy.local")
        );
    }

    #[test]
    fn blank_base_url_clears_override() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "KEY".into());
        cfg.set_provider_base_url(ProviderId::OpenWeather, Some("  ".into()));
        assert_eq!(cfg.provider_base_url(ProviderId::OpenWeather), None);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = Config::from_toml(
            r#"
            default_provider = "openweather"

            [providers.openweather]
            api_key = "abc"
            "#,
        )
        .expect("config should parse");

        assert!(!cfg.mock_data);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.cache_ttl(), chrono::Duration::minutes(15));
        assert_eq!(cfg.mock_delay(), Duration::from_millis(800));
        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("abc"));
    }

    #[test]
    fn toml_roundtrip_keeps_settings() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "KEY".into());
        cfg.mock_data = true;
        cfg.cache_ttl_secs = 60;

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let back = Config::from_toml(&text).expect("parse");

        assert!(back.mock_data);
        assert_eq!(back.cache_ttl_secs, 60);
        assert_eq!(back.default_provider_id().unwrap(), ProviderId::WeatherApi);
    }

    #[test]
    fn env_override_enables_mock_mode() {
        let mut cfg = Config::default();
        cfg.apply_overrides(|key| (key == MOCK_DATA_ENV).then(|| "TRUE".to_string()));
        assert!(cfg.mock_data);

        cfg.apply_overrides(|key| (key == MOCK_DATA_ENV).then(|| "false".to_string()));
        assert!(!cfg.mock_data);
    }

    #[test]
    fn absent_env_override_keeps_file_value() {
        let mut cfg = Config {
            mock_data: true,
            ..Config::default()
        };
        cfg.apply_overrides(|_| None);
        assert!(cfg.mock_data);
    }
}
