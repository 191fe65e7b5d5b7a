use crate::domain::MappingError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the mapping engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lifetime of a cache entry, and the maximum age of a cache snapshot
    pub cache_ttl_secs: u64,
    pub max_retries: u32,
    /// Backoff before retry n is `retry_base_delay_ms * 2^n`
    pub retry_base_delay_ms: u64,
    pub fuzzy_threshold: f64,
    pub auto_learn_threshold: i64,
    /// Suggested confidence must exceed this to auto-learn
    pub auto_learn_min_confidence: f64,
    pub text_search_limit: usize,
    pub candidate_search_limit: usize,
    pub stats_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            max_retries: 3,
            retry_base_delay_ms: 100,
            fuzzy_threshold: 0.8,
            auto_learn_threshold: 3,
            auto_learn_min_confidence: 0.5,
            text_search_limit: 10,
            candidate_search_limit: 5,
            stats_queue_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn validate(&self) -> Result<(), MappingError> {
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(MappingError::InvalidInput(format!(
                "fuzzy_threshold must be within 0..=1, got {}",
                self.fuzzy_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.auto_learn_min_confidence) {
            return Err(MappingError::InvalidInput(format!(
                "auto_learn_min_confidence must be within 0..=1, got {}",
                self.auto_learn_min_confidence
            )));
        }
        if self.auto_learn_threshold < 1 {
            return Err(MappingError::InvalidInput(
                "auto_learn_threshold must be at least 1".into(),
            ));
        }
        if self.stats_queue_capacity == 0 {
            return Err(MappingError::InvalidInput(
                "stats_queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Applies `CATMAP_*` environment overrides. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse("CATMAP_CACHE_TTL") {
            self.cache_ttl_secs = v;
        }
        if let Some(v) = env_parse("CATMAP_MAX_RETRIES") {
            self.max_retries = v;
        }
        if let Some(v) = env_parse("CATMAP_FUZZY_THRESHOLD") {
            self.fuzzy_threshold = v;
        }
        if let Some(v) = env_parse("CATMAP_AUTO_LEARN_THRESHOLD") {
            self.auto_learn_threshold = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring unparseable {}={:?}", name, raw);
            None
        }
    }
}

/// Loads the config file (or defaults) and applies environment overrides.
pub fn load_config() -> EngineConfig {
    let mut config = read_config_file(&config_path());
    config.apply_env_overrides();
    config
}

fn read_config_file(path: &std::path::Path) -> EngineConfig {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return EngineConfig::default();
    };
    match toml::from_str(&contents) {
        Ok(config) => config,
        Err(err) => {
            log::warn!(
                "Invalid config at {}, using defaults: {}",
                path.display(),
                err
            );
            EngineConfig::default()
        }
    }
}

pub fn save_config(config: &EngineConfig) -> std::io::Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config).unwrap_or_default();
    std::fs::write(path, contents)
}

fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CATMAP_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    app_data_dir().join("config.toml")
}

pub fn app_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var("CATMAP_DATA_HOME") {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = home::home_dir() {
            return home
                .join("Library")
                .join("Application Support")
                .join("catmap");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("catmap");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("catmap");
        }
        if let Some(home) = home::home_dir() {
            return home.join(".local").join("share").join("catmap");
        }
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".catmap")
}
