//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. User config (~/.backstop/config.yaml)
//! 3. Environment variables (BACKSTOP_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, ErrorKind, Result};
use crate::utils::get_home_dir;
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::str::FromStr;

use super::types::{RetryConfig, RetryOverrides};

/// User config file: every field is optional and layered over the embedded defaults
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigOverlay {
    #[serde(default)]
    defaults: RetryOverrides,
    #[serde(default)]
    actions: HashMap<String, RetryOverrides>,
}

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

/// Name of the user configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

const DEFAULTS_FILE_NAME: &str = "retry-defaults.yaml";

/// Configuration hierarchy loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the standard config directory (~/.backstop)
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir()?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    fn default_config_dir() -> Result<Utf8PathBuf> {
        let home = get_home_dir()?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::config(format!("Home directory is not UTF-8: {}", p.display())))?;
        Ok(home.join(".backstop"))
    }

    /// Load the retry configuration with hierarchical precedence
    pub fn load(&self) -> Result<RetryConfig> {
        let mut config = Self::load_embedded_config::<RetryConfig>(DEFAULTS_FILE_NAME)?;

        let config_path = self.config_path();
        if config_path.exists() {
            let file_config = self.load_yaml_file::<ConfigOverlay>(&config_path)?;
            config = Self::merge(config, file_config);
        }

        Self::apply_env_overrides(config)
    }

    /// Text of the built-in defaults file, used to seed a user config
    pub fn embedded_defaults_yaml() -> Result<String> {
        let embedded_file = EmbeddedConfigs::get(DEFAULTS_FILE_NAME).ok_or_else(|| {
            Error::config(format!("Embedded config not found: {}", DEFAULTS_FILE_NAME))
        })?;
        String::from_utf8(embedded_file.data.into_owned())
            .map_err(|e| Error::wrap(ErrorKind::Config, e, "Invalid UTF-8 in embedded defaults"))
    }

    /// Load an embedded configuration file
    fn load_embedded_config<T: DeserializeOwned>(filename: &str) -> Result<T> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::wrap(
                ErrorKind::Config,
                e,
                format!("Failed to parse embedded config {}", filename),
            )
        })
    }

    /// Load a YAML file and parse it
    fn load_yaml_file<T: DeserializeOwned>(&self, path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content).map_err(|e| {
            Error::wrap(
                ErrorKind::Config,
                e,
                format!("Failed to parse {}", path),
            )
        })
    }

    /// Merge a user overlay into the base config
    ///
    /// Default fields the overlay leaves out keep their base values; action
    /// entries are replaced by key.
    fn merge(mut base: RetryConfig, overlay: ConfigOverlay) -> RetryConfig {
        for (action, overrides) in overlay.actions {
            base.actions.insert(action, overrides);
        }
        base.defaults = overlay.defaults.apply(&base.defaults);
        base
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: RetryConfig) -> Result<RetryConfig> {
        let defaults = &mut config.defaults;

        if let Some(val) = env_value("BACKSTOP_MAX_ATTEMPTS")? {
            defaults.max_attempts = val;
        }
        if let Some(val) = env_value("BACKSTOP_TIMEOUT_SECS")? {
            defaults.timeout_secs = val;
        }
        if let Some(val) = env_value::<f64>("BACKSTOP_BACKOFF_FACTOR")? {
            if !val.is_finite() || val < 1.0 {
                return Err(Error::config(
                    "BACKSTOP_BACKOFF_FACTOR must be a number of at least 1.0",
                ));
            }
            defaults.backoff_factor = val;
        }
        if let Some(val) = env_value("BACKSTOP_INITIAL_DELAY_MS")? {
            defaults.initial_delay_ms = val;
        }
        if let Some(val) = env_value("BACKSTOP_MAX_DELAY_MS")? {
            defaults.max_delay_ms = val;
        }
        if let Ok(val) = env::var("BACKSTOP_JITTER") {
            defaults.jitter = parse_bool(&val).ok_or_else(|| {
                Error::config("BACKSTOP_JITTER must be one of true, false, 1, 0")
            })?;
        }

        Ok(config)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Path of the user configuration file
    pub fn config_path(&self) -> Utf8PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }
}

fn env_value<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::config(format!("{} must be a valid number", name))),
        Err(_) => Ok(None),
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn create_temp_loader() -> (ConfigLoader, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_dir =
            Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).expect("Invalid UTF-8 path");
        let loader = ConfigLoader::with_dir(config_dir);
        (loader, temp_dir)
    }

    #[test]
    #[serial]
    fn test_load_embedded_defaults() {
        let (loader, _temp) = create_temp_loader();
        let config = loader.load().unwrap();

        assert_eq!(config.defaults.max_attempts, 30);
        assert_eq!(config.defaults.timeout_secs, 300);
        assert_eq!(config.defaults.initial_delay_ms, 1000);
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let (loader, _temp) = create_temp_loader();

        let config_content = r#"
defaults:
  max-attempts: 7
  backoff-factor: 1.5
actions:
  uploading image:
    timeout-secs: 3600
"#;
        fs::write(loader.config_path(), config_content).unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.defaults.max_attempts, 7);
        assert_eq!(config.defaults.backoff_factor, 1.5);
        assert_eq!(config.for_action("uploading image").timeout_secs, 3600);
    }

    #[test]
    #[serial]
    fn test_invalid_file_is_config_error() {
        let (loader, _temp) = create_temp_loader();
        fs::write(loader.config_path(), "defaults: [not, a, map]").unwrap();

        let err = loader.load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let (loader, _temp) = create_temp_loader();

        env::set_var("BACKSTOP_MAX_ATTEMPTS", "4");
        env::set_var("BACKSTOP_TIMEOUT_SECS", "90");
        env::set_var("BACKSTOP_JITTER", "true");

        let config = loader.load();

        env::remove_var("BACKSTOP_MAX_ATTEMPTS");
        env::remove_var("BACKSTOP_TIMEOUT_SECS");
        env::remove_var("BACKSTOP_JITTER");

        let config = config.unwrap();
        assert_eq!(config.defaults.max_attempts, 4);
        assert_eq!(config.defaults.timeout_secs, 90);
        assert!(config.defaults.jitter);
    }

    #[test]
    #[serial]
    fn test_invalid_env_value() {
        let (loader, _temp) = create_temp_loader();

        env::set_var("BACKSTOP_MAX_ATTEMPTS", "many");
        let result = loader.load();
        env::remove_var("BACKSTOP_MAX_ATTEMPTS");

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("BACKSTOP_MAX_ATTEMPTS"));
    }

    #[test]
    #[serial]
    fn test_backoff_factor_below_one_rejected() {
        let (loader, _temp) = create_temp_loader();

        env::set_var("BACKSTOP_BACKOFF_FACTOR", "0.5");
        let result = loader.load();
        env::remove_var("BACKSTOP_BACKOFF_FACTOR");

        assert!(result.is_err());
    }

    #[test]
    fn test_merge_keeps_unset_base_fields_and_merges_actions() {
        let mut base = RetryConfig::default();
        base.defaults.timeout_secs = 42;
        base.defaults.jitter = true;
        base.actions.insert("a".to_string(), Default::default());

        let overlay: ConfigOverlay = serde_yaml_ng::from_str(
            "defaults:\n  max-attempts: 2\nactions:\n  b:\n    jitter: false\n",
        )
        .unwrap();

        let merged = ConfigLoader::merge(base, overlay);
        assert_eq!(merged.defaults.max_attempts, 2);
        assert_eq!(merged.defaults.timeout_secs, 42);
        assert!(merged.defaults.jitter);
        assert!(merged.actions.contains_key("a"));
        assert_eq!(merged.actions["b"].jitter, Some(false));
    }

    #[test]
    #[serial]
    fn test_partial_file_keeps_embedded_values() {
        let (loader, _temp) = create_temp_loader();
        fs::write(loader.config_path(), "defaults:\n  jitter: true\n").unwrap();

        let config = loader.load().unwrap();
        let embedded: RetryConfig =
            serde_yaml_ng::from_str(&ConfigLoader::embedded_defaults_yaml().unwrap()).unwrap();
        assert!(config.defaults.jitter);
        assert_eq!(config.defaults.max_attempts, embedded.defaults.max_attempts);
        assert_eq!(config.defaults.max_delay_ms, embedded.defaults.max_delay_ms);
    }

    #[test]
    fn test_embedded_defaults_round_trip_through_file() {
        let yaml = ConfigLoader::embedded_defaults_yaml().unwrap();
        assert!(yaml.contains("max-attempts: 30"));

        let parsed: RetryConfig = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(parsed.defaults, crate::config::RetryDefaults::default());
        assert!(parsed.actions.is_empty());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
