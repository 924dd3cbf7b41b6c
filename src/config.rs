//! TOML configuration.
//!
//! Everything that used to be process-wide state in earlier tooling —
//! endpoints, the rate-limit cooldown, the per-source gender vocabulary
//! tables, the placeholder for unknown names — is configuration data
//! injected at construction. The file is optional: compiled-in defaults
//! match the test registry setup.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_username")]
    pub username: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            username: default_username(),
        }
    }
}

fn default_server() -> String {
    "https://mptest.kumu.swiss".to_string()
}
fn default_username() -> String {
    "SimpleUserTest".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_getty_endpoint")]
    pub getty_endpoint: String,
    #[serde(default = "default_wikidata_endpoint")]
    pub wikidata_endpoint: String,
    /// Fixed cooldown before the single rate-limit retry.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Getty gender vocabulary (English labels to registry values).
    #[serde(default = "default_getty_genders")]
    pub getty_genders: BTreeMap<String, String>,
    /// Wikidata gender labels; unknown labels pass through unchanged.
    /// Kept separate from the Getty table — the two vocabularies do not
    /// share a key set.
    #[serde(default)]
    pub wikidata_genders: BTreeMap<String, String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            getty_endpoint: default_getty_endpoint(),
            wikidata_endpoint: default_wikidata_endpoint(),
            cooldown_secs: default_cooldown_secs(),
            getty_genders: default_getty_genders(),
            wikidata_genders: BTreeMap::new(),
        }
    }
}

fn default_getty_endpoint() -> String {
    "https://vocab.getty.edu/sparql.json".to_string()
}
fn default_wikidata_endpoint() -> String {
    "https://query.wikidata.org/sparql".to_string()
}
fn default_cooldown_secs() -> u64 {
    70
}

pub fn default_getty_genders() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("male".to_string(), "männlich".to_string()),
        ("female".to_string(), "weiblich".to_string()),
        ("divers".to_string(), "divers".to_string()),
    ])
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Substitute name for input cells starting with "Unknown".
    #[serde(default = "default_unknown_placeholder")]
    pub unknown_placeholder: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            unknown_placeholder: default_unknown_placeholder(),
        }
    }
}

fn default_unknown_placeholder() -> String {
    "unbekannt".to_string()
}

/// Load the configuration, falling back to defaults when the file does
/// not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if !config.registry.server.starts_with("http") {
        bail!("registry.server must be an http(s) address");
    }
    if config.registry.username.is_empty() {
        bail!("registry.username must not be empty");
    }
    if config.sources.cooldown_secs == 0 {
        bail!("sources.cooldown_secs must be >= 1");
    }
    Ok(())
}
