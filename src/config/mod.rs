mod basic;
mod upstream;

pub use basic::BasicConfig;
pub use upstream::UpstreamConfig;

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::LazyLock};

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Upstream and OAuth settings (see `upstream` table in config.toml).
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";

impl Config {
    /// Builds a Figment that merges defaults and a config TOML file.
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        }
    }

    /// Loads configuration by merging defaults and `config.toml` if present.
    ///
    /// Does **not** validate required fields like `basic.castor_key`; the
    /// server binary goes through `Config::from_toml()` instead.
    pub fn from_optional_toml() -> Self {
        Self::figment().extract().unwrap_or_else(|err| {
            panic!("failed to extract configuration (defaults + optional config.toml): {err}")
        })
    }

    /// Loads configuration from the TOML file (with defaults) and validates
    /// required fields.
    pub fn from_toml() -> Self {
        if !PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            panic!("config file not found: {DEFAULT_CONFIG_FILE}");
        }
        let cfg: Self = Self::figment().extract().unwrap_or_else(|err| {
            panic!("failed to extract configuration from {DEFAULT_CONFIG_FILE}: {err}")
        });
        if cfg.basic.castor_key.trim().is_empty() {
            panic!("basic.castor_key must be set and non-empty");
        }
        cfg
    }
}

/// Global, lazily-initialized configuration instance.
pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::from_optional_toml);
