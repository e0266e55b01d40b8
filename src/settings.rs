use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Optional settings, merged from the config file and `IPAPK_*` variables
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Preferred Android icon density in dpi
    pub density: Option<u16>,
    /// Ask `aapt dump badging` for the launchable activity label
    pub badging: bool,
    /// The `aapt` program to run
    pub aapt: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            density: None,
            badging: true,
            aapt: "aapt".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: &Path, env: Environment) -> Result<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(env)
            .build()
            .map_err(|e| anyhow!("Failed to load config: {}", e))?
            .try_deserialize()
            .map_err(|e| anyhow!("Invalid config: {}", e))
    }
}

fn environment() -> Environment {
    Environment::with_prefix("IPAPK").try_parsing(true)
}
