use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{assistant::OllamaConfig, context::ContextConfig};

const DEFAULT_CONFIG_FILE: &str = "wheeliemap.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub bind_addr: String,
    pub database_path: PathBuf,
    /// Empty means any origin may call the API.
    pub allowed_origins: Vec<String>,
    pub backend: OllamaConfig,
    pub context: ContextConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7000".into(),
            database_path: PathBuf::from("reports.db"),
            allowed_origins: Vec::new(),
            backend: OllamaConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

impl AppSettings {
    /// Defaults overlaid with the config file (if any) and then the environment.
    pub fn from_env() -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();

        let explicit = lookup("WHEELIEMAP_CONFIG").map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut settings = if explicit.is_some() || path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        settings.apply_overrides(lookup)?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(addr) = non_empty("WHEELIEMAP_BIND") {
            self.bind_addr = addr;
        }
        if let Some(path) = non_empty("WHEELIEMAP_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(url) = non_empty("WHEELIEMAP_OLLAMA_URL") {
            self.backend.base_url = url;
        }
        if let Some(model) = non_empty("WHEELIEMAP_OLLAMA_MODEL") {
            self.backend.model = model;
        }
        if let Some(raw) = non_empty("WHEELIEMAP_OLLAMA_TIMEOUT_SECS") {
            self.backend.timeout_secs = raw
                .parse()
                .with_context(|| format!("WHEELIEMAP_OLLAMA_TIMEOUT_SECS must be a whole number, got '{raw}'"))?;
        }

        Ok(())
    }
}
