//! Run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::automation::BrowserEngine;
use crate::error::{Error, Result};
use crate::session::SessionConfig;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "stepwright.toml";

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Browser engine name: `firefox`, `edge`, anything else is Chromium
    pub browser: String,

    /// Directory searched for `.feature` files
    pub features_dir: PathBuf,

    /// Where `run-report.json` is written
    pub output_dir: PathBuf,

    /// Default wait used by page objects, in milliseconds
    pub default_timeout_ms: u64,

    /// Site under test, available to steps through the run config
    pub base_url: Option<String>,

    /// Playwright bridge settings
    pub playwright: PlaywrightConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            browser: "chromium".to_string(),
            features_dir: PathBuf::from("features"),
            output_dir: PathBuf::from("test-results"),
            default_timeout_ms: 10_000,
            base_url: None,
            playwright: PlaywrightConfig::default(),
        }
    }
}

/// Playwright bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    /// Path to the node binary
    pub node_binary: String,

    /// Module passed to `require()`, e.g. `playwright` or an absolute path
    pub module: String,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            node_binary: "node".to_string(),
            module: "playwright".to_string(),
        }
    }
}

impl RunConfig {
    /// Load configuration from file, falling back to defaults if it is missing
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ms == 0 {
            return Err(Error::Config("default_timeout_ms must be positive".to_string()));
        }
        if self.playwright.node_binary.trim().is_empty() {
            return Err(Error::Config("playwright.node_binary is empty".to_string()));
        }
        Ok(())
    }

    pub fn engine(&self) -> BrowserEngine {
        BrowserEngine::from_name(&self.browser)
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig::from_browser_name(&self.browser)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.engine(), BrowserEngine::Chromium);
        assert_eq!(config.default_timeout(), Duration::from_secs(10));
        assert_eq!(config.playwright.node_binary, "node");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "browser = \"firefox\"\n\n[playwright]\nmodule = \"/opt/pw/node_modules/playwright\"\n",
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.engine(), BrowserEngine::Firefox);
        assert_eq!(config.playwright.module, "/opt/pw/node_modules/playwright");
        assert_eq!(config.playwright.node_binary, "node");
        assert_eq!(config.features_dir, PathBuf::from("features"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = RunConfig {
            browser: "edge".to_string(),
            base_url: Some("https://www.northumbria.nhs.uk/".to_string()),
            ..RunConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = RunConfig::load(&path).unwrap();
        assert_eq!(loaded.engine(), BrowserEngine::Edge);
        assert_eq!(loaded.base_url, config.base_url);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "default_timeout_ms = 0\n").unwrap();
        assert!(matches!(RunConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_file_is_toml_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "browser = [").unwrap();
        assert!(matches!(RunConfig::load(&path), Err(Error::Toml(_))));
    }
}
