use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ProjectConfig;
use crate::ports::BasePorts;

pub const CONFIG_FILE_NAMES: [&str; 4] =
    ["devdeck.yml", "devdeck.yaml", ".devdeck.yml", ".devdeck.yaml"];

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_poll_interval() -> u64 {
    5000
}
fn default_frontend_timeout() -> u64 {
    2000
}

/// Launcher settings, normally read from `devdeck.yml`
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LauncherConfig {
    /// Directory holding the key-value store (defaults to `~/.devdeck`)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Host the health monitor probes
    #[serde(default = "default_host")]
    pub host: String,

    /// Milliseconds between health ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Upper bound on the frontend existence probe
    #[serde(default = "default_frontend_timeout")]
    pub frontend_timeout_ms: u64,

    /// Upper bound on the backend health request; unset means no override
    #[serde(default)]
    pub backend_timeout_ms: Option<u64>,

    #[serde(default)]
    pub base_ports: BasePorts,

    /// Built-in projects, shown before user-created ones
    #[serde(default)]
    pub defaults: Vec<ProjectConfig>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            host: default_host(),
            poll_interval_ms: default_poll_interval(),
            frontend_timeout_ms: default_frontend_timeout(),
            backend_timeout_ms: None,
            base_ports: BasePorts::default(),
            defaults: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("poll_interval_ms must be greater than zero")]
    ZeroInterval,
    #[error("default project id '{id}' appears more than once")]
    DuplicateDefault { id: String },
    #[error("default project '{id}' has a zero port")]
    ZeroPort { id: String },
}

impl LauncherConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: LauncherConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Find a config file via `DEVDECK_CONFIG` or by walking up from `start_dir`.
    ///
    /// Returns the built-in defaults (and no path) when nothing is found.
    pub fn discover(start_dir: &Path) -> Result<(Option<PathBuf>, Self), ConfigError> {
        if let Ok(env_path) = std::env::var("DEVDECK_CONFIG") {
            let path = PathBuf::from(env_path);
            if path.exists() {
                let config = Self::load(&path)?;
                return Ok((Some(path), config));
            }
        }

        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            for name in &CONFIG_FILE_NAMES {
                let path = current.join(name);
                if path.exists() {
                    let config = Self::load(&path)?;
                    return Ok((Some(path), config));
                }
            }
            dir = current.parent();
        }

        Ok((None, Self::default()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        let mut seen = BTreeSet::new();
        for project in &self.defaults {
            if !seen.insert(project.id.as_str()) {
                return Err(ConfigError::DuplicateDefault {
                    id: project.id.clone(),
                });
            }
            if project.frontend.port == 0 || project.backend.port == 0 {
                return Err(ConfigError::ZeroPort {
                    id: project.id.clone(),
                });
            }
        }

        Ok(())
    }

    /// `data_dir`, else `$HOME/.devdeck`, else `./.devdeck`
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(|home| PathBuf::from(home).join(".devdeck"))
            .unwrap_or_else(|| PathBuf::from(".devdeck"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn frontend_timeout(&self) -> Duration {
        Duration::from_millis(self.frontend_timeout_ms)
    }

    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = LauncherConfig::from_str("{}").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.frontend_timeout(), Duration::from_secs(2));
        assert_eq!(config.backend_timeout(), None);
        assert_eq!(config.base_ports, BasePorts::default());
        assert!(config.defaults.is_empty());
    }

    #[test]
    fn test_parse_defaults() {
        let yaml = r#"
host: localhost
base_ports:
  frontend: 3000
defaults:
  - id: shop
    name: Shop
    frontend:
      port: 5173
      path: /src/shop/frontend
      command: npm run dev
    backend:
      port: 8000
      path: /src/shop/backend
      command: uvicorn main:app
      healthEndpoint: /health
      env:
        DEBUG: "1"
"#;
        let config = LauncherConfig::from_str(yaml).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.base_ports.frontend, 3000);
        assert_eq!(config.base_ports.backend, 8000);
        assert_eq!(config.defaults.len(), 1);
        let shop = &config.defaults[0];
        assert_eq!(shop.description, "");
        assert_eq!(shop.backend.health_endpoint, "/health");
        assert_eq!(
            shop.backend.env.as_ref().and_then(|e| e.get("DEBUG")),
            Some(&"1".to_string())
        );
    }

    #[test]
    fn test_duplicate_default_rejected() {
        let yaml = r#"
defaults:
  - id: a
    name: A
    frontend: { port: 5173, path: /p, command: x }
    backend: { port: 8000, path: /p, command: y, healthEndpoint: /health }
  - id: a
    name: A again
    frontend: { port: 5174, path: /p, command: x }
    backend: { port: 8001, path: /p, command: y, healthEndpoint: /health }
"#;
        let result = LauncherConfig::from_str(yaml);
        assert!(matches!(result, Err(ConfigError::DuplicateDefault { .. })));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = LauncherConfig::from_str("poll_interval_ms: 0");
        assert!(matches!(result, Err(ConfigError::ZeroInterval)));
    }

    #[test]
    fn test_discover_walks_parents() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join("devdeck.yml"), "poll_interval_ms: 1000\n").unwrap();

        let (path, config) = LauncherConfig::discover(&nested).unwrap();
        assert_eq!(path, Some(root.path().join("devdeck.yml")));
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_explicit_data_dir() {
        let config = LauncherConfig::from_str("data_dir: /var/lib/devdeck").unwrap();
        assert_eq!(config.resolved_data_dir(), PathBuf::from("/var/lib/devdeck"));
    }
}
