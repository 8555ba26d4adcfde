//! Project definitions and derived health status.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub type ProjectId = String;

/// Colours handed out to new projects. Cosmetic only.
pub const PALETTE: &[&str] = &[
    "#3b82f6", "#22c55e", "#a855f7", "#f97316", "#ec4899", "#06b6d4", "#eab308", "#ef4444",
];

/// Which half of a project a service is
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Frontend,
    Backend,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Frontend => write!(f, "frontend"),
            ServiceKind::Backend => write!(f, "backend"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendConfig {
    pub port: u16,
    pub path: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub port: u16,
    pub path: String,
    pub command: String,
    /// Path component probed for health, e.g. `/health`
    pub health_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

/// A registered project: one frontend process and one backend process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    pub frontend: FrontendConfig,
    pub backend: BackendConfig,
}

impl ProjectConfig {
    /// Derive a project id from a display name.
    ///
    /// Lowercases, then maps every character that is not an ASCII letter or
    /// digit to `-`. Runs of separators are kept as-is.
    pub fn slug(name: &str) -> ProjectId {
        name.to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect()
    }

    pub fn random_color() -> String {
        PALETTE
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(PALETTE[0])
            .to_string()
    }

    pub fn port(&self, kind: ServiceKind) -> u16 {
        match kind {
            ServiceKind::Frontend => self.frontend.port,
            ServiceKind::Backend => self.backend.port,
        }
    }

    pub fn path(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::Frontend => &self.frontend.path,
            ServiceKind::Backend => &self.backend.path,
        }
    }

    pub fn command(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::Frontend => &self.frontend.command,
            ServiceKind::Backend => &self.backend.command,
        }
    }

    pub fn env(&self, kind: ServiceKind) -> Option<&BTreeMap<String, String>> {
        match kind {
            ServiceKind::Frontend => self.frontend.env.as_ref(),
            ServiceKind::Backend => self.backend.env.as_ref(),
        }
    }

    pub fn frontend_url(&self, host: &str) -> String {
        format!("http://{}:{}/", host, self.frontend.port)
    }

    pub fn backend_health_url(&self, host: &str) -> String {
        let endpoint = &self.backend.health_endpoint;
        if endpoint.starts_with('/') {
            format!("http://{}:{}{}", host, self.backend.port, endpoint)
        } else {
            format!("http://{}:{}/{}", host, self.backend.port, endpoint)
        }
    }
}

/// A frontend/backend port pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPair {
    pub frontend: u16,
    pub backend: u16,
}

/// Result of one check of one service. Never carried over between ticks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    /// Something answered on the port
    pub running: bool,
    pub healthy: bool,
    pub last_check: Option<SystemTime>,
}

impl ServiceStatus {
    pub fn unchecked() -> Self {
        Self {
            running: false,
            healthy: false,
            last_check: None,
        }
    }

    pub fn label(&self) -> &'static str {
        match (self.running, self.healthy) {
            (_, true) => "healthy",
            (true, false) => "unhealthy",
            (false, false) => "down",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectStatus {
    pub frontend: ServiceStatus,
    pub backend: ServiceStatus,
}

impl ProjectStatus {
    pub fn get(&self, kind: ServiceKind) -> &ServiceStatus {
        match kind {
            ServiceKind::Frontend => &self.frontend,
            ServiceKind::Backend => &self.backend,
        }
    }
}

/// All statuses produced by one health tick
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub tick: u64,
    pub statuses: BTreeMap<ProjectId, ProjectStatus>,
}

impl StatusSnapshot {
    pub fn get(&self, id: &str) -> Option<&ProjectStatus> {
        self.statuses.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

/// Fixture shared by the crate's tests
#[cfg(test)]
pub(crate) fn sample(id: &str, fe: u16, be: u16) -> ProjectConfig {
    ProjectConfig {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        color: PALETTE[0].to_string(),
        frontend: FrontendConfig {
            port: fe,
            path: format!("/tmp/{}/frontend", id),
            command: "npm run dev".into(),
            env: None,
        },
        backend: BackendConfig {
            port: be,
            path: format!("/tmp/{}/backend", id),
            command: "uvicorn main:app".into(),
            health_endpoint: "/health".into(),
            env: None,
        },
    }
}
