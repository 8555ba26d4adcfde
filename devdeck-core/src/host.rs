//! Contracts for the collaborators the launcher drives but does not own
//!
//! The process host materializes project folders and starts/stops service
//! commands; the browser opener shows a running frontend. Both are fallible
//! and neither is retried by the launcher.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{PortPair, ServiceKind};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("path does not exist: {}", .path.display())]
    MissingPath { path: PathBuf },
    #[error("{kind} is already running")]
    AlreadyRunning { kind: ServiceKind },
    #[error("{kind} is not running")]
    NotRunning { kind: ServiceKind },
    #[error("failed to start {kind}: {message}")]
    SpawnFailed { kind: ServiceKind, message: String },
    #[error("failed to stop {kind}: {message}")]
    StopFailed { kind: ServiceKind, message: String },
    #[error("failed to scaffold project at {}: {message}", .path.display())]
    ScaffoldFailed { path: PathBuf, message: String },
    #[error("failed to open {url}: {message}")]
    OpenFailed { url: String, message: String },
}

/// Everything the host needs to launch one service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceLaunch {
    pub kind: ServiceKind,
    pub path: PathBuf,
    pub command: String,
    pub env: BTreeMap<String, String>,
}

#[async_trait]
pub trait ProcessHost: Send + Sync {
    /// Write frontend/backend scaffolding under `path`
    async fn create_project(
        &self,
        path: PathBuf,
        name: String,
        ports: PortPair,
    ) -> Result<String, HostError>;

    /// Launch a service command in its working directory
    async fn start_service(&self, launch: ServiceLaunch) -> Result<String, HostError>;

    /// Terminate the service previously started for `(kind, path)`
    async fn stop_service(&self, kind: ServiceKind, path: PathBuf) -> Result<String, HostError>;
}

#[async_trait]
pub trait BrowserOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), HostError>;
}
