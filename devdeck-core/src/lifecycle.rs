//! Launcher: the orchestration layer between the command surface, the
//! registry, the monitor and the external collaborators.
//!
//! Every mutation goes through the registry store and then republishes the
//! effective registry on a watch channel, which is what the health monitor
//! follows. Republishing is skipped when the list content did not change.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::LauncherConfig;
use crate::host::{BrowserOpener, HostError, ProcessHost, ServiceLaunch};
use crate::model::{
    BackendConfig, FrontendConfig, PortPair, ProjectConfig, ProjectId, ServiceKind, StatusSnapshot,
};
use crate::monitor::{HealthMonitor, MonitorSettings, Prober};
use crate::registry::RegistryStore;
use crate::storage::{KeyValueStore, StorageError};

pub const FRONTEND_COMMAND: &str = "npm run dev";
pub const HEALTH_ENDPOINT: &str = "/health";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{0}")]
    Validation(String),
    #[error("a project with id '{id}' already exists")]
    DuplicateId { id: ProjectId },
    #[error("no project with id '{id}'")]
    UnknownProject { id: ProjectId },
    #[error("'{id}' is not a built-in project")]
    NotDefault { id: ProjectId },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Input for scaffolding a brand-new project
#[derive(Clone, Debug, Default)]
pub struct CreateRequest {
    pub name: String,
    pub description: String,
    /// Root folder; `frontend/` and `backend/` are created inside it
    pub path: PathBuf,
}

/// Input for registering an existing folder
#[derive(Clone, Debug, Default)]
pub struct ImportRequest {
    pub root: PathBuf,
    pub name: String,
    pub description: String,
    pub has_frontend: bool,
    pub has_backend: bool,
    pub frontend_port: Option<u16>,
    pub backend_port: Option<u16>,
}

pub fn backend_command(port: u16) -> String {
    format!("uvicorn main:app --reload --port {}", port)
}

/// Standard layout: `<root>/frontend` on Vite, `<root>/backend` on uvicorn
pub fn project_at(
    id: ProjectId,
    name: &str,
    description: &str,
    root: &Path,
    ports: PortPair,
) -> ProjectConfig {
    ProjectConfig {
        id,
        name: name.to_string(),
        description: description.to_string(),
        color: ProjectConfig::random_color(),
        frontend: FrontendConfig {
            port: ports.frontend,
            path: root.join("frontend").display().to_string(),
            command: FRONTEND_COMMAND.to_string(),
            env: None,
        },
        backend: BackendConfig {
            port: ports.backend,
            path: root.join("backend").display().to_string(),
            command: backend_command(ports.backend),
            health_endpoint: HEALTH_ENDPOINT.to_string(),
            env: None,
        },
    }
}

pub struct Launcher<S> {
    registry: RegistryStore<S>,
    config: LauncherConfig,
    host: Arc<dyn ProcessHost>,
    browser: Arc<dyn BrowserOpener>,
    projects_tx: watch::Sender<Vec<ProjectConfig>>,
}

impl<S: KeyValueStore> Launcher<S> {
    pub fn new(
        store: S,
        config: LauncherConfig,
        host: Arc<dyn ProcessHost>,
        browser: Arc<dyn BrowserOpener>,
    ) -> Self {
        let registry = RegistryStore::new(store, config.defaults.clone());
        let (projects_tx, _) = watch::channel(registry.get_projects());
        Self {
            registry,
            config,
            host,
            browser,
            projects_tx,
        }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn projects(&self) -> Vec<ProjectConfig> {
        self.registry.get_projects()
    }

    pub fn project(&self, id: &str) -> Result<ProjectConfig, LaunchError> {
        self.registry
            .get_projects()
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| LaunchError::UnknownProject { id: id.to_string() })
    }

    pub fn is_default(&self, id: &str) -> bool {
        self.registry.is_default(id)
    }

    pub fn removed_defaults(&self) -> BTreeSet<ProjectId> {
        self.registry.removed_default_ids()
    }

    pub fn next_ports(&self) -> PortPair {
        self.registry.next_available_ports(self.config.base_ports)
    }

    /// Follow the effective registry as it changes
    pub fn subscribe(&self) -> watch::Receiver<Vec<ProjectConfig>> {
        self.projects_tx.subscribe()
    }

    /// Start the health monitor on this launcher's registry feed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_monitor(&self, prober: Arc<dyn Prober>) -> watch::Receiver<StatusSnapshot> {
        let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());
        let monitor = HealthMonitor::new(prober, MonitorSettings::from(&self.config));
        tokio::spawn(monitor.run(self.subscribe(), status_tx));
        status_rx
    }

    pub async fn create_project(
        &mut self,
        request: CreateRequest,
    ) -> Result<ProjectConfig, LaunchError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(LaunchError::Validation("project name is required".into()));
        }
        if request.path.as_os_str().is_empty() {
            return Err(LaunchError::Validation("project path is required".into()));
        }

        let id = ProjectConfig::slug(name);
        self.ensure_unique(&id)?;
        let ports = self.next_ports();

        info!(%id, frontend = ports.frontend, backend = ports.backend, "creating project");
        self.host
            .create_project(request.path.clone(), name.to_string(), ports)
            .await?;

        let project = project_at(id, name, request.description.trim(), &request.path, ports);
        self.registry.add_project(project.clone())?;
        self.republish();
        Ok(project)
    }

    pub fn import_project(&mut self, request: ImportRequest) -> Result<ProjectConfig, LaunchError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(LaunchError::Validation("project name is required".into()));
        }
        if !request.has_frontend && !request.has_backend {
            return Err(LaunchError::Validation(format!(
                "no frontend or backend found in {}",
                request.root.display()
            )));
        }

        let id = ProjectConfig::slug(name);
        self.ensure_unique(&id)?;

        let free = self.next_ports();
        let ports = PortPair {
            frontend: request.frontend_port.unwrap_or(free.frontend),
            backend: request.backend_port.unwrap_or(free.backend),
        };

        info!(%id, root = %request.root.display(), "importing project");
        let project = project_at(id, name, request.description.trim(), &request.root, ports);
        self.registry.add_project(project.clone())?;
        self.republish();
        Ok(project)
    }

    pub fn remove_project(&mut self, id: &str) -> Result<(), LaunchError> {
        info!(id, default = self.registry.is_default(id), "removing project");
        self.registry.remove_project(id)?;
        self.republish();
        Ok(())
    }

    pub fn restore_default(&mut self, id: &str) -> Result<(), LaunchError> {
        if !self.registry.is_default(id) {
            return Err(LaunchError::NotDefault { id: id.to_string() });
        }
        info!(id, "restoring project");
        self.registry.restore_default_project(id)?;
        self.republish();
        Ok(())
    }

    pub async fn start_service(&self, id: &str, kind: ServiceKind) -> Result<String, LaunchError> {
        let project = self.project(id)?;
        let launch = ServiceLaunch {
            kind,
            path: PathBuf::from(project.path(kind)),
            command: project.command(kind).to_string(),
            env: project.env(kind).cloned().unwrap_or_default(),
        };
        Ok(self.host.start_service(launch).await?)
    }

    pub async fn stop_service(&self, id: &str, kind: ServiceKind) -> Result<String, LaunchError> {
        let project = self.project(id)?;
        let path = PathBuf::from(project.path(kind));
        Ok(self.host.stop_service(kind, path).await?)
    }

    /// Open the project's frontend. Returns whether the browser accepted it.
    pub async fn open_frontend(&self, id: &str) -> Result<bool, LaunchError> {
        let project = self.project(id)?;
        let url = format!("http://{}:{}", self.config.host, project.frontend.port);
        match self.browser.open(&url).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(%url, error = %e, "could not open browser");
                Ok(false)
            }
        }
    }

    /// Built-in ids stay reserved while hidden so a restore can never collide.
    fn ensure_unique(&self, id: &str) -> Result<(), LaunchError> {
        let taken = self.registry.is_default(id)
            || self.registry.get_projects().iter().any(|p| p.id == id);
        if taken {
            return Err(LaunchError::DuplicateId { id: id.to_string() });
        }
        Ok(())
    }

    fn republish(&self) {
        let fresh = self.registry.get_projects();
        self.projects_tx.send_if_modified(|current| {
            if *current == fresh {
                false
            } else {
                *current = fresh;
                true
            }
        });
    }
}
