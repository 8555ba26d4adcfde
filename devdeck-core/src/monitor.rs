//! Health monitor
//!
//! One tick probes every project's frontend and backend concurrently and
//! publishes a single snapshot once all checks have settled. The scheduler
//! watches the effective registry: a non-empty list is ticked immediately
//! and then on a fixed interval, any change rearms it, and an empty list
//! parks it until the next change.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::config::LauncherConfig;
use crate::model::{ProjectConfig, ProjectStatus, ServiceKind, ServiceStatus, StatusSnapshot};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeRequest {
    pub kind: ServiceKind,
    pub url: String,
    /// `None` leaves the prober's own default in place
    pub timeout: Option<Duration>,
}

/// What came back from a single probe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Refused, timed out, or otherwise failed before a response
    Unreachable,
    Responded { status: u16 },
}

/// Network access for the monitor. Probes never fail; failure is an outcome.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, request: &ProbeRequest) -> ProbeOutcome;
}

#[derive(Clone, Debug)]
pub struct MonitorSettings {
    pub host: String,
    pub interval: Duration,
    pub frontend_timeout: Duration,
    pub backend_timeout: Option<Duration>,
}

impl From<&LauncherConfig> for MonitorSettings {
    fn from(config: &LauncherConfig) -> Self {
        Self {
            host: config.host.clone(),
            interval: config.poll_interval(),
            frontend_timeout: config.frontend_timeout(),
            backend_timeout: config.backend_timeout(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&LauncherConfig::default())
    }
}

/// Turn a probe outcome into a status.
///
/// The frontend only has to prove a listener exists, so any response counts.
/// The backend must answer its health endpoint with a 2xx.
pub fn interpret(kind: ServiceKind, outcome: ProbeOutcome, at: SystemTime) -> ServiceStatus {
    let (running, healthy) = match (kind, outcome) {
        (_, ProbeOutcome::Unreachable) => (false, false),
        (ServiceKind::Frontend, ProbeOutcome::Responded { .. }) => (true, true),
        (ServiceKind::Backend, ProbeOutcome::Responded { status }) => {
            (true, (200..300).contains(&status))
        }
    };
    ServiceStatus {
        running,
        healthy,
        last_check: Some(at),
    }
}

/// Both checks for one project, run side by side
pub async fn check_project(
    project: &ProjectConfig,
    prober: &dyn Prober,
    settings: &MonitorSettings,
) -> ProjectStatus {
    let frontend_req = ProbeRequest {
        kind: ServiceKind::Frontend,
        url: project.frontend_url(&settings.host),
        timeout: Some(settings.frontend_timeout),
    };
    let backend_req = ProbeRequest {
        kind: ServiceKind::Backend,
        url: project.backend_health_url(&settings.host),
        timeout: settings.backend_timeout,
    };

    let frontend_check = async {
        let outcome = prober.probe(&frontend_req).await;
        interpret(ServiceKind::Frontend, outcome, SystemTime::now())
    };
    let backend_check = async {
        let outcome = prober.probe(&backend_req).await;
        interpret(ServiceKind::Backend, outcome, SystemTime::now())
    };
    let (frontend, backend) = tokio::join!(frontend_check, backend_check);

    ProjectStatus { frontend, backend }
}

/// One health tick across `projects`; returns only once every check settled.
pub async fn run_tick(
    projects: &[ProjectConfig],
    prober: &dyn Prober,
    settings: &MonitorSettings,
    tick: u64,
) -> StatusSnapshot {
    let checks = projects.iter().map(|project| async move {
        let status = check_project(project, prober, settings).await;
        (project.id.clone(), status)
    });
    let statuses = join_all(checks).await.into_iter().collect();

    StatusSnapshot { tick, statuses }
}

pub struct HealthMonitor {
    prober: Arc<dyn Prober>,
    settings: MonitorSettings,
}

impl HealthMonitor {
    pub fn new(prober: Arc<dyn Prober>, settings: MonitorSettings) -> Self {
        Self { prober, settings }
    }

    /// Drive ticks off the watched project list until either channel closes.
    pub async fn run(
        self,
        mut projects_rx: watch::Receiver<Vec<ProjectConfig>>,
        status_tx: watch::Sender<StatusSnapshot>,
    ) {
        let status_tx = Arc::new(status_tx);
        let generation = Arc::new(AtomicU64::new(0));
        let ticks = Arc::new(AtomicU64::new(0));

        loop {
            let projects = projects_rx.borrow_and_update().clone();
            let current = generation.fetch_add(1, Ordering::SeqCst) + 1;

            if projects.is_empty() {
                debug!("no projects, monitor idle");
                let tick = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                publish(&status_tx, StatusSnapshot {
                    tick,
                    statuses: Default::default(),
                });

                tokio::select! {
                    changed = projects_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = status_tx.closed() => return,
                }
                continue;
            }

            debug!(projects = projects.len(), "monitor armed");
            let projects = Arc::new(projects);
            let mut ticker = tokio::time::interval(self.settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let tick = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                        self.spawn_tick(
                            tick,
                            current,
                            projects.clone(),
                            generation.clone(),
                            status_tx.clone(),
                        );
                    }
                    changed = projects_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        break;
                    }
                    _ = status_tx.closed() => return,
                }
            }
        }
    }

    fn spawn_tick(
        &self,
        tick: u64,
        armed_generation: u64,
        projects: Arc<Vec<ProjectConfig>>,
        generation: Arc<AtomicU64>,
        status_tx: Arc<watch::Sender<StatusSnapshot>>,
    ) {
        let prober = self.prober.clone();
        let settings = self.settings.clone();

        tokio::spawn(async move {
            let snapshot = run_tick(&projects, prober.as_ref(), &settings, tick).await;

            if generation.load(Ordering::SeqCst) != armed_generation {
                debug!(tick, "project list changed mid-tick, dropping result");
                return;
            }

            let healthy = snapshot
                .statuses
                .values()
                .filter(|s| s.frontend.healthy && s.backend.healthy)
                .count();
            debug!(tick, projects = snapshot.statuses.len(), healthy, "health tick");
            publish(&status_tx, snapshot);
        });
    }
}

/// Replace the published snapshot unless a later tick already landed.
fn publish(status_tx: &watch::Sender<StatusSnapshot>, snapshot: StatusSnapshot) {
    status_tx.send_if_modified(move |current| {
        if snapshot.tick > current.tick {
            *current = snapshot;
            true
        } else {
            false
        }
    });
}
