//! Health commands: status, watch, up, open

use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Result, bail};
use tokio::sync::watch;

use devdeck_core::lifecycle::Launcher;
use devdeck_core::model::{
    ProjectConfig, ProjectStatus, ServiceKind, ServiceStatus, StatusSnapshot,
};
use devdeck_core::monitor::{MonitorSettings, Prober, run_tick};
use devdeck_core::storage::KeyValueStore;

/// HH:MM:SS UTC of the most recent check on either side
fn format_check(status: &ProjectStatus) -> String {
    let Some(at) = status.frontend.last_check.max(status.backend.last_check) else {
        return "--:--:--".to_string();
    };
    match at.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            format!(
                "{:02}:{:02}:{:02}Z",
                (secs / 3600) % 24,
                (secs / 60) % 60,
                secs % 60
            )
        }
        Err(_) => "??:??:??".to_string(),
    }
}

fn status_icon(status: &ServiceStatus) -> &'static str {
    match (status.running, status.healthy) {
        (_, true) => "●",
        (true, false) => "◐",
        (false, false) => "○",
    }
}

fn print_snapshot(projects: &[ProjectConfig], snapshot: &StatusSnapshot) {
    println!(
        "  {:<20} {:<22} {:<22} {}",
        "PROJECT", "FRONTEND", "BACKEND", "CHECKED"
    );
    for project in projects {
        let Some(status) = snapshot.get(&project.id) else {
            println!("  {:<20} (no reading yet)", project.id);
            continue;
        };
        let cell = |kind: ServiceKind| {
            let s = status.get(kind);
            format!("{} :{} {}", status_icon(s), project.port(kind), s.label())
        };
        println!(
            "  {:<20} {:<22} {:<22} {}",
            project.id,
            cell(ServiceKind::Frontend),
            cell(ServiceKind::Backend),
            format_check(status)
        );
    }
}

pub async fn run_status<S: KeyValueStore>(
    launcher: &Launcher<S>,
    prober: Arc<dyn Prober>,
) -> Result<()> {
    let projects = launcher.projects();
    if projects.is_empty() {
        println!("No projects registered.");
        return Ok(());
    }

    let settings = MonitorSettings::from(launcher.config());
    let snapshot = run_tick(&projects, prober.as_ref(), &settings, 1).await;
    print_snapshot(&projects, &snapshot);
    Ok(())
}

/// Print every published snapshot for `filter` (or all projects) until Ctrl-C
async fn follow(
    mut status_rx: watch::Receiver<StatusSnapshot>,
    projects_rx: watch::Receiver<Vec<ProjectConfig>>,
    filter: Option<&str>,
) -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = status_rx.borrow_and_update().clone();
                let projects: Vec<ProjectConfig> = projects_rx
                    .borrow()
                    .iter()
                    .filter(|p| filter.is_none_or(|id| p.id == id))
                    .cloned()
                    .collect();

                if projects.is_empty() {
                    println!("No projects registered; waiting...");
                    continue;
                }
                println!("\n[tick {}]", snapshot.tick);
                print_snapshot(&projects, &snapshot);
            }
            _ = &mut ctrl_c => return Ok(()),
        }
    }
}

pub async fn run_watch<S: KeyValueStore>(
    launcher: &Launcher<S>,
    prober: Arc<dyn Prober>,
) -> Result<()> {
    println!(
        "Watching {} project(s) every {}ms (Ctrl-C to stop)",
        launcher.projects().len(),
        launcher.config().poll_interval_ms
    );
    let status_rx = launcher.spawn_monitor(prober);
    follow(status_rx, launcher.subscribe(), None).await
}

/// Start both services, follow their health, stop both on Ctrl-C
pub async fn run_up<S: KeyValueStore>(
    launcher: &Launcher<S>,
    id: &str,
    prober: Arc<dyn Prober>,
) -> Result<()> {
    let project = launcher.project(id)?;

    let mut started = Vec::new();
    for kind in [ServiceKind::Backend, ServiceKind::Frontend] {
        match launcher.start_service(id, kind).await {
            Ok(message) => {
                println!("  {}", message);
                started.push(kind);
            }
            Err(e) => eprintln!("  {}: {}", kind, e),
        }
    }
    if started.is_empty() {
        bail!("nothing started for '{}'", project.id);
    }

    println!(
        "\n{} is up: http://{}:{} (Ctrl-C to stop)",
        project.name,
        launcher.config().host,
        project.frontend.port
    );
    let status_rx = launcher.spawn_monitor(prober);
    follow(status_rx, launcher.subscribe(), Some(id)).await?;

    println!("\nStopping...");
    for kind in started {
        match launcher.stop_service(id, kind).await {
            Ok(message) => println!("  {}", message),
            Err(e) => eprintln!("  {}: {}", kind, e),
        }
    }
    Ok(())
}

pub async fn run_open<S: KeyValueStore>(launcher: &Launcher<S>, id: &str) -> Result<()> {
    let project = launcher.project(id)?;
    let url = format!("http://{}:{}", launcher.config().host, project.frontend.port);
    if launcher.open_frontend(id).await? {
        println!("Opened {}", url);
    } else {
        println!("Could not open a browser; visit {}", url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn checked_at(secs: u64) -> ServiceStatus {
        ServiceStatus {
            running: true,
            healthy: true,
            last_check: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
        }
    }

    #[test]
    fn test_format_check_uses_latest_side_in_utc() {
        let status = ProjectStatus {
            frontend: checked_at(3600 + 2 * 60 + 3),
            backend: checked_at(60),
        };
        assert_eq!(format_check(&status), "01:02:03Z");

        let never = ServiceStatus {
            running: false,
            healthy: false,
            last_check: None,
        };
        let unchecked = ProjectStatus {
            frontend: never.clone(),
            backend: never,
        };
        assert_eq!(format_check(&unchecked), "--:--:--");
    }
}
