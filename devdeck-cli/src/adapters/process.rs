use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

use devdeck_core::host::{HostError, ProcessHost, ServiceLaunch};
use devdeck_core::model::{PortPair, ServiceKind};

use super::scaffold;

/// How long a service gets to exit after SIGTERM before SIGKILL
const STOP_GRACE: Duration = Duration::from_millis(500);

struct ProcessHandle {
    child: Child,
    pgid: i32,
}

/// Spawns service commands through the platform shell and scaffolds projects on disk.
///
/// Running processes are keyed by `path:kind`, so one folder can only run
/// one frontend and one backend at a time.
pub struct LocalProcessHost {
    processes: Mutex<BTreeMap<String, ProcessHandle>>,
}

impl LocalProcessHost {
    pub fn new() -> Self {
        Self {
            processes: Mutex::new(BTreeMap::new()),
        }
    }

    fn key(kind: ServiceKind, path: &Path) -> String {
        format!("{}:{}", path.display(), kind)
    }

    fn shell(command: &str) -> Command {
        #[cfg(unix)]
        {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        }
        #[cfg(windows)]
        {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        }
    }

    fn forward_output<R>(key: String, stream: &'static str, reader: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(target: "devdeck::service", service = %key, stream, "{}", line);
            }
        });
    }

    /// SIGTERM the group, then SIGKILL once the grace period lapses.
    /// A group that is already gone counts as stopped.
    async fn terminate(handle: &mut ProcessHandle) -> Result<(), String> {
        #[cfg(unix)]
        {
            if handle.pgid > 0 {
                if unsafe { libc::killpg(handle.pgid, libc::SIGTERM) } != 0 {
                    let err = std::io::Error::last_os_error();
                    if err.raw_os_error() == Some(libc::ESRCH) {
                        return Ok(());
                    }
                    return Err(err.to_string());
                }
                tokio::time::sleep(STOP_GRACE).await;
                if handle.child.try_wait().ok().flatten().is_none() {
                    unsafe {
                        libc::killpg(handle.pgid, libc::SIGKILL);
                    }
                }
                return Ok(());
            }
        }

        match handle.child.kill().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl Default for LocalProcessHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessHost for LocalProcessHost {
    async fn create_project(
        &self,
        path: PathBuf,
        name: String,
        ports: PortPair,
    ) -> Result<String, HostError> {
        scaffold::write_project(&path, &name, ports)
            .await
            .map_err(|e| HostError::ScaffoldFailed {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Ok(format!("Project created at {}", path.display()))
    }

    async fn start_service(&self, launch: ServiceLaunch) -> Result<String, HostError> {
        let kind = launch.kind;
        let key = Self::key(kind, &launch.path);

        let mut processes = self.processes.lock().await;
        if processes.contains_key(&key) {
            return Err(HostError::AlreadyRunning { kind });
        }
        if !launch.path.exists() {
            return Err(HostError::MissingPath { path: launch.path });
        }
        if launch.command.trim().is_empty() {
            return Err(HostError::SpawnFailed {
                kind,
                message: "empty start command".into(),
            });
        }

        let mut cmd = Self::shell(&launch.command);
        cmd.current_dir(&launch.path);
        for (k, v) in &launch.env {
            cmd.env(k, v);
        }

        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| HostError::SpawnFailed {
            kind,
            message: e.to_string(),
        })?;
        let pid = child.id();
        let pgid = pid.map(|pid| pid as i32).unwrap_or(-1);

        if let Some(stdout) = child.stdout.take() {
            Self::forward_output(key.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            Self::forward_output(key.clone(), "stderr", stderr);
        }

        debug!(service = %key, ?pid, "spawned");
        processes.insert(key, ProcessHandle { child, pgid });

        Ok(match pid {
            Some(pid) => format!("{} started with PID {}", kind, pid),
            None => format!("{} started", kind),
        })
    }

    async fn stop_service(&self, kind: ServiceKind, path: PathBuf) -> Result<String, HostError> {
        let key = Self::key(kind, &path);
        let handle = self.processes.lock().await.remove(&key);

        match handle {
            Some(mut handle) => {
                Self::terminate(&mut handle)
                    .await
                    .map_err(|message| HostError::StopFailed { kind, message })?;
                debug!(service = %key, "stopped");
                Ok(format!("{} stopped", kind))
            }
            None => Err(HostError::NotRunning { kind }),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn launch(kind: ServiceKind, path: &Path, command: &str) -> ServiceLaunch {
        ServiceLaunch {
            kind,
            path: path.to_path_buf(),
            command: command.to_string(),
            env: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_start_twice_then_stop() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalProcessHost::new();

        let msg = host
            .start_service(launch(ServiceKind::Backend, dir.path(), "sleep 30"))
            .await
            .unwrap();
        assert!(msg.starts_with("backend started"));

        let err = host
            .start_service(launch(ServiceKind::Backend, dir.path(), "sleep 30"))
            .await
            .unwrap_err();
        assert_eq!(err, HostError::AlreadyRunning { kind: ServiceKind::Backend });

        // Frontend in the same folder is a separate key
        host.start_service(launch(ServiceKind::Frontend, dir.path(), "sleep 30"))
            .await
            .unwrap();

        let msg = host
            .stop_service(ServiceKind::Backend, dir.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(msg, "backend stopped");
        host.stop_service(ServiceKind::Frontend, dir.path().to_path_buf())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_not_running() {
        let host = LocalProcessHost::new();
        let err = host
            .stop_service(ServiceKind::Frontend, PathBuf::from("/nowhere"))
            .await
            .unwrap_err();
        assert_eq!(err, HostError::NotRunning { kind: ServiceKind::Frontend });
    }

    #[tokio::test]
    async fn test_missing_path_rejected() {
        let host = LocalProcessHost::new();
        let err = host
            .start_service(launch(ServiceKind::Frontend, Path::new("/definitely/not/here"), "true"))
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::MissingPath { .. }));
    }

    #[tokio::test]
    async fn test_env_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalProcessHost::new();
        let mut l = launch(ServiceKind::Backend, dir.path(), "echo \"$GREETING\" > out.txt");
        l.env.insert("GREETING".into(), "hello".into());

        host.start_service(l).await.unwrap();

        let out = dir.path().join("out.txt");
        for _ in 0..50 {
            if std::fs::read_to_string(&out).map(|s| s.trim() == "hello").unwrap_or(false) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("service did not see its environment");
    }
}
