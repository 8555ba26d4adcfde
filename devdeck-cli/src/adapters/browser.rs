use async_trait::async_trait;
use tokio::process::Command;

use devdeck_core::host::{BrowserOpener, HostError};

/// Hands URLs to the desktop's default browser
pub struct SystemBrowser;

impl SystemBrowser {
    fn command(url: &str) -> Command {
        #[cfg(target_os = "macos")]
        {
            let mut c = Command::new("open");
            c.arg(url);
            c
        }
        #[cfg(windows)]
        {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", "", url]);
            c
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let mut c = Command::new("xdg-open");
            c.arg(url);
            c
        }
    }
}

#[async_trait]
impl BrowserOpener for SystemBrowser {
    async fn open(&self, url: &str) -> Result<(), HostError> {
        let status = Self::command(url)
            .status()
            .await
            .map_err(|e| HostError::OpenFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(HostError::OpenFailed {
                url: url.to_string(),
                message: format!("exit code: {:?}", status.code()),
            })
        }
    }
}
