//! The local process that serves the site while it is being crawled.

use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{io_err, DeployError};

/// How long the server gets to exit after the interrupt before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Ask the OS for a port that is free right now on `host`.
pub fn free_port(host: &str) -> Result<u16, DeployError> {
    let listener = TcpListener::bind((host, 0)).map_err(|e| io_err(format!("{host}:0"), e))?;
    let port = listener
        .local_addr()
        .map_err(|e| io_err(format!("{host}:0"), e))?
        .port();
    Ok(port)
}

/// Substitute `{host}` and `{port}` in the configured arguments.
pub fn server_args(config: &ServerConfig, port: u16) -> Vec<String> {
    config
        .args
        .iter()
        .map(|arg| {
            arg.replace("{host}", &config.host)
                .replace("{port}", &port.to_string())
        })
        .collect()
}

/// Handle to the running site server.
///
/// The child is killed when the handle is dropped, so an early return from the
/// crawl never leaves the server behind. Prefer [`LocalServer::shutdown`], which
/// interrupts the server and waits for it to exit.
#[derive(Debug)]
pub struct LocalServer {
    child: Child,
}

impl LocalServer {
    /// Launch the server in `work_dir` and wait for it to settle.
    pub async fn start(config: &ServerConfig, work_dir: &Path, port: u16) -> Result<Self, DeployError> {
        let args = server_args(config, port);
        let child = Command::new(&config.program)
            .args(&args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DeployError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        info!(
            pid = child.id(),
            program = %config.program,
            args = ?args,
            "Started app server"
        );
        tokio::time::sleep(config.settle()).await;

        Ok(Self { child })
    }

    /// Interrupt the server and reap it, killing it if it outlives the grace period.
    pub async fn shutdown(mut self) {
        let pid = self.child.id();
        if self.interrupt() {
            match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
                Ok(Ok(status)) => {
                    info!(pid, %status, "Stopped app server");
                    return;
                }
                Ok(Err(e)) => warn!(pid, error = ?e, "Failed to wait for app server"),
                Err(_) => warn!(pid, "App server ignored the interrupt, killing it"),
            }
        }
        match self.child.kill().await {
            Ok(()) => info!(pid, "Killed app server"),
            Err(e) => warn!(pid, error = ?e, "Failed to stop app server"),
        }
    }

    /// Send SIGINT. Returns false when no signal was delivered.
    #[cfg(unix)]
    fn interrupt(&self) -> bool {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id().and_then(|id| i32::try_from(id).ok()) else {
            return false;
        };
        match kill(Pid::from_raw(pid), Signal::SIGINT) {
            Ok(()) => true,
            Err(e) => {
                warn!(pid, error = %e, "Failed to interrupt app server");
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn interrupt(&self) -> bool {
        false
    }
}
