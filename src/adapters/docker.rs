//! Container runtime client backed by the Docker Engine API.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ExecConfig, OutputStream, RuntimeClient};
use crate::error::{InstallerError, Result};

/// Inspections made before giving up on an exec that still reports running
const INSPECT_ATTEMPTS: u32 = 10;

/// First delay between inspections; doubles up to [`INSPECT_BACKOFF_MAX`]
const INSPECT_BACKOFF: Duration = Duration::from_millis(10);

const INSPECT_BACKOFF_MAX: Duration = Duration::from_millis(200);

/// Runtime client talking to the local Docker daemon
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the platform default socket
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(InstallerError::driver)?;
        Ok(Self { docker })
    }

    /// Wrap an existing client
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }
}

/// Run `fut` unless `cancel` fires first
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T, bollard::errors::Error>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(InstallerError::Cancelled),
        result = fut => result.map_err(InstallerError::driver),
    }
}

/// Inspect an exec until it stops running and return its exit code.
///
/// The output stream can close a moment before the daemon records the exit
/// code, so `inspect` is retried with backoff while it reports `running`.
/// `inspect` yields the `(running, exit_code)` pair of one inspection.
async fn poll_exit_code<F, Fut>(
    exec_id: &str,
    cancel: &CancellationToken,
    mut inspect: F,
) -> Result<i64>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(Option<bool>, Option<i64>)>>,
{
    let mut delay = INSPECT_BACKOFF;
    for attempt in 1..=INSPECT_ATTEMPTS {
        match inspect().await? {
            (Some(true), _) => {
                debug!(exec_id, attempt, "Exec still running, inspecting again");
            }
            (_, Some(code)) => return Ok(code),
            (_, None) => {
                return Err(InstallerError::Driver(format!(
                    "exec {} reported no exit code",
                    exec_id
                )))
            }
        }

        if attempt < INSPECT_ATTEMPTS {
            tokio::select! {
                _ = cancel.cancelled() => return Err(InstallerError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(INSPECT_BACKOFF_MAX);
        }
    }

    Err(InstallerError::Driver(format!(
        "exec {} still running after {} inspections",
        exec_id, INSPECT_ATTEMPTS
    )))
}

#[async_trait]
impl RuntimeClient for DockerRuntime {
    async fn create_exec(
        &self,
        container_id: &str,
        config: &ExecConfig,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let options = CreateExecOptions {
            tty: Some(config.tty),
            attach_stdout: Some(config.attach_stdout),
            attach_stderr: Some(config.attach_stderr),
            cmd: Some(config.cmd.clone()),
            ..Default::default()
        };

        let created = cancellable(cancel, self.docker.create_exec(container_id, options)).await?;
        Ok(created.id)
    }

    async fn attach_exec(&self, exec_id: &str, cancel: &CancellationToken) -> Result<OutputStream> {
        match cancellable(cancel, self.docker.start_exec(exec_id, None)).await? {
            StartExecResults::Attached { output, .. } => Ok(output
                .map(|chunk| chunk.map(|log| log.into_bytes()).map_err(InstallerError::driver))
                .boxed()),
            StartExecResults::Detached => Err(InstallerError::Driver(format!(
                "exec {} started detached, no output to attach to",
                exec_id
            ))),
        }
    }

    async fn inspect_exec(&self, exec_id: &str, cancel: &CancellationToken) -> Result<i64> {
        poll_exit_code(exec_id, cancel, move || async move {
            let inspect = cancellable(cancel, self.docker.inspect_exec(exec_id)).await?;
            Ok((inspect.running, inspect.exit_code))
        })
        .await
    }
}
