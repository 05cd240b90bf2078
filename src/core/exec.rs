//! Runs commands inside the running containers of a service.

use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::adapters::{ComposeDriver, ExecConfig, RuntimeClient};
use crate::error::{InstallerError, Result};

/// Destination of exec output, shared between runs
pub type ExecOutput = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Wrap a writer as an [`ExecOutput`]
pub fn exec_output<W>(writer: W) -> ExecOutput
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    Arc::new(Mutex::new(Box::new(writer)))
}

/// Executes commands through the runtime client and streams their output
pub struct ExecRunner {
    driver: Arc<dyn ComposeDriver>,
    runtime: Arc<dyn RuntimeClient>,
    output: ExecOutput,
}

impl ExecRunner {
    /// Create a runner streaming to the process standard output
    pub fn new(driver: Arc<dyn ComposeDriver>, runtime: Arc<dyn RuntimeClient>) -> Self {
        Self::with_output(driver, runtime, exec_output(tokio::io::stdout()))
    }

    pub fn with_output(
        driver: Arc<dyn ComposeDriver>,
        runtime: Arc<dyn RuntimeClient>,
        output: ExecOutput,
    ) -> Self {
        Self {
            driver,
            runtime,
            output,
        }
    }

    /// Run `cmd` in every running container of `service`, one after another.
    ///
    /// A service with no running container is a no-op success.
    #[instrument(skip(self, cmd, cancel), fields(cmd = %cmd.join(" ")))]
    pub async fn execute(
        &self,
        service: &str,
        cmd: &[String],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let containers = self.driver.containers(service, cancel).await?;
        let running: Vec<_> = containers.into_iter().filter(|c| c.running).collect();

        if running.is_empty() {
            debug!("No running container, nothing to execute");
            return Ok(());
        }

        for container in running {
            debug!(container = %container.id, "Executing command");
            let code = self.run_in(&container.id, cmd, cancel).await?;
            if code != 0 {
                return Err(InstallerError::ExecFailed {
                    service: service.to_string(),
                    command: cmd.join(" "),
                    code,
                });
            }
        }

        Ok(())
    }

    /// Create, attach and inspect one exec; returns its exit code
    async fn run_in(
        &self,
        container_id: &str,
        cmd: &[String],
        cancel: &CancellationToken,
    ) -> Result<i64> {
        let config = ExecConfig::attached(cmd.to_vec());
        let exec_id = self.runtime.create_exec(container_id, &config, cancel).await?;
        let mut stream = self.runtime.attach_exec(&exec_id, cancel).await?;

        let mut output = self.output.lock().await;
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(InstallerError::Cancelled),
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(bytes) => {
                    output.write_all(&bytes?).await?;
                    output.flush().await?;
                }
                None => break,
            }
        }
        drop(output);

        self.runtime.inspect_exec(&exec_id, cancel).await
    }
}
