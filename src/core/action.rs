//! Transition-specific orchestration calls run by the operation engine.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::project::Project;
use crate::adapters::DownOptions;
use crate::config::Config;
use crate::error::Result;

/// Grace period given to containers before they are killed
pub const STOP_TIMEOUT: Duration = Duration::ZERO;

/// The primary call of a lifecycle operation
#[async_trait]
pub trait Action: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Run the call against the project's driver
    async fn execute(
        &self,
        project: &Project,
        config: &Config,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Converge the topology to all services up
#[derive(Debug, Clone, Copy, Default)]
pub struct Up;

#[async_trait]
impl Action for Up {
    fn name(&self) -> &str {
        "up"
    }

    async fn execute(
        &self,
        project: &Project,
        _config: &Config,
        cancel: &CancellationToken,
    ) -> Result<()> {
        project.driver().up(cancel).await
    }
}

/// Start the existing containers of an installed topology
#[derive(Debug, Clone, Copy, Default)]
pub struct Start;

#[async_trait]
impl Action for Start {
    fn name(&self) -> &str {
        "start"
    }

    async fn execute(
        &self,
        project: &Project,
        _config: &Config,
        cancel: &CancellationToken,
    ) -> Result<()> {
        project.ensure_installed(cancel).await?;
        project.driver().start(cancel).await
    }
}

/// Stop every container of an installed topology immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct Stop;

#[async_trait]
impl Action for Stop {
    fn name(&self) -> &str {
        "stop"
    }

    async fn execute(
        &self,
        project: &Project,
        _config: &Config,
        cancel: &CancellationToken,
    ) -> Result<()> {
        project.ensure_installed(cancel).await?;
        project.driver().stop(STOP_TIMEOUT, cancel).await
    }
}

/// Stop and tear the topology down
#[derive(Debug, Clone, Copy, Default)]
pub struct Down {
    /// Also remove images and volumes
    pub purge: bool,

    /// Skip the installed check
    pub force: bool,
}

#[async_trait]
impl Action for Down {
    fn name(&self) -> &str {
        "down"
    }

    async fn execute(
        &self,
        project: &Project,
        _config: &Config,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.force {
            debug!("Forced uninstall, skipping installed check");
        } else {
            project.ensure_installed(cancel).await?;
        }

        let driver = project.driver();
        driver.stop(STOP_TIMEOUT, cancel).await?;
        driver.down(DownOptions::purge(self.purge), cancel).await
    }
}
