//! Adapter interfaces for the external collaborators.
//!
//! The installer never schedules containers itself: it sequences calls to an
//! orchestration driver (a compose-style reconciler) and a container-runtime
//! client used to exec commands inside running containers.

pub mod compose;
pub mod docker;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::domain::{ContainerInfo, ServiceRecord};
use crate::error::Result;

pub use compose::ComposeCli;
pub use docker::DockerRuntime;

/// Rendered topology handed to a driver at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Project name, used as the compose namespace
    pub project_name: String,

    /// Rendered topology documents, in order
    pub documents: Vec<String>,

    /// Service names declared across all documents
    pub services: Vec<String>,
}

/// Options for tearing a topology down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownOptions {
    /// Remove every image used by the topology
    pub remove_images: bool,

    /// Remove named and anonymous volumes
    pub remove_volumes: bool,
}

impl DownOptions {
    /// Ordinary teardown, or teardown plus images and volumes when purging
    pub fn purge(purge: bool) -> Self {
        Self {
            remove_images: purge,
            remove_volumes: purge,
        }
    }
}

/// Compose-style reconciler driving the declared topology
#[async_trait]
pub trait ComposeDriver: Send + Sync {
    /// Converge the topology to "all services up"
    async fn up(&self, cancel: &CancellationToken) -> Result<()>;

    /// Start every existing container
    async fn start(&self, cancel: &CancellationToken) -> Result<()>;

    /// Stop every container, waiting at most `timeout` before killing
    async fn stop(&self, timeout: Duration, cancel: &CancellationToken) -> Result<()>;

    /// Remove containers and networks, plus images/volumes per `options`
    async fn down(&self, options: DownOptions, cancel: &CancellationToken) -> Result<()>;

    /// List the existing service records
    async fn ps(&self, cancel: &CancellationToken) -> Result<Vec<ServiceRecord>>;

    /// List the containers currently backing `service`
    async fn containers(
        &self,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContainerInfo>>;
}

/// Settings of an exec created inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecConfig {
    pub tty: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub cmd: Vec<String>,
}

impl ExecConfig {
    /// Interactive TTY exec attached to stdout and stderr
    pub fn attached(cmd: Vec<String>) -> Self {
        Self {
            tty: true,
            attach_stdout: true,
            attach_stderr: true,
            cmd,
        }
    }
}

/// Live output of an attached exec
pub type OutputStream = BoxStream<'static, Result<Bytes>>;

/// Container runtime client used for exec-in-container
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Create an exec instance and return its id
    async fn create_exec(
        &self,
        container_id: &str,
        config: &ExecConfig,
        cancel: &CancellationToken,
    ) -> Result<String>;

    /// Start the exec and attach to its output
    async fn attach_exec(&self, exec_id: &str, cancel: &CancellationToken) -> Result<OutputStream>;

    /// Exit code of a finished exec
    async fn inspect_exec(&self, exec_id: &str, cancel: &CancellationToken) -> Result<i64>;
}
