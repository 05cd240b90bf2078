//! Lifecycle project: install, start, stop, status and uninstall.
//!
//! A [`Project`] is built once per process. Construction renders the
//! topology documents, validates every message template, starts the event
//! listener and hands the rendered topology to the driver.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::action::{Down, Start, Stop, Up};
use super::exec::{ExecOutput, ExecRunner};
use super::listener::{EventListener, EventSink, ListenerStats, EVENT_QUEUE_CAPACITY};
use super::report::Reporter;
use super::template::{error_vars, Renderer, Vars};
use crate::adapters::{ComposeCli, ComposeDriver, DockerRuntime, RuntimeClient, Topology};
use crate::config::{Config, ENV_COMPOSE};
use crate::domain::{
    format_status_table, InstallOptions, StartOptions, StopOptions, UninstallOptions,
};
use crate::error::{InstallerError, Result};

/// Runtime handle over one configured topology
pub struct Project {
    config: Config,
    renderer: Renderer,
    reporter: Arc<dyn Reporter>,
    topology: Topology,
    driver: Arc<dyn ComposeDriver>,
    runtime: Arc<dyn RuntimeClient>,
    exec: ExecRunner,
    listener: JoinHandle<ListenerStats>,
}

impl Project {
    /// Build a project on the `docker compose` CLI and the local Docker daemon
    pub fn connect(config: Config, reporter: Arc<dyn Reporter>) -> Result<Self> {
        let runtime = Arc::new(DockerRuntime::connect()?);
        Self::with_driver(config, reporter, runtime, |topology, events| {
            let driver: Arc<dyn ComposeDriver> = Arc::new(ComposeCli::new(topology, events)?);
            Ok(driver)
        })
    }

    /// Build a project on explicit collaborators.
    ///
    /// `make_driver` receives the rendered topology and the sink the driver
    /// pushes its progress events into. Must be called inside a tokio runtime.
    pub fn with_driver<F>(
        config: Config,
        reporter: Arc<dyn Reporter>,
        runtime: Arc<dyn RuntimeClient>,
        make_driver: F,
    ) -> Result<Self>
    where
        F: FnOnce(Topology, EventSink) -> Result<Arc<dyn ComposeDriver>>,
    {
        config.validate()?;

        let renderer = Renderer::from_config(&config);
        validate_messages(&config, &renderer)?;

        let raw = resolve_documents(&config.compose, compose_override())?;
        let documents = raw
            .iter()
            .map(|doc| renderer.render(doc, None))
            .collect::<Result<Vec<_>>>()?;
        let services = service_names(&documents)?;
        debug!(
            project = %config.project_name,
            documents = documents.len(),
            services = services.len(),
            "Topology rendered"
        );

        let topology = Topology {
            project_name: config.project_name.clone(),
            documents,
            services,
        };

        let listener = EventListener::new(
            config.project_name.clone(),
            topology.services.len(),
            Arc::clone(&reporter),
        );
        let (sink, handle) = listener.spawn(EVENT_QUEUE_CAPACITY);

        let driver = make_driver(topology.clone(), sink)?;
        let exec = ExecRunner::new(Arc::clone(&driver), Arc::clone(&runtime));

        Ok(Self {
            config,
            renderer,
            reporter,
            topology,
            driver,
            runtime,
            exec,
            listener: handle,
        })
    }

    /// Send exec output to `output` instead of standard output
    pub fn with_exec_output(mut self, output: ExecOutput) -> Self {
        self.exec =
            ExecRunner::with_output(Arc::clone(&self.driver), Arc::clone(&self.runtime), output);
        self
    }

    #[instrument(skip_all, fields(project = %self.config.project_name))]
    pub async fn install(&self, options: InstallOptions, cancel: &CancellationToken) -> Result<()> {
        self.config
            .install
            .run(self, &Up, options.no_exec, cancel)
            .await
    }

    #[instrument(skip_all, fields(project = %self.config.project_name))]
    pub async fn start(&self, options: StartOptions, cancel: &CancellationToken) -> Result<()> {
        self.config
            .start
            .run(self, &Start, options.no_exec, cancel)
            .await
    }

    #[instrument(skip_all, fields(project = %self.config.project_name))]
    pub async fn stop(&self, options: StopOptions, cancel: &CancellationToken) -> Result<()> {
        self.config
            .stop
            .run(self, &Stop, options.no_exec, cancel)
            .await
    }

    #[instrument(
        skip_all,
        fields(
            project = %self.config.project_name,
            purge = options.purge,
            force = options.force
        )
    )]
    pub async fn uninstall(
        &self,
        options: UninstallOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let action = Down {
            purge: options.purge,
            force: options.force,
        };
        self.config
            .uninstall
            .run(self, &action, options.no_exec, cancel)
            .await
    }

    /// Print the service table to standard output
    pub async fn status(&self, cancel: &CancellationToken) -> Result<()> {
        let table = self.status_table(cancel).await?;
        println!("{}", table);
        Ok(())
    }

    /// Current service records formatted as a table
    pub async fn status_table(&self, cancel: &CancellationToken) -> Result<String> {
        let records = self.driver.ps(cancel).await?;
        Ok(format_status_table(&records))
    }

    /// Fail with `NotInstalled` when the driver reports no service record
    pub async fn ensure_installed(&self, cancel: &CancellationToken) -> Result<()> {
        let records = self.driver.ps(cancel).await?;
        if records.is_empty() {
            debug!(project = %self.config.project_name, "No service record found");
            return Err(InstallerError::NotInstalled {
                project: self.config.project_name.clone(),
            });
        }
        Ok(())
    }

    /// Run `cmd` inside the running containers of `service`
    pub async fn execute(
        &self,
        service: &str,
        cmd: &[String],
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.exec.execute(service, cmd, cancel).await
    }

    /// Render a message template against the project namespace
    pub fn render_message(&self, template: &str, vars: Option<&Vars>) -> Result<String> {
        let message = self.renderer.render(template, vars)?;
        Ok(message.trim_end().to_string())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    pub fn driver(&self) -> &dyn ComposeDriver {
        self.driver.as_ref()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Release the driver and wait for the listener to drain
    pub async fn close(self) -> ListenerStats {
        let Self {
            exec,
            driver,
            listener,
            ..
        } = self;
        drop(exec);
        drop(driver);

        match listener.await {
            Ok(stats) => {
                info!(
                    received = stats.received,
                    services_up = stats.services_up,
                    dropped = stats.dropped,
                    "Event listener stopped"
                );
                stats
            }
            Err(err) => {
                warn!(error = %err, "Event listener task failed");
                ListenerStats::default()
            }
        }
    }
}

/// Path of the topology override file, if set
fn compose_override() -> Option<PathBuf> {
    std::env::var_os(ENV_COMPOSE)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Configured documents, or the override file's content when given
pub fn resolve_documents(
    configured: &[String],
    override_path: Option<PathBuf>,
) -> Result<Vec<String>> {
    match override_path {
        Some(path) => {
            debug!(path = %path.display(), "Using topology override");
            let content = std::fs::read_to_string(&path)?;
            Ok(vec![content])
        }
        None => Ok(configured.to_vec()),
    }
}

/// Service names declared across rendered documents, de-duplicated in order.
///
/// Uses the `services` mapping when present. A document without one is read
/// as version 1, where every top-level key is a service, unless it carries a
/// top-level key of the current format (an overlay adding networks, volumes
/// or extension fields only).
pub fn service_names(documents: &[String]) -> Result<Vec<String>> {
    let mut seen = BTreeSet::new();
    let mut names = Vec::new();

    for document in documents {
        for part in serde_yaml::Deserializer::from_str(document) {
            let value = serde_yaml::Value::deserialize(part)
                .map_err(|e| InstallerError::Parse(format!("invalid topology document: {}", e)))?;

            let Some(root) = value.as_mapping() else {
                continue;
            };
            let services = match root.get("services") {
                Some(serde_yaml::Value::Mapping(services)) => services,
                Some(_) => continue,
                None if root.keys().any(is_format_key) => continue,
                None => root,
            };

            for key in services.keys() {
                if let Some(name) = key.as_str() {
                    if seen.insert(name.to_string()) {
                        names.push(name.to_string());
                    }
                }
            }
        }
    }

    Ok(names)
}

/// Top-level keys that mark a document as the current format
const FORMAT_KEYS: &[&str] = &[
    "version", "services", "networks", "volumes", "secrets", "configs", "name", "include",
];

fn is_format_key(key: &serde_yaml::Value) -> bool {
    key.as_str()
        .is_some_and(|key| FORMAT_KEYS.contains(&key) || key.starts_with("x-"))
}

/// Render every message template once so later renders only fail on
/// dynamic input
fn validate_messages(config: &Config, renderer: &Renderer) -> Result<()> {
    let vars = error_vars(&"");
    for (name, operation) in config.operations() {
        let messages = &operation.messages;
        let templates = std::iter::once(messages.description.as_str())
            .chain(messages.runtime_templates());
        for template in templates {
            renderer.render(template, Some(&vars)).map_err(|e| {
                InstallerError::Parse(format!("{} message {:?}: {}", name, template, e))
            })?;
        }
    }
    Ok(())
}
