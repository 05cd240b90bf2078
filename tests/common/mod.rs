//! In-memory doubles for the compose driver and the runtime client.
//!
//! Driver calls, runtime calls and reported info/error lines all go to one
//! shared journal so tests can assert their relative order.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use compose_installer::adapters::{
    ComposeDriver, DownOptions, ExecConfig, OutputStream, RuntimeClient, Topology,
};
use compose_installer::config::Config;
use compose_installer::core::{exec_output, EventSink, Level, Project, Reporter};
use compose_installer::domain::{ContainerInfo, Event, EventKind, Exec, ServiceRecord};
use compose_installer::error::{InstallerError, Result};

pub type Journal = Arc<Mutex<Vec<String>>>;

fn record(journal: &Journal, line: impl Into<String>) {
    journal.lock().unwrap().push(line.into());
}

/// Records info and error lines; debug progress lines are counted only
pub struct JournalReporter {
    journal: Journal,
    pub debug_lines: Mutex<Vec<String>>,
}

impl Reporter for JournalReporter {
    fn report(&self, level: Level, message: &str) {
        match level {
            Level::Info => record(&self.journal, format!("info: {}", message)),
            Level::Error => record(&self.journal, format!("error: {}", message)),
            Level::Warn => record(&self.journal, format!("warn: {}", message)),
            Level::Debug => self.debug_lines.lock().unwrap().push(message.to_string()),
        }
    }
}

/// Topology state held by the fake driver
#[derive(Debug, Default)]
pub struct DriverState {
    /// Containers per service
    pub containers: BTreeMap<String, Vec<ContainerInfo>>,
    pub images_removed: bool,
    pub volumes_removed: bool,
    /// Error returned by the next `up`
    pub fail_up: Option<String>,
}

pub struct MockDriver {
    topology: Topology,
    events: EventSink,
    journal: Journal,
    state: Arc<Mutex<DriverState>>,
}

impl MockDriver {
    fn check(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(InstallerError::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
impl ComposeDriver for MockDriver {
    async fn up(&self, cancel: &CancellationToken) -> Result<()> {
        record(&self.journal, "driver: up");
        self.check(cancel)?;
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_up.take() {
            return Err(InstallerError::Driver(message));
        }

        self.events.emit(Event::project(EventKind::ProjectUpStart));
        for service in &self.topology.services {
            let containers = state.containers.entry(service.clone()).or_default();
            if containers.is_empty() {
                let id = format!("{}-{}-1", self.topology.project_name, service);
                containers.push(ContainerInfo::new(id, true));
            }
            for container in containers.iter_mut() {
                container.running = true;
            }
            self.events.emit(
                Event::service(EventKind::ServiceUp, service.clone())
                    .with_data("container", containers[0].id.clone()),
            );
        }
        self.events.emit(Event::project(EventKind::ProjectUpDone));
        Ok(())
    }

    async fn start(&self, cancel: &CancellationToken) -> Result<()> {
        record(&self.journal, "driver: start");
        self.check(cancel)?;
        let mut state = self.state.lock().unwrap();
        for container in state.containers.values_mut().flatten() {
            container.running = true;
        }
        Ok(())
    }

    async fn stop(&self, timeout: Duration, cancel: &CancellationToken) -> Result<()> {
        record(&self.journal, format!("driver: stop {}s", timeout.as_secs()));
        self.check(cancel)?;
        let mut state = self.state.lock().unwrap();
        for container in state.containers.values_mut().flatten() {
            container.running = false;
        }
        Ok(())
    }

    async fn down(&self, options: DownOptions, cancel: &CancellationToken) -> Result<()> {
        record(
            &self.journal,
            format!(
                "driver: down images={} volumes={}",
                options.remove_images, options.remove_volumes
            ),
        );
        self.check(cancel)?;
        let mut state = self.state.lock().unwrap();
        state.containers.clear();
        state.images_removed |= options.remove_images;
        state.volumes_removed |= options.remove_volumes;
        Ok(())
    }

    async fn ps(&self, cancel: &CancellationToken) -> Result<Vec<ServiceRecord>> {
        record(&self.journal, "driver: ps");
        self.check(cancel)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .flat_map(|(service, containers)| {
                containers.iter().map(move |c| ServiceRecord {
                    name: c.id.clone(),
                    service: service.clone(),
                    command: "docker-entrypoint.sh".to_string(),
                    state: if c.running { "running" } else { "exited" }.to_string(),
                    ports: String::new(),
                })
            })
            .collect())
    }

    async fn containers(
        &self,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContainerInfo>> {
        record(&self.journal, format!("driver: containers {}", service));
        self.check(cancel)?;
        let state = self.state.lock().unwrap();
        Ok(state.containers.get(service).cloned().unwrap_or_default())
    }
}

/// Exec state held by the fake runtime
#[derive(Debug, Default)]
pub struct RuntimeState {
    /// Exit code per command line; unknown commands exit 0
    pub exit_codes: HashMap<String, i64>,
    /// Output per command line; unknown commands print nothing
    pub outputs: HashMap<String, Vec<String>>,
    /// Command lines whose output stream never ends
    pub endless: HashSet<String>,
    execs: HashMap<String, String>,
    next_id: usize,
}

pub struct MockRuntime {
    journal: Journal,
    state: Arc<Mutex<RuntimeState>>,
}

#[async_trait]
impl RuntimeClient for MockRuntime {
    async fn create_exec(
        &self,
        container_id: &str,
        config: &ExecConfig,
        _cancel: &CancellationToken,
    ) -> Result<String> {
        assert!(config.tty && config.attach_stdout && config.attach_stderr);
        let command = config.cmd.join(" ");
        record(
            &self.journal,
            format!("runtime: create_exec {} {}", container_id, command),
        );

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("exec-{}", state.next_id);
        state.execs.insert(id.clone(), command);
        Ok(id)
    }

    async fn attach_exec(
        &self,
        exec_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<OutputStream> {
        record(&self.journal, format!("runtime: attach {}", exec_id));
        let state = self.state.lock().unwrap();
        let command = state.execs.get(exec_id).cloned().unwrap_or_default();
        if state.endless.contains(&command) {
            return Ok(futures::stream::pending().boxed());
        }
        let chunks: Vec<Result<Bytes>> = state
            .outputs
            .get(&command)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|chunk| Ok(Bytes::from(chunk)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn inspect_exec(&self, exec_id: &str, _cancel: &CancellationToken) -> Result<i64> {
        record(&self.journal, format!("runtime: inspect {}", exec_id));
        let state = self.state.lock().unwrap();
        let command = state.execs.get(exec_id).cloned().unwrap_or_default();
        Ok(state.exit_codes.get(&command).copied().unwrap_or(0))
    }
}

/// Captures exec output written by the project
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A project wired to the doubles
pub struct Harness {
    pub project: Project,
    pub journal: Journal,
    pub driver: Arc<Mutex<DriverState>>,
    pub runtime: Arc<Mutex<RuntimeState>>,
    pub reporter: Arc<JournalReporter>,
    pub output: SharedBuffer,
}

impl Harness {
    pub fn new(config: Config) -> Result<Self> {
        let journal: Journal = Arc::default();
        let driver: Arc<Mutex<DriverState>> = Arc::default();
        let runtime: Arc<Mutex<RuntimeState>> = Arc::default();
        let reporter = Arc::new(JournalReporter {
            journal: Arc::clone(&journal),
            debug_lines: Mutex::default(),
        });
        let output = SharedBuffer::default();

        let mock_runtime = Arc::new(MockRuntime {
            journal: Arc::clone(&journal),
            state: Arc::clone(&runtime),
        });
        let driver_journal = Arc::clone(&journal);
        let driver_state = Arc::clone(&driver);
        let make_driver = move |topology: Topology, events: EventSink| {
            let driver: Arc<dyn ComposeDriver> = Arc::new(MockDriver {
                topology,
                events,
                journal: driver_journal,
                state: driver_state,
            });
            Ok(driver)
        };
        let project = Project::with_driver(config, reporter.clone(), mock_runtime, make_driver)?
            .with_exec_output(exec_output(output.clone()));

        Ok(Self {
            project,
            journal,
            driver,
            runtime,
            reporter,
            output,
        })
    }

    /// Journal lines recorded so far
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().unwrap().clear();
    }

    /// Number of containers the fake driver currently holds
    pub fn container_count(&self) -> usize {
        self.driver.lock().unwrap().containers.values().map(Vec::len).sum()
    }

    /// Whether the runtime was contacted since the journal was last cleared
    pub fn runtime_contacted(&self) -> bool {
        self.journal().iter().any(|line| line.starts_with("runtime:"))
    }
}

/// One-service configuration named `demo` with an `echo hi` install exec
pub fn demo_config() -> Config {
    let mut config = Config::new("demo")
        .with_compose("services:\n  demo:\n    image: redis:{{ RedisTag }}\n")
        .with_var("RedisTag", "4.0.6-alpine");
    config.install.execs.push(Exec::new("demo", ["echo", "hi"]));
    config
}

/// Two-service configuration without execs
pub fn web_config() -> Config {
    Config::new("shop").with_compose(
        "services:\n  web:\n    image: nginx\n  db:\n    image: postgres\n",
    )
}
