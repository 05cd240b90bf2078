//! Orchestration driver backed by the `docker compose` CLI.
//!
//! Rendered topology documents are written to temporary files that live as
//! long as the driver. Every lifecycle call spawns one `docker compose`
//! subprocess; its progress lines on stderr are turned into [`Event`]s and
//! pushed to the listener without blocking.

use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ComposeDriver, DownOptions, Topology};
use crate::core::listener::EventSink;
use crate::domain::{ContainerInfo, Event, EventKind, ServiceRecord};
use crate::error::{InstallerError, Result};

/// Number of stderr lines kept to build error messages
const STDERR_TAIL: usize = 20;

/// Driver running `docker compose` subcommands
pub struct ComposeCli {
    /// Path to the docker binary (default: "docker")
    binary_path: String,

    /// Directory relative paths in the documents resolve against
    project_directory: Option<PathBuf>,

    topology: Topology,

    /// Rendered documents on disk, removed when the driver is dropped
    files: Vec<NamedTempFile>,

    events: EventSink,
}

impl ComposeCli {
    /// Write the rendered documents to disk and build the driver
    pub fn new(topology: Topology, events: EventSink) -> Result<Self> {
        let mut files = Vec::with_capacity(topology.documents.len());
        for document in &topology.documents {
            let mut file = tempfile::Builder::new()
                .prefix("compose-")
                .suffix(".yml")
                .tempfile()?;
            file.write_all(document.as_bytes())?;
            file.flush()?;
            files.push(file);
        }

        Ok(Self {
            binary_path: "docker".to_string(),
            project_directory: std::env::current_dir().ok(),
            topology,
            files,
            events,
        })
    }

    /// Use a custom docker binary
    pub fn with_binary_path(mut self, binary_path: impl Into<String>) -> Self {
        self.binary_path = binary_path.into();
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("compose")
            .arg("--project-name")
            .arg(&self.topology.project_name);

        if let Some(dir) = &self.project_directory {
            cmd.arg("--project-directory").arg(dir);
        }

        for file in &self.files {
            cmd.arg("--file").arg(file.path());
        }

        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run one compose subcommand, returning its stdout
    async fn run(&self, args: &[&str], cancel: &CancellationToken) -> Result<String> {
        debug!(binary = %self.binary_path, ?args, "Running docker compose");

        let mut child = self.command(args).spawn().map_err(|e| {
            InstallerError::Driver(format!("failed to spawn {} compose: {}", self.binary_path, e))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let read_stdout = async {
            let mut buffer = String::new();
            if let Some(mut stdout) = stdout {
                stdout.read_to_string(&mut buffer).await?;
            }
            Ok::<_, std::io::Error>(buffer)
        };

        let read_stderr = async {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Some(line) = lines.next_line().await? {
                    match parse_progress_line(&self.topology.project_name, &line) {
                        Some(event) => self.events.emit(event),
                        None => debug!(line = %line.trim(), "compose"),
                    }
                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            Ok::<_, std::io::Error>(tail)
        };

        let work = async {
            let (output, tail) = tokio::try_join!(read_stdout, read_stderr)?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, output, tail))
        };

        let (status, output, tail) = tokio::select! {
            _ = cancel.cancelled() => return Err(InstallerError::Cancelled),
            result = work => result?,
        };

        if !status.success() {
            let message = tail
                .iter()
                .rev()
                .map(|l| l.trim())
                .find(|l| !l.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    format!(
                        "docker compose {} failed with exit code {}",
                        args.join(" "),
                        status.code().unwrap_or(-1)
                    )
                });
            return Err(InstallerError::Driver(message));
        }

        Ok(output)
    }

    async fn list(
        &self,
        service: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<PsEntry>> {
        let mut args = vec!["ps", "--all", "--format", "json"];
        if let Some(service) = service {
            args.push(service);
        }
        let output = self.run(&args, cancel).await?;
        parse_ps_output(&output)
    }
}

#[async_trait]
impl ComposeDriver for ComposeCli {
    async fn up(&self, cancel: &CancellationToken) -> Result<()> {
        self.events.emit(Event::project(EventKind::ProjectUpStart));
        self.run(&["up", "--detach"], cancel).await?;
        self.events.emit(Event::project(EventKind::ProjectUpDone));
        Ok(())
    }

    async fn start(&self, cancel: &CancellationToken) -> Result<()> {
        self.events.emit(Event::project(EventKind::ProjectStartStart));
        self.run(&["start"], cancel).await?;
        self.events.emit(Event::project(EventKind::ProjectStartDone));
        Ok(())
    }

    async fn stop(&self, timeout: Duration, cancel: &CancellationToken) -> Result<()> {
        self.events.emit(Event::project(EventKind::ProjectStopStart));
        let secs = timeout.as_secs().to_string();
        self.run(&["stop", "--timeout", &secs], cancel).await?;
        self.events.emit(Event::project(EventKind::ProjectStopDone));
        Ok(())
    }

    async fn down(&self, options: DownOptions, cancel: &CancellationToken) -> Result<()> {
        self.events.emit(Event::project(EventKind::ProjectDownStart));
        let mut args = vec!["down"];
        if options.remove_images {
            args.extend(["--rmi", "all"]);
        }
        if options.remove_volumes {
            args.push("--volumes");
        }
        self.run(&args, cancel).await?;
        self.events.emit(Event::project(EventKind::ProjectDownDone));
        Ok(())
    }

    async fn ps(&self, cancel: &CancellationToken) -> Result<Vec<ServiceRecord>> {
        let entries = self.list(None, cancel).await?;
        Ok(entries.into_iter().map(PsEntry::into_record).collect())
    }

    async fn containers(
        &self,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContainerInfo>> {
        let entries = self.list(Some(service), cancel).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.service.is_empty() || e.service == service)
            .map(|e| ContainerInfo::new(e.id, e.state.eq_ignore_ascii_case("running")))
            .collect())
    }
}

/// One entry of `docker compose ps --format json`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct PsEntry {
    #[serde(rename = "ID")]
    id: String,
    name: String,
    service: String,
    command: String,
    state: String,
    ports: String,
    publishers: Option<Vec<Publisher>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct Publisher {
    #[serde(rename = "URL")]
    url: String,
    target_port: u16,
    published_port: u16,
    protocol: String,
}

impl PsEntry {
    fn into_record(self) -> ServiceRecord {
        let ports = if self.ports.is_empty() {
            self.publishers
                .unwrap_or_default()
                .iter()
                .map(Publisher::describe)
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            self.ports
        };

        ServiceRecord {
            name: self.name,
            service: self.service,
            command: self.command.trim_matches('"').to_string(),
            state: self.state,
            ports,
        }
    }
}

impl Publisher {
    fn describe(&self) -> String {
        if self.published_port == 0 {
            format!("{}/{}", self.target_port, self.protocol)
        } else {
            format!(
                "{}:{}->{}/{}",
                self.url, self.published_port, self.target_port, self.protocol
            )
        }
    }
}

/// Accepts both a JSON array and newline-delimited JSON objects
fn parse_ps_output(output: &str) -> Result<Vec<PsEntry>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| InstallerError::Driver(format!("invalid compose ps output: {}", e)));
    }

    trimmed
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            serde_json::from_str(l)
                .map_err(|e| InstallerError::Driver(format!("invalid compose ps output: {}", e)))
        })
        .collect()
}

/// Turn a compose progress line such as ` ✔ Container demo-web-1  Started`
/// into an event. Lines that are not progress lines yield `None`.
fn parse_progress_line(project: &str, line: &str) -> Option<Event> {
    let line = line.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());
    let tokens: Vec<&str> = line.split_whitespace().collect();

    if let [service, status] = tokens.as_slice() {
        let kind = match *status {
            "Pulling" => EventKind::ServicePull,
            "Pulled" => EventKind::ServicePulled,
            _ => return None,
        };
        return Some(Event::service(kind, *service));
    }

    let [resource, name, status, ..] = tokens.as_slice() else {
        return None;
    };
    let (resource, name, status) = (*resource, name.trim_matches('"'), *status);

    match resource {
        "Container" => {
            let kind = match status {
                "Creating" | "Recreate" => EventKind::ServiceCreate,
                "Created" | "Recreated" => EventKind::ServiceCreated,
                "Starting" => EventKind::ServiceStart,
                "Started" | "Running" | "Healthy" => EventKind::ServiceUp,
                "Stopping" => EventKind::ServiceStop,
                "Stopped" => EventKind::ServiceStopped,
                "Removing" => EventKind::ServiceRemove,
                "Removed" => EventKind::ServiceRemoved,
                _ => return None,
            };
            Some(Event::service(kind, service_of(project, name)).with_data("container", name))
        }
        "Network" | "Volume" | "Image" => {
            let kind = match (resource, status) {
                ("Network", "Created") => EventKind::NetworkCreated,
                ("Network", "Removed") => EventKind::NetworkRemoved,
                ("Volume", "Created") => EventKind::VolumeCreated,
                ("Volume", "Removed") => EventKind::VolumeRemoved,
                ("Image", "Removed") => EventKind::ImageRemoved,
                _ => return None,
            };
            Some(Event::project(kind).with_data(resource.to_ascii_lowercase(), name))
        }
        _ => None,
    }
}

/// `demo-web-1` (or `demo_web_1`) in project `demo` belongs to service `web`
fn service_of(project: &str, container: &str) -> String {
    let name = container
        .strip_prefix(project)
        .and_then(|rest| rest.strip_prefix(&['-', '_'][..]))
        .unwrap_or(container);

    match name.rsplit_once(&['-', '_'][..]) {
        Some((service, index))
            if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) =>
        {
            service.to_string()
        }
        _ => name.to_string(),
    }
}
