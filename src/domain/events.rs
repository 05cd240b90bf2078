//! Progress events emitted by the orchestration driver.
//!
//! Events are transient: the driver produces them while a transition is
//! converging and the listener consumes each one exactly once.

use std::collections::BTreeMap;
use std::fmt;

/// A single progress notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// What happened
    pub kind: EventKind,

    /// Service the event refers to, `None` for project-wide events
    pub service: Option<String>,

    /// Auxiliary key/value data
    pub data: BTreeMap<String, String>,
}

impl Event {
    /// Create a project-wide event
    pub fn project(kind: EventKind) -> Self {
        Self {
            kind,
            service: None,
            data: BTreeMap::new(),
        }
    }

    /// Create an event for a service
    pub fn service(kind: EventKind, service: impl Into<String>) -> Self {
        Self {
            kind,
            service: Some(service.into()),
            data: BTreeMap::new(),
        }
    }

    /// Attach a key/value pair
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Auxiliary data rendered as `key=value` pairs
    pub fn data_pairs(&self) -> String {
        self.data
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Kinds of events a driver can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ProjectUpStart,
    ProjectUpDone,
    ProjectStartStart,
    ProjectStartDone,
    ProjectStopStart,
    ProjectStopDone,
    ProjectDownStart,
    ProjectDownDone,

    ServiceCreate,
    ServiceCreated,
    ServiceStart,
    /// A service instance became available
    ServiceUp,
    ServiceStop,
    ServiceStopped,
    ServiceRemove,
    ServiceRemoved,
    ServicePull,
    ServicePulled,

    NetworkCreated,
    NetworkRemoved,
    VolumeCreated,
    VolumeRemoved,
    ImageRemoved,
}

impl EventKind {
    /// True when the event signals a new available service instance
    pub fn is_service_up(self) -> bool {
        matches!(self, Self::ServiceUp)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ProjectUpStart => "Starting project",
            Self::ProjectUpDone => "Project started",
            Self::ProjectStartStart => "Starting project",
            Self::ProjectStartDone => "Project started",
            Self::ProjectStopStart => "Stopping project",
            Self::ProjectStopDone => "Project stopped",
            Self::ProjectDownStart => "Stopping and removing project",
            Self::ProjectDownDone => "Project down",
            Self::ServiceCreate => "Creating",
            Self::ServiceCreated => "Created",
            Self::ServiceStart => "Starting",
            Self::ServiceUp => "Started",
            Self::ServiceStop => "Stopping",
            Self::ServiceStopped => "Stopped",
            Self::ServiceRemove => "Removing",
            Self::ServiceRemoved => "Removed",
            Self::ServicePull => "Pulling",
            Self::ServicePulled => "Pulled",
            Self::NetworkCreated => "Network created",
            Self::NetworkRemoved => "Network removed",
            Self::VolumeCreated => "Volume created",
            Self::VolumeRemoved => "Volume removed",
            Self::ImageRemoved => "Image removed",
        };
        f.write_str(s)
    }
}
