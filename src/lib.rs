//! compose-installer - Lifecycle installer for docker compose topologies
//!
//! Drives a declared multi-service topology through install, start, stop,
//! status and uninstall. The installer does not schedule containers: it
//! sequences calls to a compose driver and a container runtime client and
//! reports the outcome with configurable messages.
//!
//! # Architecture
//!
//! Every lifecycle command runs through the same four phases:
//! - Announce: render and print the announcement message
//! - Act: call the driver (up, start, stop, down)
//! - Exec: run the configured commands inside service containers
//! - Report: print the success or failure message
//!
//! Driver progress events are drained by a background listener and logged
//! at debug level.
//!
//! # Modules
//!
//! - `adapters`: Compose driver and container runtime integrations
//! - `core`: Templates, operation engine, project, listener, exec runner
//! - `domain`: Data structures (Operation, Exec, Event, ServiceRecord)
//! - `config`: Configuration loading and default messages
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Bring the topology up and run the install execs
//! compose-installer install
//!
//! # Show the service table
//! compose-installer status
//!
//! # Remove everything, including images and volumes
//! compose-installer uninstall --purge
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use core::{Project, Renderer, Reporter};
pub use domain::{Event, EventKind, Exec, Messages, Operation};
pub use error::{InstallerError, Result};
