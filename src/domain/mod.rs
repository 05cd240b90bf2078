//! Domain types for the installer.
//!
//! This module contains the plain data structures:
//! - Operation: messages and post-action execs for one lifecycle command
//! - Events: progress notifications emitted by the orchestration driver
//! - Service: service records and containers reported by the driver

pub mod events;
pub mod operation;
pub mod service;

// Re-export commonly used types
pub use events::{Event, EventKind};
pub use operation::{
    shell_command, Exec, InstallOptions, Messages, Operation, StartOptions, StopOptions,
    UninstallOptions, DEFAULT_SHELL,
};
pub use service::{format_status_table, ContainerInfo, ServiceRecord};
