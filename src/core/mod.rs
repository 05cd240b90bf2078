//! Core lifecycle logic.
//!
//! This module contains:
//! - Template: rendering of topology documents and messages
//! - Engine: the announce/act/exec/report runner behind every operation
//! - Project: install, start, stop, status and uninstall
//! - Listener: background consumer of driver progress events
//! - Exec: commands run inside service containers

pub mod action;
pub mod engine;
pub mod exec;
pub mod listener;
pub mod project;
pub mod report;
pub mod template;

// Re-export commonly used types
pub use action::{Action, Down, Start, Stop, Up, STOP_TIMEOUT};
pub use engine::Phase;
pub use exec::{exec_output, ExecOutput, ExecRunner};
pub use listener::{EventListener, EventSink, ListenerStats, EVENT_QUEUE_CAPACITY};
pub use project::Project;
pub use report::{Level, MemoryReporter, Reporter, TracingReporter};
pub use template::{error_vars, Renderer, Vars};
