//! Installer configuration.
//!
//! Configuration sources (highest priority first):
//! 1. `INSTALLER_CONFIG` naming the configuration file
//! 2. `installer.yaml` found in the current directory or one of its parents
//!
//! Paths inside the file (`compose_files`) are relative to the file's
//! parent directory. `INSTALLER_COMPOSE` is read later, when the project is
//! built, and replaces the topology documents wholesale.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::domain::{Exec, Messages, Operation};
use crate::error::{InstallerError, Result};

/// Environment variable naming the configuration file
pub const ENV_CONFIG: &str = "INSTALLER_CONFIG";

/// Environment variable naming a topology file that replaces the configured ones
pub const ENV_COMPOSE: &str = "INSTALLER_COMPOSE";

/// File name searched for when `INSTALLER_CONFIG` is not set
pub const CONFIG_FILE_NAME: &str = "installer.yaml";

/// Everything needed to drive one topology through its lifecycle
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifier used in messages and as the topology namespace
    pub project_name: String,

    /// Raw topology documents, templated before use
    pub compose: Vec<String>,

    /// User variables, overriding the builtins
    pub template_vars: BTreeMap<String, serde_json::Value>,

    pub install: Operation,
    pub start: Operation,
    pub stop: Operation,
    pub status: Operation,
    pub uninstall: Operation,
}

impl Config {
    /// Create a configuration with the default message set
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            compose: Vec::new(),
            template_vars: BTreeMap::new(),
            install: Operation::new(Messages::new(
                "Installs {{ Project }} into your system.",
                "Installing {{ Project }}...",
                "Failed to install {{ Project }}: {{ Error }}.",
                "{{ Project }} was successfully installed.",
            )),
            start: Operation::new(Messages::new(
                "Starts {{ Project }}.",
                "Starting {{ Project }}...",
                "Failed to start {{ Project }}: {{ Error }}.",
                "{{ Project }} started.",
            )),
            stop: Operation::new(Messages::new(
                "Stops {{ Project }}.",
                "Stopping {{ Project }}...",
                "Failed to stop {{ Project }}: {{ Error }}.",
                "{{ Project }} stopped.",
            )),
            status: Operation::new(Messages {
                description: "Show the status of {{ Project }}.".to_string(),
                ..Messages::default()
            }),
            uninstall: Operation::new(Messages::new(
                "Remove {{ Project }} from your system.",
                "Uninstalling {{ Project }}...",
                "Failed to uninstall {{ Project }}: {{ Error }}.",
                "{{ Project }} was successfully uninstalled.",
            )),
        }
    }

    /// Append a raw topology document
    pub fn with_compose(mut self, document: impl Into<String>) -> Self {
        self.compose.push(document.into());
        self
    }

    /// Set a user template variable
    pub fn with_var(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.template_vars.insert(name.into(), value.into());
        self
    }

    /// Every operation with its command name
    pub fn operations(&self) -> [(&'static str, &Operation); 5] {
        [
            ("install", &self.install),
            ("start", &self.start),
            ("stop", &self.stop),
            ("status", &self.status),
            ("uninstall", &self.uninstall),
        ]
    }

    /// Reject configurations no project can be built from
    pub fn validate(&self) -> Result<()> {
        if self.project_name.trim().is_empty() {
            return Err(InstallerError::Config("project name is empty".to_string()));
        }
        if !is_valid_project_name(&self.project_name) {
            return Err(InstallerError::Config(format!(
                "project name {:?} must start with a lowercase letter or digit and \
                 contain only lowercase letters, digits, '-' or '_'",
                self.project_name
            )));
        }
        if self.compose.is_empty() {
            return Err(InstallerError::Config(format!(
                "project {} has no topology document",
                self.project_name
            )));
        }
        Ok(())
    }

    /// Parse a YAML configuration; `base_dir` anchors relative `compose_files`
    pub fn from_yaml(content: &str, base_dir: &Path) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| InstallerError::Config(format!("cannot parse configuration: {}", e)))?;

        let mut config = Config::new(file.project);
        config.compose = file.compose;
        for path in &file.compose_files {
            let path = resolve_path(base_dir, path);
            let document = std::fs::read_to_string(&path).map_err(|e| {
                InstallerError::Config(format!("cannot read {}: {}", path.display(), e))
            })?;
            config.compose.push(document);
        }
        config.template_vars = file.template_vars;

        file.install.apply(&mut config.install);
        file.start.apply(&mut config.start);
        file.stop.apply(&mut config.stop);
        file.status.apply(&mut config.status);
        file.uninstall.apply(&mut config.uninstall);

        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            InstallerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let base_dir = path.parent().unwrap_or(Path::new("."));
        Self::from_yaml(&content, base_dir)
    }

    /// Load the configuration named by `INSTALLER_CONFIG` or found by discovery
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(ENV_CONFIG).filter(|v| !v.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => {
                let cwd = std::env::current_dir()?;
                find_config_file(&cwd).ok_or_else(|| {
                    InstallerError::Config(format!(
                        "no {} found in {} or its parents (set {})",
                        CONFIG_FILE_NAME,
                        cwd.display(),
                        ENV_CONFIG
                    ))
                })?
            }
        };

        debug!(path = %path.display(), "Loading configuration");
        Self::from_file(&path)
    }
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    project: String,
    #[serde(default)]
    compose: Vec<String>,
    #[serde(default)]
    compose_files: Vec<String>,
    #[serde(default)]
    template_vars: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    install: OperationFile,
    #[serde(default)]
    start: OperationFile,
    #[serde(default)]
    stop: OperationFile,
    #[serde(default)]
    status: OperationFile,
    #[serde(default)]
    uninstall: OperationFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OperationFile {
    #[serde(default)]
    messages: MessagesFile,
    #[serde(default)]
    execs: Vec<Exec>,
}

/// Message overrides; missing fields keep the defaults
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MessagesFile {
    description: Option<String>,
    announcement: Option<String>,
    failure: Option<String>,
    success: Option<String>,
}

impl OperationFile {
    fn apply(self, operation: &mut Operation) {
        let messages = &mut operation.messages;
        if let Some(description) = self.messages.description {
            messages.description = description;
        }
        if let Some(announcement) = self.messages.announcement {
            messages.announcement = announcement;
        }
        if let Some(failure) = self.messages.failure {
            messages.failure = failure;
        }
        if let Some(success) = self.messages.success {
            messages.success = success;
        }
        operation.execs = self.execs;
    }
}

/// Find the config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Names `docker compose` accepts for a project
fn is_valid_project_name(name: &str) -> bool {
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let mut chars = name.chars();
    chars.next().is_some_and(alnum) && chars.all(|c| alnum(c) || c == '-' || c == '_')
}
