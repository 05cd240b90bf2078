//! Operation descriptors.
//!
//! Every lifecycle command (install, start, stop, status, uninstall) is
//! described by an [`Operation`]: the messages printed around it and the
//! commands executed inside service containers once its action succeeds.

use serde::{Deserialize, Deserializer, Serialize};

/// Shell used when an exec command is given as a single string
pub const DEFAULT_SHELL: [&str; 2] = ["/bin/sh", "-c"];

/// Tokens running `script` through [`DEFAULT_SHELL`]
pub fn shell_command(script: impl Into<String>) -> Vec<String> {
    DEFAULT_SHELL
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(script.into()))
        .collect()
}

/// Message templates for one operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Messages {
    /// Shown in the help of the command
    #[serde(default)]
    pub description: String,

    /// Printed before the action runs
    #[serde(default)]
    pub announcement: String,

    /// Printed after a failure; receives the `Error` variable
    #[serde(default)]
    pub failure: String,

    /// Printed after everything succeeded
    #[serde(default)]
    pub success: String,
}

impl Messages {
    pub fn new(
        description: impl Into<String>,
        announcement: impl Into<String>,
        failure: impl Into<String>,
        success: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            announcement: announcement.into(),
            failure: failure.into(),
            success: success.into(),
        }
    }

    /// Iterate over the templates that are rendered at run time
    pub fn runtime_templates(&self) -> [&str; 3] {
        [&self.announcement, &self.failure, &self.success]
    }
}

/// A command executed inside the running containers of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exec {
    /// Target service name
    pub service: String,

    /// Command tokens
    #[serde(deserialize_with = "deserialize_command")]
    pub cmd: Vec<String>,
}

impl Exec {
    /// Create an exec from explicit tokens
    pub fn new<I, S>(service: impl Into<String>, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service: service.into(),
            cmd: cmd.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an exec that runs `script` through the default shell
    pub fn shell(service: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            cmd: shell_command(script),
        }
    }

    /// Command as a single printable line
    pub fn command_line(&self) -> String {
        self.cmd.join(" ")
    }
}

/// Accepts `cmd: [a, b]` as tokens and `cmd: "a && b"` as a shell script
fn deserialize_command<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Command {
        Tokens(Vec<String>),
        Script(String),
    }

    Ok(match Command::deserialize(deserializer)? {
        Command::Tokens(tokens) => tokens,
        Command::Script(script) => shell_command(script),
    })
}

/// Messages and post-action execs of one lifecycle command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operation {
    pub messages: Messages,

    /// Executed in declared order after the action succeeds
    pub execs: Vec<Exec>,
}

impl Operation {
    pub fn new(messages: Messages) -> Self {
        Self {
            messages,
            execs: Vec::new(),
        }
    }

    /// Append an exec entry
    pub fn with_exec(mut self, exec: Exec) -> Self {
        self.execs.push(exec);
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Skip the execs configured for install
    pub no_exec: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Skip the execs configured for start
    pub no_exec: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StopOptions {
    /// Skip the execs configured for stop
    pub no_exec: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UninstallOptions {
    /// Skip the execs configured for uninstall
    pub no_exec: bool,

    /// Also remove the images and volumes of the topology
    pub purge: bool,

    /// Uninstall even if no installation is detected
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_tokens_from_yaml() {
        let exec: Exec = serde_yaml::from_str("service: web\ncmd: [echo, hi]\n").unwrap();
        assert_eq!(exec, Exec::new("web", ["echo", "hi"]));
    }

    #[test]
    fn test_exec_script_uses_default_shell() {
        let exec: Exec = serde_yaml::from_str("service: web\ncmd: echo hi && true\n").unwrap();
        assert_eq!(exec.cmd, vec!["/bin/sh", "-c", "echo hi && true"]);
        assert_eq!(exec, Exec::shell("web", "echo hi && true"));
    }

    #[test]
    fn test_shell_command_wraps_script() {
        assert_eq!(shell_command("ls -la"), vec!["/bin/sh", "-c", "ls -la"]);
    }

    #[test]
    fn test_partial_messages_keep_missing_fields_empty() {
        let messages: Messages = serde_yaml::from_str("success: done\n").unwrap();
        assert_eq!(messages.success, "done");
        assert!(messages.announcement.is_empty());
    }
}
