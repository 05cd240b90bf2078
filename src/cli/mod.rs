//! Command-line interface for compose-installer.
//!
//! Provides one command per lifecycle operation. The help text of every
//! command is the operation's rendered description message.

use std::process::ExitCode;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::Config;
use crate::core::{Project, Renderer};
use crate::domain::{InstallOptions, StartOptions, StopOptions, UninstallOptions};
use crate::error::Result;

/// compose-installer - Lifecycle installer for docker compose topologies
#[derive(Parser, Debug)]
#[command(name = "compose-installer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show debug output, including driver progress
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Install the project
    Install {
        /// Skip the configured execs
        #[arg(long)]
        no_exec: bool,
    },

    /// Start the project
    Start {
        /// Skip the configured execs
        #[arg(long)]
        no_exec: bool,
    },

    /// Stop the project
    Stop {
        /// Skip the configured execs
        #[arg(long)]
        no_exec: bool,
    },

    /// Show the status of the project
    Status,

    /// Uninstall the project
    Uninstall {
        /// Skip the configured execs
        #[arg(long)]
        no_exec: bool,

        /// Also remove images and volumes
        #[arg(long)]
        purge: bool,

        /// Uninstall even if the project does not look installed
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Clap command whose subcommand help comes from the configured messages
    pub fn command_for(config: &Config, renderer: &Renderer) -> clap::Command {
        let mut command = <Self as CommandFactory>::command();
        for (name, operation) in config.operations() {
            let about = renderer.must_render(&operation.messages.description, None);
            if !about.trim().is_empty() {
                command = command.mut_subcommand(name, move |sub| sub.about(about));
            }
        }
        command
    }

    /// Parse `args` against [`Cli::command_for`]
    pub fn try_parse_for<I, T>(
        config: &Config,
        renderer: &Renderer,
        args: I,
    ) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut command = Self::command_for(config, renderer);
        let matches = command.try_get_matches_from_mut(args)?;
        Self::from_arg_matches(&matches).map_err(|err| err.format(&mut command))
    }

    /// Run the selected command and map its outcome to an exit code.
    ///
    /// Lifecycle failures were already reported through their failure
    /// message; status has no message envelope, so its error is logged here.
    pub async fn execute(self, project: &Project, cancel: &CancellationToken) -> ExitCode {
        let result = self.dispatch(project, cancel).await;
        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                if err.is_cancelled() {
                    warn!("Interrupted");
                }
                ExitCode::FAILURE
            }
        }
    }

    async fn dispatch(self, project: &Project, cancel: &CancellationToken) -> Result<()> {
        match self.command {
            Commands::Install { no_exec } => {
                project.install(InstallOptions { no_exec }, cancel).await
            }
            Commands::Start { no_exec } => project.start(StartOptions { no_exec }, cancel).await,
            Commands::Stop { no_exec } => project.stop(StopOptions { no_exec }, cancel).await,
            Commands::Status => project.status(cancel).await.map_err(|err| {
                error!("{}", err);
                err
            }),
            Commands::Uninstall {
                no_exec,
                purge,
                force,
            } => {
                let options = UninstallOptions {
                    no_exec,
                    purge,
                    force,
                };
                project.uninstall(options, cancel).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn setup() -> (Config, Renderer) {
        let config = Config::new("demo").with_compose("services: {}");
        let renderer = Renderer::from_config(&config);
        (config, renderer)
    }

    #[test]
    fn test_parse_uninstall_flags() {
        let (config, renderer) = setup();
        let cli = Cli::try_parse_for(
            &config,
            &renderer,
            ["compose-installer", "uninstall", "--purge", "--force"],
        )
        .unwrap();

        assert!(!cli.debug);
        assert_eq!(
            cli.command,
            Commands::Uninstall {
                no_exec: false,
                purge: true,
                force: true
            }
        );
    }

    #[test]
    fn test_debug_is_global() {
        let (config, renderer) = setup();
        let cli = Cli::try_parse_for(
            &config,
            &renderer,
            ["compose-installer", "install", "--no-exec", "--debug"],
        )
        .unwrap();

        assert!(cli.debug);
        assert_eq!(cli.command, Commands::Install { no_exec: true });
    }

    #[test]
    fn test_help_uses_rendered_description() {
        let (config, renderer) = setup();
        let mut command = Cli::command_for(&config, &renderer);
        let help = command
            .find_subcommand_mut("install")
            .unwrap()
            .render_help()
            .to_string();
        assert!(help.contains("Installs demo into your system."));
    }

    #[test]
    fn test_help_request_is_reported_as_help() {
        let (config, renderer) = setup();
        let err = Cli::try_parse_for(&config, &renderer, ["compose-installer", "--help"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        let (config, renderer) = setup();
        let err = Cli::try_parse_for(&config, &renderer, ["compose-installer", "status", "--purge"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }
}
