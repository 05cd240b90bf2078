//! Four-phase operation runner: announce, act, exec, report.
//!
//! Phases never overlap and run in that order. A failure in the action or
//! in any exec entry skips everything after it except the failure report.
//! Nothing is retried.

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::action::Action;
use super::project::Project;
use super::template::error_vars;
use crate::domain::Operation;
use crate::error::{InstallerError, Result};

/// Phase of one operation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Announce,
    Action,
    Exec,
    Success,
    Failure,
}

impl Phase {
    /// True once the run has ended
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Whether moving from `self` to `to` is allowed
    pub fn can_transition(self, to: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, to),
            (Announce, Action)
                | (Action, Exec)
                | (Action, Success)
                | (Action, Failure)
                | (Exec, Success)
                | (Exec, Failure)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Announce => "announce",
            Self::Action => "action",
            Self::Exec => "exec",
            Self::Success => "success",
            Self::Failure => "failure",
        };
        f.write_str(s)
    }
}

/// Tracks the phase of a single run
struct PhaseTracker {
    phase: Phase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            phase: Phase::Announce,
        }
    }

    fn advance(&mut self, to: Phase) {
        debug_assert!(
            self.phase.can_transition(to),
            "invalid phase transition {} -> {}",
            self.phase,
            to
        );
        debug!(from = %self.phase, to = %to, "Phase transition");
        self.phase = to;
    }
}

impl Operation {
    /// Run the operation's action and execs, reporting the outcome.
    ///
    /// Execs are skipped when `skip_exec` is set. The returned error is the
    /// one already reported through the failure message.
    #[instrument(
        skip_all,
        fields(action = action.name(), project = %project.config().project_name)
    )]
    pub async fn run(
        &self,
        project: &Project,
        action: &dyn Action,
        skip_exec: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut tracker = PhaseTracker::new();
        self.emit(project, &self.messages.announcement);

        tracker.advance(Phase::Action);
        if let Err(err) = action.execute(project, project.config(), cancel).await {
            return Err(self.fail(project, &mut tracker, err));
        }

        if skip_exec {
            debug!("Execs skipped");
        } else {
            tracker.advance(Phase::Exec);
            for exec in &self.execs {
                debug!(service = %exec.service, cmd = %exec.command_line(), "Running exec");
                if let Err(err) = project.execute(&exec.service, &exec.cmd, cancel).await {
                    return Err(self.fail(project, &mut tracker, err));
                }
            }
        }

        tracker.advance(Phase::Success);
        self.emit(project, &self.messages.success);
        Ok(())
    }

    /// Report `err` through the failure message and hand it back
    fn fail(
        &self,
        project: &Project,
        tracker: &mut PhaseTracker,
        err: InstallerError,
    ) -> InstallerError {
        tracker.advance(Phase::Failure);
        let vars = error_vars(&err);
        match project.render_message(&self.messages.failure, Some(&vars)) {
            Ok(message) if message.is_empty() => {}
            Ok(message) => project.reporter().error(&message),
            Err(render_err) => {
                project.reporter().error(&err.to_string());
                debug!(error = %render_err, "Failure message could not be rendered");
            }
        }
        err
    }

    /// Render and report an informational message, skipping empty ones
    fn emit(&self, project: &Project, template: &str) {
        match project.render_message(template, None) {
            Ok(message) if message.is_empty() => {}
            Ok(message) => project.reporter().info(&message),
            Err(err) => debug!(error = %err, "Message could not be rendered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(Phase::Announce.can_transition(Phase::Action));
        assert!(Phase::Action.can_transition(Phase::Exec));
        assert!(Phase::Exec.can_transition(Phase::Success));
        assert!(Phase::Action.can_transition(Phase::Success));
    }

    #[test]
    fn test_failure_reachable_from_action_and_exec_only() {
        assert!(Phase::Action.can_transition(Phase::Failure));
        assert!(Phase::Exec.can_transition(Phase::Failure));
        assert!(!Phase::Announce.can_transition(Phase::Failure));
        assert!(!Phase::Success.can_transition(Phase::Failure));
    }

    #[test]
    fn test_terminal_phases_have_no_exit() {
        for from in [Phase::Success, Phase::Failure] {
            assert!(from.is_terminal());
            for to in [
                Phase::Announce,
                Phase::Action,
                Phase::Exec,
                Phase::Success,
                Phase::Failure,
            ] {
                assert!(!from.can_transition(to));
            }
        }
        assert!(!Phase::Exec.is_terminal());
    }

    #[test]
    fn test_no_backwards_transitions() {
        assert!(!Phase::Exec.can_transition(Phase::Action));
        assert!(!Phase::Action.can_transition(Phase::Announce));
    }
}
