//! The stage model of the pipeline engine.
//!
//! A [`Stage`] is a named unit of work with declared output artifacts and an
//! action. The declared outputs double as the checkpoint: a stage whose
//! outputs all exist and are non-empty is considered complete and is skipped
//! on resume. There is no separate manifest of completed stages.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::tools::ToolPipeline;

/// Terminal and non-terminal states of a stage within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Not yet evaluated
    Pending,
    /// All declared outputs were already present and non-empty
    Skipped,
    /// The action ran and every declared output is present and non-empty
    Succeeded,
    /// The action failed or left a declared output missing or empty
    Failed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageStatus::Pending => "pending",
            StageStatus::Skipped => "skipped",
            StageStatus::Succeeded => "succeeded",
            StageStatus::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// What a stage does when it is not skipped.
pub enum StageAction {
    /// One or more external tool pipelines, run in order.
    Tools(Vec<ToolPipeline>),
    /// An in-process transform.
    Internal {
        /// What the transform does, for dry-run display
        description: String,
        /// The transform itself
        run: Box<dyn Fn() -> Result<()>>,
    },
}

/// A named unit of work with declared outputs and a completion predicate.
pub struct Stage {
    /// Stage name, used in logs and error messages
    pub name: &'static str,
    /// Declared output artifacts; all must be non-empty for completion
    pub outputs: Vec<PathBuf>,
    /// The stage's action
    pub action: StageAction,
    /// Current status within this run
    pub status: StageStatus,
}

fn is_nonempty_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

impl Stage {
    /// Creates a pending stage running external tool pipelines.
    #[must_use]
    pub fn tools(name: &'static str, outputs: Vec<PathBuf>, pipelines: Vec<ToolPipeline>) -> Self {
        Stage { name, outputs, action: StageAction::Tools(pipelines), status: StageStatus::Pending }
    }

    /// Creates a pending stage running an in-process transform.
    #[must_use]
    pub fn internal<F>(
        name: &'static str,
        outputs: Vec<PathBuf>,
        description: String,
        run: F,
    ) -> Self
    where
        F: Fn() -> Result<()> + 'static,
    {
        Stage {
            name,
            outputs,
            action: StageAction::Internal { description, run: Box::new(run) },
            status: StageStatus::Pending,
        }
    }

    /// The checkpoint predicate: every declared output exists and is
    /// non-empty. A stage without declared outputs is never complete, so
    /// actions like cleanup always run.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.outputs.is_empty() && self.outputs.iter().all(|p| is_nonempty_file(p))
    }

    /// The first declared output that is missing or empty, if any.
    #[must_use]
    pub fn missing_output(&self) -> Option<&Path> {
        self.outputs.iter().map(PathBuf::as_path).find(|p| !is_nonempty_file(p))
    }

    /// Runs the stage's action.
    ///
    /// # Errors
    /// Propagates the first tool or transform failure
    pub fn run_action(&self) -> Result<()> {
        match &self.action {
            StageAction::Tools(pipelines) => {
                for pipeline in pipelines {
                    pipeline.run()?;
                }
                Ok(())
            }
            StageAction::Internal { run, .. } => run(),
        }
    }

    /// Human-readable description of the action, for dry-run display.
    #[must_use]
    pub fn describe_action(&self) -> String {
        match &self.action {
            StageAction::Tools(pipelines) => pipelines
                .iter()
                .map(ToolPipeline::rendered)
                .collect::<Vec<_>>()
                .join(" && "),
            StageAction::Internal { description, .. } => description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::tools::{partial_path, ToolCommand, ToolPipeline};

    fn noop_stage(name: &'static str, outputs: Vec<PathBuf>) -> Stage {
        Stage::internal(name, outputs, "noop".to_string(), || Ok(()))
    }

    #[test]
    fn test_complete_requires_all_outputs_nonempty() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let stage = noop_stage("two-outputs", vec![a.clone(), b.clone()]);

        assert!(!stage.is_complete());
        fs::write(&a, "x").unwrap();
        assert!(!stage.is_complete());
        assert_eq!(stage.missing_output(), Some(b.as_path()));
        fs::write(&b, "y").unwrap();
        assert!(stage.is_complete());
        assert!(stage.missing_output().is_none());
    }

    #[test]
    fn test_empty_output_does_not_count_as_complete() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("empty.txt");
        fs::write(&out, "").unwrap();
        let stage = noop_stage("empty-out", vec![out]);
        assert!(!stage.is_complete());
    }

    #[test]
    fn test_partial_artifact_never_satisfies_the_predicate() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("result.txt");
        fs::write(partial_path(&out), "truncated").unwrap();
        let stage = noop_stage("atomic", vec![out]);
        assert!(!stage.is_complete());
    }

    #[test]
    fn test_stage_without_outputs_is_never_complete() {
        let stage = noop_stage("cleanup", Vec::new());
        assert!(!stage.is_complete());
    }

    #[test]
    fn test_describe_tools_action() {
        let stage = Stage::tools(
            "extract-unmapped",
            Vec::new(),
            vec![ToolPipeline::chain(vec![
                ToolCommand::new("samtools").arg("fastq").arg("-f").arg("4"),
                ToolCommand::new("pigz").arg("-c"),
            ])],
        );
        assert_eq!(stage.describe_action(), "samtools fastq -f 4 | pigz -c");
    }
}
