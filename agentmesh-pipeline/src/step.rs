//! The [`Step`] trait and its outcome types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::PipelineContext;

/// The outcome of running a single [`Step`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// The step completed its work normally.
    Success,
    /// The step determined there was nothing to do.
    Skipped,
    /// The step failed to complete its work.
    Failed,
}

/// The result of executing one pipeline step.
#[derive(Clone, Debug)]
pub struct PipelineResult {
    /// Outcome of the step.
    pub status: StepStatus,
    /// Human-readable summary of what happened.
    pub message: String,
    /// Error details accumulated while running the step.
    pub errors: Vec<String>,
    /// Context entries to merge in when `status` is `Success` or `Skipped`.
    pub context_additions: PipelineContext,
    /// When this result was produced.
    pub timestamp: DateTime<Utc>,
}

impl PipelineResult {
    /// Builds a successful result with no context additions.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Success,
            message: message.into(),
            errors: Vec::new(),
            context_additions: PipelineContext::new(),
            timestamp: Utc::now(),
        }
    }

    /// Builds a skipped result with no context additions.
    #[must_use]
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Skipped,
            message: message.into(),
            errors: Vec::new(),
            context_additions: PipelineContext::new(),
            timestamp: Utc::now(),
        }
    }

    /// Builds a failed result carrying the supplied error strings.
    #[must_use]
    pub fn failed(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            message: message.into(),
            errors,
            context_additions: PipelineContext::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attaches context additions to merge in on success or skip.
    #[must_use]
    pub fn with_context_additions(mut self, additions: PipelineContext) -> Self {
        self.context_additions = additions;
        self
    }

    /// Returns `true` when the step did not fail.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status != StepStatus::Failed
    }
}

/// One stage of a [`crate::Pipeline`].
#[async_trait]
pub trait Step: Send + Sync {
    /// A stable, human-readable name for this step.
    fn name(&self) -> &str;

    /// Whether the pipeline must abort if this step fails. Defaults to
    /// `true`; steps that represent best-effort enrichment should override
    /// this to return `false`.
    fn required(&self) -> bool {
        true
    }

    /// A short description of what this step does.
    fn description(&self) -> &str {
        ""
    }

    /// Executes the step against the current context.
    async fn execute(&self, context: &PipelineContext) -> PipelineResult;
}

/// The accumulated outcome of a full [`crate::Pipeline::run`].
#[derive(Debug)]
pub struct PipelineRunResult {
    /// `false` if a required step failed and aborted the run before every
    /// step had a chance to execute.
    pub completed: bool,
    /// Per-step results, in execution order. Shorter than the full step
    /// list when the run aborted early.
    pub step_results: Vec<(String, PipelineResult)>,
    /// The context as left by the last step that ran.
    pub context: PipelineContext,
}

impl PipelineRunResult {
    /// Returns `true` if every step that ran succeeded or was skipped.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.step_results.iter().all(|(_, result)| result.is_ok())
    }
}
