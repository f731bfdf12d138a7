//! A sequential step pipeline: each [`Step`] runs in order against a shared
//! [`PipelineContext`], and its additions are merged back only when it
//! succeeds or is skipped. A required step that fails aborts the run.

#![warn(missing_docs, clippy::pedantic)]

mod context;
mod step;

pub use context::PipelineContext;
pub use step::{PipelineResult, PipelineRunResult, Step, StepStatus};

use std::sync::Arc;

use tracing::{debug, warn};

/// Runs a fixed sequence of [`Step`]s against a [`PipelineContext`].
///
/// Steps execute strictly in registration order. On [`StepStatus::Success`]
/// or [`StepStatus::Skipped`], the step's `context_additions` are merged into
/// the running context before the next step executes. On
/// [`StepStatus::Failed`], the pipeline aborts immediately if the step is
/// required; an optional step's failure is recorded but does not stop the
/// run.
pub struct Pipeline {
    name: String,
    steps: Vec<Arc<dyn Step>>,
}

impl Pipeline {
    /// Creates a named, empty pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Appends a step to the end of the pipeline.
    #[must_use]
    pub fn with_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Returns the pipeline's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the registered step names, in execution order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Runs every step against `context`, returning the accumulated run
    /// result. `context` is consumed and returned (possibly mutated) inside
    /// [`PipelineRunResult::context`].
    pub async fn run(&self, mut context: PipelineContext) -> PipelineRunResult {
        let mut step_results = Vec::with_capacity(self.steps.len());
        let mut aborted = false;

        for step in &self.steps {
            if aborted {
                break;
            }

            debug!(pipeline = %self.name, step = step.name(), "running pipeline step");
            let result = step.execute(&context).await;

            match result.status {
                StepStatus::Success | StepStatus::Skipped => {
                    context.merge(result.context_additions.clone());
                }
                StepStatus::Failed => {
                    if step.required() {
                        warn!(
                            pipeline = %self.name,
                            step = step.name(),
                            message = %result.message,
                            "required step failed; aborting pipeline"
                        );
                        aborted = true;
                    } else {
                        warn!(
                            pipeline = %self.name,
                            step = step.name(),
                            message = %result.message,
                            "optional step failed; continuing"
                        );
                    }
                }
            }

            step_results.push((step.name().to_owned(), result));
        }

        PipelineRunResult {
            completed: !aborted,
            step_results,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Adds {
        name: &'static str,
        key: &'static str,
        value: serde_json::Value,
    }

    #[async_trait]
    impl Step for Adds {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&self, _context: &PipelineContext) -> PipelineResult {
            let mut additions = PipelineContext::new();
            additions.insert(self.key, self.value.clone());
            PipelineResult::success(format!("{} ran", self.name)).with_context_additions(additions)
        }
    }

    struct FailsRequired;

    #[async_trait]
    impl Step for FailsRequired {
        fn name(&self) -> &str {
            "fails_required"
        }

        async fn execute(&self, _context: &PipelineContext) -> PipelineResult {
            PipelineResult::failed("boom", vec!["boom".into()])
        }
    }

    struct FailsOptional;

    #[async_trait]
    impl Step for FailsOptional {
        fn name(&self) -> &str {
            "fails_optional"
        }

        fn required(&self) -> bool {
            false
        }

        async fn execute(&self, _context: &PipelineContext) -> PipelineResult {
            PipelineResult::failed("skippable failure", vec![])
        }
    }

    #[tokio::test]
    async fn merges_successful_context_additions() {
        let pipeline = Pipeline::new("test").with_step(Arc::new(Adds {
            name: "first",
            key: "greeting",
            value: json!("hello"),
        }));

        let run = pipeline.run(PipelineContext::new()).await;
        assert!(run.completed);
        assert_eq!(run.context.get("greeting"), Some(&json!("hello")));
    }

    #[tokio::test]
    async fn required_failure_aborts_remaining_steps() {
        let pipeline = Pipeline::new("test")
            .with_step(Arc::new(FailsRequired))
            .with_step(Arc::new(Adds {
                name: "never_runs",
                key: "should_not_appear",
                value: json!(true),
            }));

        let run = pipeline.run(PipelineContext::new()).await;
        assert!(!run.completed);
        assert_eq!(run.step_results.len(), 1);
        assert!(run.context.get("should_not_appear").is_none());
    }

    #[tokio::test]
    async fn optional_failure_does_not_abort() {
        let pipeline = Pipeline::new("test")
            .with_step(Arc::new(FailsOptional))
            .with_step(Arc::new(Adds {
                name: "still_runs",
                key: "ran",
                value: json!(true),
            }));

        let run = pipeline.run(PipelineContext::new()).await;
        assert!(run.completed);
        assert_eq!(run.step_results.len(), 2);
        assert_eq!(run.context.get("ran"), Some(&json!(true)));
    }
}
