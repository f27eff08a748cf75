//! The sequencer: runs stages one at a time in declaration order.

use super::resolve::resolve;
use super::StageSpec;
use crate::core::{InputBindings, PipelineRun, StageResult};
use crate::errors::{CrewflowError, PipelineValidationError, ServiceError};
use crate::events::{EventSink, RunEmitter};
use crate::service::GenerationHint;
use crate::workers::{DelegationRequest, Worker, WorkerReply};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How many hops a delegation may take. The manager's own requests are
/// never followed.
pub const MAX_DELEGATION_DEPTH: usize = 1;

/// A validated, ordered pipeline of stages.
///
/// Built with [`super::PipelineBuilder`]. Stage and worker definitions are
/// shared read-only across runs; every call to [`Pipeline::run`] owns a
/// fresh [`PipelineRun`].
#[derive(Clone)]
pub struct Pipeline {
    pub(super) name: String,
    pub(super) inputs: Vec<String>,
    pub(super) stages: Vec<Arc<StageSpec>>,
    pub(super) workers: HashMap<String, Arc<Worker>>,
    pub(super) manager: Option<Arc<Worker>>,
    pub(super) event_sink: Arc<dyn EventSink>,
}

impl Pipeline {
    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared inputs.
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Arc<StageSpec>] {
        &self.stages
    }

    /// Returns the stage ids in execution order.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id.as_str()).collect()
    }

    /// Returns the last stage.
    #[must_use]
    pub fn final_stage(&self) -> Option<&StageSpec> {
        self.stages.last().map(Arc::as_ref)
    }

    /// Returns a worker by id.
    #[must_use]
    pub fn worker(&self, id: &str) -> Option<&Arc<Worker>> {
        self.workers.get(id)
    }

    /// Returns the manager, if configured.
    #[must_use]
    pub fn manager(&self) -> Option<&Arc<Worker>> {
        self.manager.as_ref()
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Checks that every declared input is bound.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first unbound input.
    pub fn check_inputs(&self, inputs: &InputBindings) -> Result<(), PipelineValidationError> {
        match self.inputs.iter().find(|name| !inputs.contains_key(*name)) {
            Some(missing) => Err(PipelineValidationError::new(format!(
                "Pipeline '{}' input '{missing}' is not bound",
                self.name
            ))
            .with_code(
                "CONFIG-MISSING_INPUT",
                "Unbound input",
                "Bind every declared input before running the pipeline.",
            )),
            None => Ok(()),
        }
    }

    /// Runs every stage once, in order.
    ///
    /// A rejected generation marks its stage failed and the run goes on;
    /// the final artifact is the last stage's raw output, or `None` if that
    /// stage failed.
    ///
    /// # Errors
    ///
    /// Configuration errors are raised before any generation call. A
    /// transient or fatal service failure, or a stage whose dependency
    /// failed, ends the run with the corresponding error.
    pub async fn run(&self, inputs: &InputBindings) -> Result<PipelineRun, CrewflowError> {
        self.check_inputs(inputs)?;

        let mut run = PipelineRun::new(&self.name, inputs.clone());
        let events = RunEmitter::new(self.event_sink.clone(), run.run_id(), &self.name);

        info!(pipeline = %self.name, run_id = %run.run_id(), stages = self.stages.len(), "Pipeline started");
        events.emit(
            "pipeline.started",
            json!({"stages": self.stage_ids(), "inputs": inputs.keys().collect::<Vec<_>>()}),
        );

        for stage in &self.stages {
            let result = match self.execute_stage(stage, &run, &events).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(pipeline = %self.name, stage = %stage.id, error = %e, "Pipeline aborted");
                    events.emit(
                        "pipeline.failed",
                        json!({"stage": stage.id, "error": e.to_string(), "retryable": e.is_retryable()}),
                    );
                    return Err(e);
                }
            };
            run.record(result)?;
        }

        let final_artifact = run
            .results()
            .last()
            .filter(|r| r.is_success())
            .map(|r| r.raw_output.clone());
        let has_artifact = final_artifact.is_some();
        run.finish(final_artifact);

        info!(pipeline = %self.name, run_id = %run.run_id(), elapsed_ms = run.elapsed_ms(), has_artifact, "Pipeline completed");
        events.emit(
            "pipeline.completed",
            json!({"elapsed_ms": run.elapsed_ms(), "has_artifact": has_artifact}),
        );
        Ok(run)
    }

    async fn execute_stage(
        &self,
        stage: &StageSpec,
        run: &PipelineRun,
        events: &RunEmitter,
    ) -> Result<StageResult, CrewflowError> {
        let started_at = Utc::now();
        events.emit("stage.started", json!({"stage": stage.id, "worker": stage.worker}));

        let prompt = match resolve(stage, run) {
            Ok(prompt) => prompt,
            Err(e) => {
                events.emit("stage.failed", json!({"stage": stage.id, "error": e.to_string()}));
                return Err(e);
            }
        };
        debug!(stage = %stage.id, prompt_len = prompt.len(), "Resolved prompt");

        let worker = self.workers.get(&stage.worker).ok_or_else(|| {
            PipelineValidationError::new(format!("Unknown worker '{}'", stage.worker))
        })?;
        let hint = stage.hint();
        let manager_id = self.manager.as_ref().map(|m| m.id());

        let reply = worker.perform(&prompt, &hint, manager_id).await;
        let result = match reply {
            Ok(WorkerReply::Completed(done)) => {
                if !done.satisfied {
                    warn!(stage = %stage.id, worker = %worker.id(), "Keeping unsatisfactory output");
                }
                StageResult::success(&stage.id, worker.id(), done.output, started_at)
                    .with_attempts(done.attempts)
            }
            Ok(WorkerReply::Delegate(request)) => {
                self.resolve_delegation(stage, &prompt, &hint, request, started_at, events, 0)
                    .await?
            }
            Err(e) if e.is_rejection() => {
                StageResult::failed(&stage.id, worker.id(), e.to_string(), started_at)
                    .with_attempts(worker.max_iterations())
            }
            Err(e) => return Err(self.service_failure(stage, e, events)),
        };

        emit_stage_outcome(&result, events);
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve_delegation(
        &self,
        stage: &StageSpec,
        prompt: &str,
        hint: &GenerationHint,
        request: DelegationRequest,
        started_at: DateTime<Utc>,
        events: &RunEmitter,
        depth: usize,
    ) -> Result<StageResult, CrewflowError> {
        let manager = self
            .manager
            .as_ref()
            .filter(|m| m.id() == request.target && depth < MAX_DELEGATION_DEPTH);
        let Some(manager) = manager else {
            warn!(stage = %stage.id, target = %request.target, depth, "Delegation not followed");
            return Ok(fallback(stage, &request, None, started_at));
        };

        info!(stage = %stage.id, from = %request.from, to = %manager.id(), budget = request.budget, "Delegating stage");
        events.emit(
            "stage.delegated",
            json!({"stage": stage.id, "from": request.from, "to": manager.id(), "budget": request.budget}),
        );

        let brief = request.brief(prompt);
        match manager
            .perform_with_budget(&brief, hint, request.budget, None)
            .await
        {
            Ok(WorkerReply::Completed(done)) if done.satisfied => Ok(StageResult::success(
                &stage.id,
                manager.id(),
                done.output,
                started_at,
            )
            .with_attempts(request.attempts + done.attempts)
            .delegated()),
            Ok(WorkerReply::Completed(done)) => {
                let attempts = done.attempts;
                Ok(fallback(stage, &request, Some((manager.id(), done.output)), started_at)
                    .with_attempts(request.attempts + attempts))
            }
            Ok(WorkerReply::Delegate(nested)) => {
                warn!(stage = %stage.id, from = %nested.from, "Ignoring delegation request from the manager");
                Ok(fallback(stage, &request, None, started_at))
            }
            Err(e) if e.is_rejection() => {
                debug!(stage = %stage.id, error = %e, "Manager rejected");
                Ok(fallback(stage, &request, None, started_at))
            }
            Err(e) => Err(self.service_failure(stage, e, events)),
        }
    }

    fn service_failure(&self, stage: &StageSpec, error: ServiceError, events: &RunEmitter) -> CrewflowError {
        warn!(pipeline = %self.name, stage = %stage.id, error = %error, "Service failure");
        events.emit(
            "stage.failed",
            json!({"stage": stage.id, "error": error.to_string(), "transient": error.is_transient()}),
        );
        CrewflowError::Service {
            stage: stage.id.clone(),
            source: error,
        }
    }
}

fn emit_stage_outcome(result: &StageResult, events: &RunEmitter) {
    if result.is_success() {
        info!(
            stage = %result.stage_id,
            worker = %result.worker_id,
            attempts = result.attempts,
            delegated = result.delegated,
            structured = result.structured.is_some(),
            "Stage completed"
        );
        events.emit(
            "stage.completed",
            json!({
                "stage": result.stage_id,
                "worker": result.worker_id,
                "attempts": result.attempts,
                "delegated": result.delegated,
                "structured": result.structured.is_some(),
                "duration_ms": result.duration_ms(),
            }),
        );
    } else {
        warn!(stage = %result.stage_id, error = ?result.error, "Stage failed");
        events.emit(
            "stage.failed",
            json!({"stage": result.stage_id, "error": result.error, "attempts": result.attempts}),
        );
    }
}

/// The result kept when delegation did not produce a satisfactory output:
/// the delegating worker's last draft, else the manager's, else failure.
fn fallback(
    stage: &StageSpec,
    request: &DelegationRequest,
    manager_output: Option<(&str, String)>,
    started_at: DateTime<Utc>,
) -> StageResult {
    if let Some(draft) = &request.last_output {
        return StageResult::success(&stage.id, &request.from, draft.clone(), started_at)
            .with_attempts(request.attempts);
    }
    match manager_output {
        Some((manager, output)) if !output.trim().is_empty() => {
            StageResult::success(&stage.id, manager, output, started_at)
                .with_attempts(request.attempts)
                .delegated()
        }
        _ => StageResult::failed(
            &stage.id,
            &request.from,
            "no usable output after delegation",
            started_at,
        )
        .with_attempts(request.attempts),
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("stages", &self.stage_ids())
            .field("manager", &self.manager.as_ref().map(|m| m.id()))
            .finish_non_exhaustive()
    }
}
