//! Pipeline builder with validation.

use super::{Pipeline, StageSpec};
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::events::{EventSink, NoOpEventSink};
use crate::workers::Worker;
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Inputs must be declared before the stages that reference them, and a
/// stage may only depend on stages added before it, so the declaration
/// order is always a valid execution order.
#[derive(Clone)]
pub struct PipelineBuilder {
    name: String,
    inputs: Vec<String>,
    workers: Vec<Worker>,
    manager: Option<Worker>,
    stages: Vec<StageSpec>,
    event_sink: Arc<dyn EventSink>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            workers: Vec::new(),
            manager: None,
            stages: Vec::new(),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Declares a pipeline-level input.
    #[must_use]
    pub fn input(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.inputs.contains(&name) {
            self.inputs.push(name);
        }
        self
    }

    /// Registers a worker.
    #[must_use]
    pub fn worker(mut self, worker: Worker) -> Self {
        self.workers.push(worker);
        self
    }

    /// Sets the manager used as delegation target.
    #[must_use]
    pub fn manager(mut self, manager: Worker) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Adds a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken, a dependency is not declared
    /// earlier, or a placeholder names neither an input nor a dependency.
    pub fn stage(mut self, spec: StageSpec) -> Result<Self, PipelineValidationError> {
        self.add_stage_spec(spec)?;
        Ok(self)
    }

    /// Adds a stage with a specification.
    ///
    /// # Errors
    ///
    /// See [`PipelineBuilder::stage`].
    pub fn add_stage_spec(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.has_stage(&spec.id) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is declared twice",
                spec.id
            ))
            .with_stages(vec![spec.id.clone()])
            .with_code(
                "CONFIG-DUPLICATE_STAGE",
                "Duplicate stage id",
                "Give every stage a unique id.",
            ));
        }

        for dep in &spec.dependencies {
            if !self.has_stage(dep) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' depends on '{dep}', which is not declared before it",
                    spec.id
                ))
                .with_stages(vec![spec.id.clone(), dep.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONFIG-FORWARD_REF",
                        format!("Dependency '{dep}' not declared earlier"),
                    )
                    .with_fix_hint(
                        "Add the dependency before the stage that depends on it.",
                    ),
                ));
            }
        }

        for name in spec.template.placeholders() {
            if spec.dependencies.contains(name) || self.inputs.contains(name) {
                continue;
            }
            let err = if self.has_stage(name) {
                PipelineValidationError::new(format!(
                    "Stage '{}' references the output of '{name}' without declaring it as a dependency",
                    spec.id
                ))
                .with_stages(vec![spec.id.clone(), name.clone()])
                .with_code(
                    "CONFIG-UNDECLARED_REF",
                    "Undeclared dependency reference",
                    "Add the stage to the dependency list.",
                )
            } else {
                PipelineValidationError::new(format!(
                    "Stage '{}' uses placeholder '{{{name}}}', which is neither an input nor a dependency",
                    spec.id
                ))
                .with_stages(vec![spec.id.clone()])
                .with_code(
                    "CONFIG-UNKNOWN_PLACEHOLDER",
                    "Unknown placeholder",
                    "Declare the input before the stage, or fix the placeholder name.",
                )
            };
            return Err(err);
        }

        self.stages.push(spec);
        Ok(())
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no stages, a worker is invalid or
    /// unknown, or a stage is assigned to the manager.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_error_info(
                    ContractErrorInfo::new("CONFIG-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one stage to the pipeline before building."),
                ));
        }

        let mut workers: HashMap<String, Arc<Worker>> = HashMap::new();
        for worker in self.workers {
            worker.validate()?;
            if workers.contains_key(worker.id()) {
                return Err(PipelineValidationError::new(format!(
                    "Worker '{}' is registered twice",
                    worker.id()
                ))
                .with_code(
                    "CONFIG-DUPLICATE_WORKER",
                    "Duplicate worker id",
                    "Give every worker a unique id.",
                ));
            }
            workers.insert(worker.id().to_string(), Arc::new(worker));
        }

        let manager = match self.manager {
            Some(manager) => {
                manager.validate()?;
                if workers.contains_key(manager.id()) {
                    return Err(PipelineValidationError::new(format!(
                        "Manager '{}' is also registered as a worker",
                        manager.id()
                    ))
                    .with_code(
                        "CONFIG-DUPLICATE_WORKER",
                        "Manager registered as worker",
                        "Register the manager only through `manager()`.",
                    ));
                }
                Some(Arc::new(manager))
            }
            None => None,
        };

        for stage in &self.stages {
            if manager.as_ref().is_some_and(|m| m.id() == stage.worker) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' is assigned to the manager '{}'",
                    stage.id, stage.worker
                ))
                .with_stages(vec![stage.id.clone()])
                .with_code(
                    "CONFIG-MANAGER_STAGE",
                    "Manager cannot own a stage",
                    "Assign the stage to a regular worker; the manager only takes delegated work.",
                ));
            }
            if !workers.contains_key(&stage.worker) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' is assigned to unknown worker '{}'",
                    stage.id, stage.worker
                ))
                .with_stages(vec![stage.id.clone()])
                .with_code(
                    "CONFIG-UNKNOWN_WORKER",
                    "Unknown worker",
                    "Register the worker before building.",
                ));
            }
        }

        Ok(Pipeline {
            name: self.name,
            inputs: self.inputs,
            stages: self.stages.into_iter().map(Arc::new).collect(),
            workers,
            manager,
            event_sink: self.event_sink,
        })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn has_stage(&self, id: &str) -> bool {
        self.stages.iter().any(|s| s.id == id)
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("stages", &self.stages.len())
            .finish_non_exhaustive()
    }
}
