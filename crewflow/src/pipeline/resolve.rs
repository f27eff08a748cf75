//! Per-stage context resolution.

use super::StageSpec;
use crate::core::PipelineRun;
use crate::errors::{CrewflowError, DependencyUnmetError, PipelineValidationError};
use std::collections::BTreeMap;

/// Outputs of a stage's declared dependencies, keyed by stage id, in
/// dependency declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyOutputs {
    entries: Vec<(String, String)>,
}

impl DependencyOutputs {
    /// Collects the outputs of `stage`'s dependencies from `run`.
    ///
    /// # Errors
    ///
    /// Returns `DependencyUnmet` if a dependency has no result or failed.
    pub fn collect(stage: &StageSpec, run: &PipelineRun) -> Result<Self, DependencyUnmetError> {
        let mut entries = Vec::with_capacity(stage.dependencies.len());
        for dep in &stage.dependencies {
            let result = run.result(dep).ok_or_else(|| {
                DependencyUnmetError::new(&stage.id, dep, "dependency has not run")
            })?;
            if result.is_failure() {
                let reason = result.error.as_deref().unwrap_or("stage failed");
                return Err(DependencyUnmetError::new(&stage.id, dep, reason));
            }
            entries.push((dep.clone(), result.context_text()));
        }
        Ok(Self { entries })
    }

    /// Returns the output of one dependency.
    #[must_use]
    pub fn get(&self, stage_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == stage_id)
            .map(|(_, text)| text.as_str())
    }

    /// Iterates `(stage id, text)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(id, text)| (id.as_str(), text.as_str()))
    }

    /// Returns true if the stage has no dependencies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds the prompt for `stage` from the run's inputs and the outputs of
/// its declared dependencies.
///
/// Dependencies bound by a placeholder are substituted in place; the rest
/// follow in a trailing context block, in declaration order.
///
/// # Errors
///
/// Returns `DependencyUnmet` if a dependency failed, or a configuration
/// error if a referenced input is unbound.
pub fn resolve(stage: &StageSpec, run: &PipelineRun) -> Result<String, CrewflowError> {
    let outputs = DependencyOutputs::collect(stage, run)?;

    let mut bindings: BTreeMap<&str, &str> = BTreeMap::new();
    for name in stage.template.placeholders() {
        if let Some(text) = outputs.get(name) {
            bindings.insert(name, text);
        } else if let Some(value) = run.input(name) {
            bindings.insert(name, value);
        } else {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' references input '{name}', which is not bound",
                stage.id
            ))
            .with_stages(vec![stage.id.clone()])
            .with_code(
                "CONFIG-MISSING_INPUT",
                "Unbound input",
                "Bind every declared input before running the pipeline.",
            )
            .into());
        }
    }

    let mut prompt = stage.template.render(&bindings);

    let trailing: Vec<(&str, &str)> = outputs
        .iter()
        .filter(|(id, _)| !stage.template.references(id))
        .collect();
    if !trailing.is_empty() {
        prompt.push_str("\n\nContext from earlier stages:");
        for (id, text) in trailing {
            prompt.push_str("\n\n### Output of '");
            prompt.push_str(id);
            prompt.push_str("'\n");
            prompt.push_str(text);
        }
    }

    Ok(prompt)
}
