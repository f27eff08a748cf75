//! Assertions over pipeline runs.

use crate::core::{PipelineRun, StageStatus};

/// Asserts that stages executed in exactly this order.
pub fn assert_stage_order(run: &PipelineRun, expected: &[&str]) {
    assert_eq!(
        run.executed_stages(),
        expected,
        "Unexpected stage order in run {}",
        run.run_id()
    );
}

/// Asserts that a stage ran with the given status.
pub fn assert_stage_status(run: &PipelineRun, stage_id: &str, expected: StageStatus) {
    let result = run
        .result(stage_id)
        .unwrap_or_else(|| panic!("Stage '{stage_id}' did not run"));
    assert_eq!(
        result.status, expected,
        "Stage '{stage_id}' status: expected {expected}, got {} ({:?})",
        result.status, result.error
    );
}

/// Asserts that a stage succeeded.
pub fn assert_stage_succeeded(run: &PipelineRun, stage_id: &str) {
    assert_stage_status(run, stage_id, StageStatus::Success);
}

/// Asserts that a stage failed.
pub fn assert_stage_failed(run: &PipelineRun, stage_id: &str) {
    assert_stage_status(run, stage_id, StageStatus::Failed);
}

/// Asserts that every stage ran after the stages it depends on.
pub fn assert_dependencies_precede(run: &PipelineRun, dependencies: &[(&str, &[&str])]) {
    let order = run.executed_stages();
    for (stage, deps) in dependencies {
        let Some(position) = order.iter().position(|s| s == stage) else {
            continue;
        };
        for dep in *deps {
            let dep_position = order.iter().position(|s| s == dep);
            assert!(
                dep_position.is_some_and(|p| p < position),
                "Dependency '{dep}' of '{stage}' did not run first: {order:?}"
            );
        }
    }
}
