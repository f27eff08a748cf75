//! Testing utilities for crewflow pipelines.
//!
//! This module provides:
//! - Scripted doubles for the generation, operator and sink boundaries
//! - Assertions over stage order and status

mod assertions;
mod mocks;

pub use assertions::{
    assert_dependencies_precede, assert_stage_failed, assert_stage_order, assert_stage_status,
    assert_stage_succeeded,
};
pub use mocks::{MemorySink, ScriptedOperator, ScriptedService};
