//! Core domain model types for crewflow.
//!
//! This module contains the values a pipeline run produces:
//! - Stage status and output format enums
//! - Per-stage results with best-effort structured parsing
//! - The run record that owns all results of one pipeline execution

mod result;
mod run;
mod status;
pub mod structured;

pub use result::StageResult;
pub use run::{InputBindings, PipelineRun};
pub use status::{OutputFormat, StageStatus};
pub use structured::{parse_structured, to_context_text};
