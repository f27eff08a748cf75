//! Pipeline building, context resolution, sequencing and whole-run retry.
//!
//! - [`PipelineBuilder`] validates stages as they are added
//! - [`resolve`] builds a stage's prompt from inputs and dependency outputs
//! - [`Pipeline::run`] executes stages in declaration order
//! - [`execute_with_retry`] restarts a failed run from its first stage

mod builder;
mod resolve;
pub mod retry;
mod sequencer;
mod spec;
mod template;

pub use builder::PipelineBuilder;
pub use resolve::{resolve, DependencyOutputs};
pub use retry::{
    execute_with_retry, should_retry, BackoffStrategy, RetryConfig, RetryDecision, RetryOutcome,
    RetryState,
};
pub use sequencer::{Pipeline, MAX_DELEGATION_DEPTH};
pub use spec::StageSpec;
pub use template::PromptTemplate;
