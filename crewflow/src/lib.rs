//! # Crewflow
//!
//! Turns a free-text requirement into a finished artifact (a GitHub issue,
//! a coding prompt) by passing it through a fixed pipeline of role-playing
//! workers backed by a text-generation service.
//!
//! Crewflow provides:
//!
//! - **Declared-order stages**: dependencies are validated when the
//!   pipeline is built, never discovered at run time
//! - **Context resolution**: dependency outputs are substituted into each
//!   stage's prompt template
//! - **Degrade-gracefully parsing**: JSON is recovered when present and
//!   plain text is kept when it is not
//! - **Whole-run retry**: retryable failures restart the pipeline from its
//!   first stage, within a bounded attempt budget
//! - **Clarification**: an optional round of operator-answered questions
//!   that enriches the requirement before the pipeline runs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crewflow::prelude::*;
//!
//! let pipeline = PipelineBuilder::new("story")
//!     .input("requirement")
//!     .worker(Worker::new("writer", "Writer", service.clone()))
//!     .worker(Worker::new("editor", "Editor", service))
//!     .stage(StageSpec::new("draft", "writer", "Draft a story for: {requirement}"))?
//!     .stage(StageSpec::new("final", "editor", "Polish:\n{draft}").depends_on("draft"))?
//!     .build()?;
//!
//! let crew = Crew::new(pipeline, Arc::new(FileArtifactSink::new("output")));
//! let artifact = crew.kickoff("As a user, I want X so that Y").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod clarification;
pub mod config;
pub mod core;
pub mod crew;
pub mod errors;
pub mod events;
pub mod logging;
pub mod pipeline;
pub mod presets;
pub mod service;
pub mod sink;
pub mod testing;
pub mod workers;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clarification::{
        ClarificationRound, ClarificationSession, Operator, StdinOperator, REQUIREMENT_INPUT,
    };
    pub use crate::config::{load_config, CrewConfig};
    pub use crate::core::{InputBindings, OutputFormat, PipelineRun, StageResult, StageStatus};
    pub use crate::crew::Crew;
    pub use crate::errors::{
        ContractErrorInfo, CrewflowError, PipelineValidationError, ServiceError, SinkError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        execute_with_retry, BackoffStrategy, Pipeline, PipelineBuilder, RetryConfig, StageSpec,
    };
    pub use crate::presets::{Preset, PresetKind};
    pub use crate::service::{GenerationHint, GenerativeService};
    pub use crate::sink::{ArtifactSink, FileArtifactSink, NameHint};
    pub use crate::workers::Worker;

    #[cfg(feature = "gemini")]
    pub use crate::service::GeminiService;
}

/// Version of the crewflow library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
