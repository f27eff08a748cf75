//! Command-line entry point: requirement in, artifact out.
//!
//! The requirement comes from the first argument or, if absent, from stdin.
//! Clarification questions are asked on stderr and answered on stdin, so
//! they are skipped when the requirement itself was piped in.

use anyhow::{bail, Context, Result};
use clap::Parser;
use crewflow::clarification::StdinOperator;
use crewflow::config::{load_config, CrewConfig};
use crewflow::crew::Crew;
use crewflow::events::LoggingEventSink;
use crewflow::presets::PresetKind;
use crewflow::service::{GeminiService, DEFAULT_GEMINI_MODEL};
use crewflow::sink::FileArtifactSink;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::info;

const API_KEY_VAR: &str = "GOOGLE_API_KEY";

#[derive(Parser)]
#[command(
    name = "crewflow",
    version,
    about = "Turn a requirement into a GitHub issue, a coding prompt, code or a code review"
)]
struct Cli {
    /// The requirement. Read from stdin when omitted.
    requirement: Option<String>,

    /// Configuration file.
    #[arg(short, long, default_value = "crewflow.toml")]
    config: PathBuf,

    /// Which crew to run.
    #[arg(short, long, value_enum)]
    preset: Option<PresetKind>,

    /// Maximum clarification questions.
    #[arg(short, long)]
    questions: Option<usize>,

    /// Whole-run attempts, including the first.
    #[arg(long)]
    retries: Option<usize>,

    /// Delay between attempts in milliseconds.
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Skip the clarification round.
    #[arg(long)]
    no_clarify: bool,

    /// Where artifacts are written.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, mut config: CrewConfig) -> CrewConfig {
        if let Some(preset) = self.preset {
            config = config.with_preset(preset);
        }
        if let Some(questions) = self.questions {
            config = config.with_max_clarification_questions(questions);
        }
        // Answers are read from stdin too; once the requirement has drained it
        // every question would go unanswered.
        if self.no_clarify || self.requirement.is_none() {
            config = config.with_max_clarification_questions(0);
        }
        if let Some(retries) = self.retries {
            config = config.with_max_retry_attempts(retries);
        }
        if let Some(delay) = self.retry_delay_ms {
            config = config.with_retry_delay_ms(delay);
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir);
        }
        config
    }
}

#[tokio::main]
async fn main() {
    crewflow::logging::init();
    if let Err(err) = run().await {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("load {}", cli.config.display()))?;
    let config = cli.apply(config);
    config.validate().context("invalid options")?;

    let requirement = match &cli.requirement {
        Some(text) => text.clone(),
        None => {
            info!("Requirement read from stdin, clarification disabled");
            read_stdin().await?
        }
    };
    if requirement.trim().is_empty() {
        bail!("empty requirement");
    }

    let api_key = std::env::var(API_KEY_VAR).with_context(|| format!("{API_KEY_VAR} is not set"))?;
    let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
    let service = GeminiService::new(api_key, model).context("create generation client")?;

    let crew = Crew::from_config(
        &config,
        Arc::new(service),
        Arc::new(FileArtifactSink::new(&config.output_dir)),
        Arc::new(StdinOperator::stdin()),
    )
    .context("build crew")?
    .with_event_sink(Arc::new(LoggingEventSink::debug()));

    let artifact = crew
        .kickoff(&requirement)
        .await
        .with_context(|| format!("{} crew failed", config.preset))?;
    println!("{artifact}");
    Ok(())
}

async fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .context("read requirement from stdin")?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdin_requirement_disables_clarification() {
        let cli = Cli::parse_from(["crewflow"]);
        let config = cli.apply(CrewConfig::default());
        assert_eq!(config.max_clarification_questions, 0);
    }

    #[test]
    fn test_argument_requirement_keeps_clarification() {
        let cli = Cli::parse_from(["crewflow", "As a user, I want X", "--questions", "2"]);
        let config = cli.apply(CrewConfig::default());
        assert_eq!(config.max_clarification_questions, 2);
    }

    #[test]
    fn test_no_clarify_flag() {
        let cli = Cli::parse_from(["crewflow", "Export", "--no-clarify"]);
        assert_eq!(cli.apply(CrewConfig::default()).max_clarification_questions, 0);
    }

    #[test]
    fn test_code_review_preset_flag() {
        let cli = Cli::parse_from(["crewflow", "A greeter", "--preset", "code-review"]);
        assert_eq!(cli.apply(CrewConfig::default()).preset, PresetKind::CodeReview);
    }
}
