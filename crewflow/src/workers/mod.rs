//! Workers: named roles bound to a persona and a generation backend.
//!
//! A worker makes up to `max_iterations` attempts at a task. When none of
//! them is satisfactory it either settles for its last output or, if it is
//! allowed to delegate, hands back a [`DelegationRequest`] for the sequencer
//! to resolve. Workers never call each other directly.

use crate::core::{parse_structured, OutputFormat};
use crate::errors::{ContractErrorInfo, PipelineValidationError, ServiceError};
use crate::service::{GenerationHint, GenerativeService};
use std::fmt::Write as _;
use std::sync::Arc;

/// A named role with a fixed persona.
#[derive(Clone)]
pub struct Worker {
    id: String,
    role: String,
    goal: String,
    backstory: String,
    service: Arc<dyn GenerativeService>,
    allow_delegation: bool,
    max_iterations: u32,
}

impl Worker {
    /// Creates a worker with a single attempt and no delegation.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        service: Arc<dyn GenerativeService>,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            goal: String::new(),
            backstory: String::new(),
            service,
            allow_delegation: false,
            max_iterations: 1,
        }
    }

    /// Sets the goal.
    #[must_use]
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    /// Sets the backstory.
    #[must_use]
    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    /// Sets the attempt budget.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Allows the worker to hand unsatisfied tasks to the manager.
    #[must_use]
    pub fn allow_delegation(mut self) -> Self {
        self.allow_delegation = true;
        self
    }

    /// Returns the worker id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the role name.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Returns the attempt budget.
    #[must_use]
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Returns true if the worker may delegate.
    #[must_use]
    pub fn can_delegate(&self) -> bool {
        self.allow_delegation
    }

    /// Validates the worker definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is blank or the attempt budget is zero.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.id.trim().is_empty() {
            return Err(PipelineValidationError::new("Worker id cannot be empty")
                .with_code(
                    "CONFIG-WORKER_ID",
                    "Blank worker id",
                    "Give every worker a non-empty id.",
                ));
        }
        if self.max_iterations == 0 {
            return Err(PipelineValidationError::new(format!(
                "Worker '{}' must allow at least one iteration",
                self.id
            ))
            .with_error_info(
                ContractErrorInfo::new("CONFIG-ZERO_ITERATIONS", "max_iterations is 0")
                    .with_fix_hint("Set max_iterations to 1 or more.")
                    .with_context_entry("worker", &self.id),
            ));
        }
        Ok(())
    }

    /// Runs a task with the worker's own attempt budget.
    ///
    /// `manager` names the delegation target, if the pipeline has one.
    ///
    /// # Errors
    ///
    /// Transient, timeout and fatal service errors propagate immediately.
    /// A rejection is returned only when every attempt was rejected and no
    /// delegation is possible.
    pub async fn perform(
        &self,
        task: &str,
        hint: &GenerationHint,
        manager: Option<&str>,
    ) -> Result<WorkerReply, ServiceError> {
        self.perform_with_budget(task, hint, self.max_iterations, manager)
            .await
    }

    /// Runs a task with an explicit attempt budget.
    ///
    /// # Errors
    ///
    /// See [`Worker::perform`].
    pub async fn perform_with_budget(
        &self,
        task: &str,
        hint: &GenerationHint,
        budget: u32,
        manager: Option<&str>,
    ) -> Result<WorkerReply, ServiceError> {
        let budget = budget.max(1);
        let mut last_output: Option<String> = None;
        let mut last_rejection: Option<ServiceError> = None;

        for attempt in 1..=budget {
            let prompt = self.compose_prompt(task, hint, attempt);
            match self.service.generate(&prompt, hint).await {
                Ok(output) => {
                    if is_satisfactory(&output, hint.format) {
                        return Ok(WorkerReply::Completed(Completion {
                            output,
                            attempts: attempt,
                            satisfied: true,
                        }));
                    }
                    tracing::debug!(
                        worker = %self.id,
                        attempt,
                        budget,
                        "Unsatisfactory output"
                    );
                    if !output.trim().is_empty() {
                        last_output = Some(output);
                    }
                }
                Err(e) if e.is_rejection() => {
                    tracing::debug!(worker = %self.id, attempt, error = %e, "Generation rejected");
                    last_rejection = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        if let (true, Some(target)) = (self.allow_delegation, manager) {
            if target != self.id {
                return Ok(WorkerReply::Delegate(DelegationRequest {
                    from: self.id.clone(),
                    target: target.to_string(),
                    budget,
                    attempts: budget,
                    last_output,
                }));
            }
        }

        match last_output {
            Some(output) => Ok(WorkerReply::Completed(Completion {
                output,
                attempts: budget,
                satisfied: false,
            })),
            None => Err(last_rejection
                .unwrap_or_else(|| ServiceError::rejected("every attempt returned blank output"))),
        }
    }

    fn compose_prompt(&self, task: &str, hint: &GenerationHint, attempt: u32) -> String {
        let mut prompt = format!("You are the {}.", self.role);
        if !self.goal.is_empty() {
            prompt.push_str("\nGoal: ");
            prompt.push_str(&self.goal);
        }
        if !self.backstory.is_empty() {
            prompt.push_str("\nBackground: ");
            prompt.push_str(&self.backstory);
        }
        prompt.push_str("\n\nTask:\n");
        prompt.push_str(task);
        if !hint.expected_output.is_empty() {
            prompt.push_str("\n\nExpected output:\n");
            prompt.push_str(&hint.expected_output);
        }
        if hint.wants_json() {
            prompt.push_str("\n\nRespond with valid JSON only.");
        }
        if attempt > 1 {
            let _ = write!(
                &mut prompt,
                "\n\n(Attempt {attempt}: the previous answer did not match the expected output.)"
            );
        }
        prompt
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("service", &self.service.name())
            .field("allow_delegation", &self.allow_delegation)
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

/// Whether `output` satisfies the requested format.
#[must_use]
pub fn is_satisfactory(output: &str, format: OutputFormat) -> bool {
    if output.trim().is_empty() {
        return false;
    }
    match format {
        OutputFormat::Text => true,
        OutputFormat::Json => parse_structured(output).is_some(),
    }
}

/// What a worker hands back to the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerReply {
    /// The worker settled on an output.
    Completed(Completion),
    /// The worker asks the manager to take over.
    Delegate(DelegationRequest),
}

impl DelegationRequest {
    /// Builds the task text the manager receives.
    #[must_use]
    pub fn brief(&self, task: &str) -> String {
        let mut brief = format!(
            "Worker '{}' could not complete the task below in {} attempt(s). \
             Complete it yourself.\n\n{task}",
            self.from, self.attempts
        );
        if let Some(draft) = &self.last_output {
            brief.push_str("\n\nTheir last draft, for reference:\n");
            brief.push_str(draft);
        }
        brief
    }
}

/// A finished task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// The kept output.
    pub output: String,
    /// Attempts spent.
    pub attempts: u32,
    /// Whether the output matched the expected format.
    pub satisfied: bool,
}

/// A bounded request for the manager to take over a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationRequest {
    /// The delegating worker.
    pub from: String,
    /// The manager's worker id.
    pub target: String,
    /// Attempts the manager may spend.
    pub budget: u32,
    /// Attempts already spent by the delegating worker.
    pub attempts: u32,
    /// The delegating worker's last non-blank output.
    pub last_output: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedService;

    fn worker(service: Arc<ScriptedService>) -> Worker {
        Worker::new("po", "Product Owner", service)
            .with_goal("Shape the story")
            .with_backstory("Ten years of backlog grooming")
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let service = Arc::new(ScriptedService::new());
        let err = worker(service).with_max_iterations(0).validate().unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-ZERO_ITERATIONS"));
    }

    #[test]
    fn test_validate_rejects_blank_id() {
        let service = Arc::new(ScriptedService::new());
        let err = Worker::new(" ", "x", service).validate().unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-WORKER_ID"));
    }

    #[test]
    fn test_satisfactory() {
        assert!(is_satisfactory("text", OutputFormat::Text));
        assert!(!is_satisfactory("  ", OutputFormat::Text));
        assert!(is_satisfactory("ok {\"a\": 1}", OutputFormat::Json));
        assert!(!is_satisfactory("no json", OutputFormat::Json));
    }

    #[tokio::test]
    async fn test_prompt_carries_persona_and_task() {
        let service = Arc::new(ScriptedService::new().respond("done"));
        let reply = worker(service.clone())
            .perform("Write it", &GenerationHint::text("A story"), None)
            .await
            .unwrap();

        assert!(matches!(reply, WorkerReply::Completed(ref c) if c.satisfied && c.attempts == 1));
        let prompt = &service.prompts()[0];
        assert!(prompt.contains("You are the Product Owner."));
        assert!(prompt.contains("Goal: Shape the story"));
        assert!(prompt.contains("Task:\nWrite it"));
        assert!(prompt.contains("Expected output:\nA story"));
    }

    #[tokio::test]
    async fn test_retries_until_json_parses() {
        let service = Arc::new(
            ScriptedService::new()
                .respond("not json")
                .respond(r#"{"title": "x"}"#),
        );
        let reply = worker(service.clone())
            .with_max_iterations(2)
            .perform("t", &GenerationHint::json("obj"), None)
            .await
            .unwrap();

        assert_eq!(
            reply,
            WorkerReply::Completed(Completion {
                output: r#"{"title": "x"}"#.to_string(),
                attempts: 2,
                satisfied: true,
            })
        );
        assert_eq!(service.call_count(), 2);
        assert!(!service.prompts()[0].contains("Attempt"));
        assert!(service.prompts()[1].ends_with(
            "Respond with valid JSON only.\n\n(Attempt 2: the previous answer did not match the expected output.)"
        ));
    }

    #[tokio::test]
    async fn test_keeps_last_output_without_delegation() {
        let service = Arc::new(ScriptedService::new().respond("first").respond("second"));
        let reply = worker(service)
            .with_max_iterations(2)
            .perform("t", &GenerationHint::json("obj"), Some("manager"))
            .await
            .unwrap();

        assert_eq!(
            reply,
            WorkerReply::Completed(Completion {
                output: "second".to_string(),
                attempts: 2,
                satisfied: false,
            })
        );
    }

    #[tokio::test]
    async fn test_delegates_when_allowed() {
        let service = Arc::new(ScriptedService::new().respond("draft"));
        let reply = worker(service)
            .allow_delegation()
            .perform("t", &GenerationHint::json("obj"), Some("manager"))
            .await
            .unwrap();

        let WorkerReply::Delegate(request) = reply else {
            panic!("expected delegation");
        };
        assert_eq!(request.from, "po");
        assert_eq!(request.target, "manager");
        assert_eq!(request.budget, 1);
        assert_eq!(request.last_output.as_deref(), Some("draft"));
    }

    #[tokio::test]
    async fn test_no_delegation_without_manager() {
        let service = Arc::new(ScriptedService::new().respond("draft"));
        let reply = worker(service)
            .allow_delegation()
            .perform("t", &GenerationHint::json("obj"), None)
            .await
            .unwrap();
        assert!(matches!(reply, WorkerReply::Completed(ref c) if !c.satisfied));
    }

    #[tokio::test]
    async fn test_transient_propagates_immediately() {
        let service = Arc::new(ScriptedService::new().fail(ServiceError::transient("503")));
        let err = worker(service.clone())
            .with_max_iterations(3)
            .perform("t", &GenerationHint::text("x"), None)
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(service.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_rejected_is_rejection() {
        let service = Arc::new(
            ScriptedService::new()
                .fail(ServiceError::rejected("blocked"))
                .fail(ServiceError::rejected("blocked again")),
        );
        let err = worker(service)
            .with_max_iterations(2)
            .perform("t", &GenerationHint::text("x"), None)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::rejected("blocked again"));
    }

    #[test]
    fn test_delegation_brief_includes_draft() {
        let request = DelegationRequest {
            from: "po".to_string(),
            target: "manager".to_string(),
            budget: 2,
            attempts: 2,
            last_output: Some("draft".to_string()),
        };
        let brief = request.brief("Write the story");
        assert!(brief.contains("Worker 'po'"));
        assert!(brief.contains("Write the story"));
        assert!(brief.ends_with("draft"));
    }
}
