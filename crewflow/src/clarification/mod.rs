//! Clarification before the main pipeline.
//!
//! `Start → QuestionsProposed → AwaitingAnswers* → Merged → Done`. The
//! round runs at most once per crew kickoff and bounds operator effort to
//! `K` questions.

mod operator;
mod round;
mod session;

pub use operator::{LineOperator, Operator, StdinOperator};
pub use round::{ClarificationRound, REQUIREMENT_INPUT};
pub use session::{parse_questions, ClarificationSession, CLARIFICATIONS_HEADING};
