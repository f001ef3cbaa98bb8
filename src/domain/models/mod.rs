//! Domain models for the benchmark client.

pub mod attempt;
pub mod config;
pub mod failure;
pub mod run;
pub mod tool;
pub mod transcript;
pub mod turn;
pub mod verification;

pub use attempt::{Attempt, AttemptRecord, AttemptScope, AttemptStatus};
pub use config::{Config, DatabaseConfig, LoggingConfig, ProviderConfig, RetryConfig};
pub use failure::{render_error_chain, FailureSnapshot};
pub use run::{
    ProblemName, ProblemSet, ProblemSetCatalog, ResumeMode, Run, RunCompletion, RunResult,
    RunSummary, RunTarget, Score, StartRunRequest, StartedRun,
};
pub use tool::{
    argument_key, list_to_map, normalize_args, value_list_to_map, ToolSchema, MYSTERY_FUNCTION,
};
pub use transcript::{
    ContentBlock, Message, ReasoningBlock, RedactedReasoning, Role, ToolInvocation, ToolResult,
    Transcript,
};
pub use turn::{CompletionRequest, NormalizedTurn, RawCompletion, TurnElement};
pub use verification::{prediction_schema, Prediction, Verdict, VerificationCase};
