//! Benchmark services: model-call dispatch, the two attempt phases and the
//! run lifecycle that drives them.

pub mod dispatcher;
pub mod investigation;
pub mod orchestrator;
pub mod progress;
pub mod prompts;
pub mod retry;
pub mod transcript_printer;
pub mod verification;

pub use dispatcher::{CompletionDispatcher, IntervalGate};
pub use investigation::{InvestigationLoop, InvestigationOutcome, TOOL_ERROR_SENTINEL};
pub use orchestrator::{PreparedRun, RunOrchestrator, RunOutcome, RunRequest};
pub use progress::RunProgress;
pub use retry::{RecoverableErrors, RetryPolicy};
pub use transcript_printer::TranscriptPrinter;
pub use verification::{parse_prediction, strip_code_fence, VerificationLoop, MAX_PARSE_ATTEMPTS};
