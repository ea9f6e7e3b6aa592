pub mod quiz_sequencer;
pub mod run_ctx;
pub mod steps;

pub use quiz_sequencer::{decide_next, QuizSequencer, SequenceBudget, StepOutcome};
pub use run_ctx::RunCtx;
pub use steps::{Clock, ExtractQuestion, ResolveAnswer, SubmitAnswer, SystemClock};
