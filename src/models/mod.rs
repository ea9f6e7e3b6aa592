pub mod answer;
pub mod question;
pub mod resolution;
pub mod run;
pub mod verdict;

pub use answer::{type_answer, AnswerValue};
pub use question::{QuestionContext, QuestionKind};
pub use resolution::{AttemptOutcome, Resolution, ResolutionAttempt, ResolutionTier};
pub use run::{Identity, RunStatus, SequenceRun};
pub use verdict::SubmissionVerdict;
