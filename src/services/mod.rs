pub mod answer_resolver;
pub mod answer_submitter;
pub mod context_enricher;
pub mod heuristics;
pub mod page_extractor;
pub mod run_reporter;

pub use answer_resolver::AnswerResolver;
pub use answer_submitter::AnswerSubmitter;
pub use context_enricher::ContextEnricher;
pub use page_extractor::PageExtractor;
pub use run_reporter::RunReporter;
