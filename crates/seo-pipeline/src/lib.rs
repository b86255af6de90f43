pub mod analyzer;
pub mod cache;
pub mod clients;
pub mod error;
pub mod json_extract;
pub mod model;
pub mod orchestrator;
pub mod prompts;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use analyzer::{PipelineOptions, SeoAnalyzer};
pub use error::{AnalysisError, ClientError, FormatError};
pub use model::ComprehensiveAnalysis;
