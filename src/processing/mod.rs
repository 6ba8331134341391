//! Analysis pipeline: chunking, per-metric generation with retries, two-tier section
//! analytics, and batch orchestration.

pub mod chunking;
pub mod driver;
pub mod retry;
pub mod sanitize;
pub mod sections;
mod service;
pub mod types;

#[cfg(test)]
mod test_support;

pub use driver::AnalysisDriver;
pub use sections::SectionAnalytics;
pub use service::{ProcessingApi, ProcessingService};
pub use types::{
    AnalysisError, AnalysisSection, AnalyticsOutcome, BatchError, BatchFileError, BatchReport,
    BatchResult, ChunkingError, FileProcessingError, MetricClass, MetricResult, PipelineSettings,
    RawUpload,
};
