//! Core data types and error definitions for the analysis pipeline.

use crate::generation::{GenerationClientError, GenerationConfig};
use crate::parsing::{ParseError, ParsedDocument};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Maximum characters of serialized document text submitted to the model.
pub const DEFAULT_CHUNK_SIZE: usize = 8_000;
/// Per-call deadline for a single generation request.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
/// Fixed pause between attempts of the same metric.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);
/// Aggregate deadline for the whole deep tier of one file.
pub const DEFAULT_DEEP_TIER_TIMEOUT: Duration = Duration::from_secs(15);
/// Outer deadline for an entire batch.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(58);
/// Largest accepted upload, in bytes (50 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 50 * 1024 * 1024;

/// Errors produced while turning a parsed document into model-sized text.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// A zero-width chunk was requested.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// The document could not be rendered as JSON.
    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of a single metric attempt inside the analysis driver.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The model did not answer within the per-call deadline.
    #[error("generation for metric '{metric}' timed out after {timeout:?}")]
    GenerationTimeout {
        /// Metric being analyzed.
        metric: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// The model answered but the payload lacked a usable entry for the metric.
    #[error("model response for metric '{metric}' was unusable: {reason}")]
    MalformedModelResponse {
        /// Metric being analyzed.
        metric: String,
        /// What was wrong with the payload.
        reason: String,
    },
    /// The provider call itself failed.
    #[error(transparent)]
    Provider(#[from] GenerationClientError),
}

/// Errors that fail a single file; recorded in the batch error list.
#[derive(Debug, Error)]
pub enum FileProcessingError {
    /// The upload could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The blocking parse task was aborted before producing a result.
    #[error("parsing task aborted: {0}")]
    Worker(String),
}

/// Errors that reject a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The request carried no files.
    #[error("No files provided")]
    NoFilesProvided,
    /// A file exceeded the size ceiling; nothing in the batch was processed.
    #[error("File '{filename}' is {size} bytes, exceeding the {limit} byte limit")]
    FileTooLarge {
        /// Offending upload.
        filename: String,
        /// Size of the upload in bytes.
        size: usize,
        /// Configured ceiling in bytes.
        limit: usize,
    },
    /// The batch did not complete within the outer deadline.
    #[error("Batch processing timed out after {timeout:?}")]
    BatchTimeout {
        /// Deadline that elapsed.
        timeout: Duration,
    },
}

/// Timeouts, budgets, and limits applied by the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Characters of serialized text forwarded to the model.
    pub chunk_size: usize,
    /// Per-call generation deadline.
    pub call_timeout: Duration,
    /// Pause between metric attempts.
    pub retry_backoff: Duration,
    /// Aggregate deadline for the deep tier.
    pub deep_tier_timeout: Duration,
    /// Outer deadline for a batch.
    pub batch_timeout: Duration,
    /// Per-file size ceiling in bytes.
    pub max_file_bytes: usize,
    /// Sampling parameters sent with every request.
    pub generation: GenerationConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            deep_tier_timeout: DEFAULT_DEEP_TIER_TIMEOUT,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            generation: GenerationConfig::default(),
        }
    }
}

/// Tier a metric belongs to; decides its attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricClass {
    /// Always computed; retried once.
    Primary,
    /// Optional tier under an aggregate deadline; never retried.
    Deep,
}

impl MetricClass {
    /// Number of generation attempts allowed for the tier.
    pub fn max_attempts(self) -> u32 {
        match self {
            Self::Primary => 2,
            Self::Deep => 1,
        }
    }
}

/// Immutable description of which metrics to compute for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSection {
    title: String,
    primary_metric_names: Vec<String>,
    deep_metric_names: Vec<String>,
}

impl AnalysisSection {
    /// Build a section; returns `None` when no primary metric is named.
    pub fn new<P, D>(title: impl Into<String>, primary: P, deep: D) -> Option<Self>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let primary_metric_names: Vec<String> = primary.into_iter().map(Into::into).collect();
        if primary_metric_names.is_empty() {
            return None;
        }
        Some(Self {
            title: title.into(),
            primary_metric_names,
            deep_metric_names: deep.into_iter().map(Into::into).collect(),
        })
    }

    /// The fixed two-tier section applied to every upload.
    pub fn standard() -> Self {
        Self {
            title: "Document Analysis".into(),
            primary_metric_names: vec!["summary".into(), "insights".into(), "trends".into()],
            deep_metric_names: vec!["risks".into(), "recommendations".into()],
        }
    }

    /// Human-readable section title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Metrics that are always awaited.
    pub fn primary_metric_names(&self) -> &[String] {
        &self.primary_metric_names
    }

    /// Metrics computed under the aggregate deep-tier deadline.
    pub fn deep_metric_names(&self) -> &[String] {
        &self.deep_metric_names
    }
}

/// Analysis of one metric, either from the model or a deterministic placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricResult {
    /// Narrative summary.
    pub summary: String,
    /// Bullet-style findings.
    pub key_points: Vec<String>,
    /// Named figures reported by the model, rendered as strings.
    pub metrics: BTreeMap<String, String>,
    /// Suggested follow-ups.
    pub recommendations: Vec<String>,
    /// True when this is a placeholder rather than a live model result.
    pub fallback: bool,
}

impl MetricResult {
    /// Placeholder used when live analysis is unavailable for `metric`.
    pub fn pending(metric: &str) -> Self {
        Self {
            summary: format!("Analysis for '{metric}' is pending; no model result was available."),
            key_points: Vec::new(),
            metrics: BTreeMap::from([("status".to_string(), "pending".to_string())]),
            recommendations: vec!["Retry the analysis to obtain live results.".to_string()],
            fallback: true,
        }
    }
}

/// Two-tier analytics for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsOutcome {
    /// Results of the primary tier, keyed by metric name.
    pub primary: BTreeMap<String, MetricResult>,
    /// Results of the deep tier, keyed by metric name.
    pub deep: BTreeMap<String, MetricResult>,
}

impl AnalyticsOutcome {
    /// Outcome built purely from the section's metric names, without model calls.
    pub fn fallback(section: &AnalysisSection) -> Self {
        Self {
            primary: fallback_results(section.primary_metric_names()),
            deep: fallback_results(section.deep_metric_names()),
        }
    }

    /// Count of placeholder results across both tiers.
    pub fn fallback_count(&self) -> usize {
        self.primary
            .values()
            .chain(self.deep.values())
            .filter(|result| result.fallback)
            .count()
    }
}

pub(crate) fn fallback_results(names: &[String]) -> BTreeMap<String, MetricResult> {
    names
        .iter()
        .map(|name| (name.clone(), MetricResult::pending(name)))
        .collect()
}

/// An uploaded file awaiting processing.
#[derive(Debug, Clone)]
pub struct RawUpload {
    /// Client-supplied filename; its extension selects the parser.
    pub filename: String,
    /// File contents.
    pub bytes: Vec<u8>,
    /// Size of `bytes`.
    pub size: usize,
}

impl RawUpload {
    /// Wrap file contents, recording their size.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len();
        Self {
            filename: filename.into(),
            bytes,
            size,
        }
    }
}

/// Successful outcome for one file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Upload filename.
    pub filename: String,
    /// Full parsed representation (not truncated).
    pub processed_data: ParsedDocument,
    /// Two-tier analytics.
    pub analytics: AnalyticsOutcome,
    /// RFC 3339 completion time.
    pub timestamp: String,
}

/// A file that could not be processed.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFileError {
    /// Upload filename.
    pub filename: String,
    /// Human-readable failure.
    pub error: String,
}

/// Combined response for a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// True once the batch ran to completion; per-file failures live in `errors`.
    pub success: bool,
    /// Files that were parsed and analyzed, in upload order.
    pub results: Vec<BatchResult>,
    /// Files that failed, in upload order.
    pub errors: Vec<BatchFileError>,
    /// Files in the request.
    pub total_files: usize,
    /// Length of `results`.
    pub successful_files: usize,
    /// Length of `errors`.
    pub failed_files: usize,
    /// RFC 3339 completion time.
    pub timestamp: String,
}
