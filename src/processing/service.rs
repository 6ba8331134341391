//! Batch orchestration: validation, sequential per-file processing, and the outer deadline.

use crate::{
    config::Config,
    generation::{GenerationClient, GenerationClientError, get_generation_client},
    metrics::{MetricsSnapshot, PipelineMetrics},
    parsing::{ParsedDocument, parse_document},
    processing::{
        driver::AnalysisDriver,
        sections::SectionAnalytics,
        types::{
            AnalysisSection, BatchError, BatchFileError, BatchReport, BatchResult,
            FileProcessingError, PipelineSettings, RawUpload,
        },
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// Coordinates parsing and analysis for batches of uploaded files.
///
/// The service owns the shared generation client handle and the metrics registry so the
/// HTTP surface can reuse one instance for every request. Construct it once near process
/// start and share it through an `Arc`.
pub struct ProcessingService {
    client: Arc<dyn GenerationClient>,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the batch pipeline used by the HTTP surface.
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Parse and analyze every upload, returning one combined report.
    async fn analyze_batch(&self, uploads: Vec<RawUpload>) -> Result<BatchReport, BatchError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl ProcessingService {
    /// Build a service around an existing client handle.
    pub fn new(client: Arc<dyn GenerationClient>, settings: PipelineSettings) -> Self {
        Self {
            client,
            settings,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Build a service with the Gemini client described by `config` and default settings.
    pub fn from_config(config: &Config) -> Result<Self, GenerationClientError> {
        tracing::info!(model = %config.gemini_model, "Initializing generation client");
        let client = get_generation_client(config)?;
        Ok(Self::new(client, PipelineSettings::default()))
    }

    /// Settings applied to every batch.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Validate, then process every upload in order under the batch deadline.
    ///
    /// Validation rejects the whole batch before any parsing or model call. Per-file failures
    /// never abort the batch; they are collected in the report's error list.
    pub async fn analyze_batch(&self, uploads: Vec<RawUpload>) -> Result<BatchReport, BatchError> {
        self.validate(&uploads)?;

        let batch_id = Uuid::new_v4();
        let total_files = uploads.len();
        tracing::info!(%batch_id, files = total_files, "Processing batch");

        let deadline = self.settings.batch_timeout;
        let report = tokio::time::timeout(deadline, self.process_all(uploads))
            .await
            .map_err(|_| {
                tracing::warn!(%batch_id, timeout = ?deadline, "Batch deadline exceeded");
                BatchError::BatchTimeout { timeout: deadline }
            })?;

        let fallback_results: usize = report
            .results
            .iter()
            .map(|result| result.analytics.fallback_count())
            .sum();
        self.metrics.record_batch(
            report.successful_files as u64,
            report.failed_files as u64,
            fallback_results as u64,
        );
        tracing::info!(
            %batch_id,
            total = report.total_files,
            succeeded = report.successful_files,
            failed = report.failed_files,
            fallback_results,
            "Batch complete"
        );

        Ok(report)
    }

    fn validate(&self, uploads: &[RawUpload]) -> Result<(), BatchError> {
        if uploads.is_empty() {
            return Err(BatchError::NoFilesProvided);
        }
        let limit = self.settings.max_file_bytes;
        if let Some(upload) = uploads.iter().find(|upload| upload.size > limit) {
            tracing::warn!(
                filename = %upload.filename,
                size = upload.size,
                limit,
                "Rejecting batch with oversized upload"
            );
            return Err(BatchError::FileTooLarge {
                filename: upload.filename.clone(),
                size: upload.size,
                limit,
            });
        }
        Ok(())
    }

    async fn process_all(&self, uploads: Vec<RawUpload>) -> BatchReport {
        let total_files = uploads.len();
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for upload in uploads {
            let filename = upload.filename.clone();
            match self.process_file(upload).await {
                Ok(result) => results.push(result),
                Err(error) => {
                    tracing::warn!(filename = %filename, error = %error, "File failed");
                    errors.push(BatchFileError {
                        filename,
                        error: error.to_string(),
                    });
                }
            }
        }

        BatchReport {
            success: true,
            successful_files: results.len(),
            failed_files: errors.len(),
            results,
            errors,
            total_files,
            timestamp: current_timestamp_rfc3339(),
        }
    }

    async fn process_file(&self, upload: RawUpload) -> Result<BatchResult, FileProcessingError> {
        let RawUpload {
            filename, bytes, ..
        } = upload;

        let document = parse_blocking(filename.clone(), bytes).await?;
        let section = AnalysisSection::standard();
        let analytics = SectionAnalytics::new(AnalysisDriver::new(
            self.client.clone(),
            self.settings.clone(),
        ))
        .run(&document, &section)
        .await;
        tracing::debug!(
            filename = %filename,
            kind = document.kind(),
            fallback_results = analytics.fallback_count(),
            "File analyzed"
        );

        Ok(BatchResult {
            filename,
            processed_data: document,
            analytics,
            timestamp: current_timestamp_rfc3339(),
        })
    }
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    async fn analyze_batch(&self, uploads: Vec<RawUpload>) -> Result<BatchReport, BatchError> {
        ProcessingService::analyze_batch(self, uploads).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

// Parsing is CPU-bound; keep it off the async workers.
async fn parse_blocking(
    filename: String,
    bytes: Vec<u8>,
) -> Result<ParsedDocument, FileProcessingError> {
    let document = tokio::task::spawn_blocking(move || parse_document(&filename, &bytes))
        .await
        .map_err(|error| FileProcessingError::Worker(error.to_string()))??;
    Ok(document)
}

pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::test_support::{Scripted, ScriptedClient};
    use std::time::Duration;

    fn service(client: Arc<ScriptedClient>, settings: PipelineSettings) -> ProcessingService {
        ProcessingService::new(client, settings)
    }

    fn csv(name: &str, body: &str) -> RawUpload {
        RawUpload::new(name, body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let client = Arc::new(ScriptedClient::answering());
        let result = service(client.clone(), PipelineSettings::default())
            .analyze_batch(Vec::new())
            .await;

        assert!(matches!(result, Err(BatchError::NoFilesProvided)));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn oversized_file_rejects_batch_before_any_work() {
        let client = Arc::new(ScriptedClient::answering());
        let settings = PipelineSettings {
            max_file_bytes: 16,
            ..PipelineSettings::default()
        };
        let service = service(client.clone(), settings);
        let result = service
            .analyze_batch(vec![
                csv("small.csv", "a,b\n1,2\n"),
                csv("big.csv", &"x,y\n".repeat(20)),
            ])
            .await;

        match result {
            Err(BatchError::FileTooLarge {
                filename,
                size,
                limit,
            }) => {
                assert_eq!(filename, "big.csv");
                assert_eq!(size, 80);
                assert_eq!(limit, 16);
            }
            other => panic!("expected FileTooLarge, got {other:?}"),
        }
        assert_eq!(client.calls(), 0);
        assert_eq!(service.metrics.snapshot().batches_processed, 0);
    }

    #[tokio::test]
    async fn failing_file_lands_in_errors_and_batch_continues() {
        let client = Arc::new(ScriptedClient::answering());
        let service = service(client.clone(), PipelineSettings::default());
        let uploads = vec![
            csv("first.csv", "region,revenue\nEU,1200\n"),
            RawUpload::new("broken.csv", b"a,b\n\xff\xfe,1\n".to_vec()),
            csv("third.csv", "item,qty\nbolt,4\n"),
        ];

        let report = service.analyze_batch(uploads).await.expect("report");

        assert!(report.success);
        assert_eq!(report.total_files, 3);
        assert_eq!(report.successful_files, 2);
        assert_eq!(report.failed_files, 1);
        assert_eq!(
            report
                .results
                .iter()
                .map(|result| result.filename.as_str())
                .collect::<Vec<_>>(),
            ["first.csv", "third.csv"]
        );
        assert_eq!(report.errors[0].filename, "broken.csv");
        assert!(report.errors[0].error.contains("csv"));
        assert_eq!(client.calls(), 10);

        let snapshot = ProcessingApi::metrics_snapshot(&service);
        assert_eq!(snapshot.batches_processed, 1);
        assert_eq!(snapshot.files_analyzed, 2);
        assert_eq!(snapshot.files_failed, 1);
        assert_eq!(snapshot.fallback_results, 0);
    }

    #[tokio::test]
    async fn unsupported_extension_is_a_file_error() {
        let client = Arc::new(ScriptedClient::answering());
        let report = service(client.clone(), PipelineSettings::default())
            .analyze_batch(vec![RawUpload::new("notes.docx", b"hello".to_vec())])
            .await
            .expect("report");

        assert_eq!(report.successful_files, 0);
        assert!(report.errors[0].error.contains("notes.docx"));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn fallback_results_are_counted_when_model_is_down() {
        let client = Arc::new(ScriptedClient::new(|_| Scripted::Fail));
        let settings = PipelineSettings {
            retry_backoff: Duration::ZERO,
            ..PipelineSettings::default()
        };
        let service = service(client.clone(), settings);
        let report = service
            .analyze_batch(vec![csv("data.csv", "a\n1\n")])
            .await
            .expect("report");

        assert_eq!(report.successful_files, 1);
        assert_eq!(report.results[0].analytics.fallback_count(), 5);
        // three primary metrics twice, two deep metrics once
        assert_eq!(client.calls(), 8);
        assert_eq!(service.metrics.snapshot().fallback_results, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_deadline_fails_the_whole_request() {
        let client = Arc::new(ScriptedClient::new(|_| Scripted::Hang));
        let settings = PipelineSettings {
            batch_timeout: Duration::from_secs(5),
            ..PipelineSettings::default()
        };
        let service = service(client, settings);
        let result = service
            .analyze_batch(vec![csv("slow.csv", "a\n1\n")])
            .await;

        assert!(matches!(
            result,
            Err(BatchError::BatchTimeout { timeout }) if timeout == Duration::from_secs(5)
        ));
        assert_eq!(service.metrics.snapshot().batches_processed, 0);
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let stamp = current_timestamp_rfc3339();
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], "T");
        assert!(stamp.ends_with('Z'));
    }
}
