//! Per-metric analysis driver: one prompt per attempt, bounded by a deadline and retried.

use crate::generation::{GenerationClient, GenerationRequest};
use std::sync::Arc;

use super::chunking::truncate_chars;
use super::retry::{RetryPolicy, retry_with_backoff};
use super::sanitize::{extract_metric, sanitize_model_response};
use super::types::{AnalysisError, MetricClass, MetricResult, PipelineSettings};

/// Issues analysis requests for individual metrics against a generation client.
///
/// `analyze` always yields a [`MetricResult`]: once the tier's attempts are exhausted the
/// deterministic pending placeholder is returned instead of an error.
pub struct AnalysisDriver {
    client: Arc<dyn GenerationClient>,
    settings: PipelineSettings,
}

impl AnalysisDriver {
    /// Create a driver around a shared client handle.
    pub fn new(client: Arc<dyn GenerationClient>, settings: PipelineSettings) -> Self {
        Self { client, settings }
    }

    /// Settings this driver applies.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Analyze `text` for one metric, retrying according to the metric's tier.
    pub async fn analyze(&self, text: &str, metric: &str, class: MetricClass) -> MetricResult {
        let policy = RetryPolicy::new(class.max_attempts(), self.settings.retry_backoff);
        let text = truncate_chars(text, self.settings.chunk_size);

        match retry_with_backoff(policy, move |attempt| self.attempt(text, metric, attempt)).await
        {
            Ok(result) => {
                tracing::debug!(metric, ?class, "Metric analyzed");
                result
            }
            Err(error) => {
                tracing::warn!(
                    metric,
                    ?class,
                    attempts = policy.max_attempts,
                    error = %error,
                    "Metric analysis exhausted its attempts; using fallback"
                );
                MetricResult::pending(metric)
            }
        }
    }

    async fn attempt(
        &self,
        text: &str,
        metric: &str,
        attempt: u32,
    ) -> Result<MetricResult, AnalysisError> {
        tracing::trace!(metric, attempt, "Requesting metric analysis");
        let request = GenerationRequest {
            prompt: build_metric_prompt(text, metric),
            config: self.settings.generation,
        };

        let timeout = self.settings.call_timeout;
        let raw = tokio::time::timeout(timeout, self.client.generate(request))
            .await
            .map_err(|_| AnalysisError::GenerationTimeout {
                metric: metric.to_string(),
                timeout,
            })??;

        let payload = sanitize_model_response(&raw);
        extract_metric(&payload, metric).ok_or_else(|| AnalysisError::MalformedModelResponse {
            metric: metric.to_string(),
            reason: format!("missing analysis.{metric} entry"),
        })
    }
}

/// Build the deterministic instruction for one metric.
pub(crate) fn build_metric_prompt(text: &str, metric: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "System: You are a meticulous data analyst. Analyze the document below and respond with a single JSON object and nothing else.\n\n",
    );
    prompt.push_str(&format!("Metric: {metric}\n\n"));
    prompt.push_str("Respond using exactly this shape:\n");
    prompt.push_str(&format!(
        r#"{{"analysis": {{"{metric}": {{"summary": "string", "key_points": ["string"], "metrics": {{"name": "value"}}, "recommendations": ["string"]}}}}, "overall_summary": "string", "confidence_score": 0.0}}"#
    ));
    prompt.push_str("\n\nDocument:\n");
    prompt.push_str(text);
    prompt
}
