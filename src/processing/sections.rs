//! Two-tier section analytics for a single parsed document.

use crate::parsing::ParsedDocument;
use futures_util::future::join_all;
use std::collections::BTreeMap;

use super::chunking::first_chunk;
use super::driver::AnalysisDriver;
use super::types::{AnalysisSection, AnalyticsOutcome, MetricClass, MetricResult, fallback_results};

/// Runs every metric of a section against one document.
///
/// The primary tier is always awaited in full. The deep tier runs concurrently with it under
/// a single aggregate deadline; if the deadline passes, every deep metric is reported as a
/// placeholder, including any that had already finished.
pub struct SectionAnalytics {
    driver: AnalysisDriver,
}

impl SectionAnalytics {
    /// Wrap a driver.
    pub fn new(driver: AnalysisDriver) -> Self {
        Self { driver }
    }

    /// Compute both tiers of `section` for `document`.
    pub async fn run(
        &self,
        document: &ParsedDocument,
        section: &AnalysisSection,
    ) -> AnalyticsOutcome {
        let settings = self.driver.settings();
        let text = match first_chunk(document, settings.chunk_size) {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(
                    section = section.title(),
                    error = %error,
                    "Could not prepare document text; reporting placeholder analytics"
                );
                return AnalyticsOutcome::fallback(section);
            }
        };

        let (primary, deep) = tokio::join!(
            self.primary_tier(&text, section.primary_metric_names()),
            self.deep_tier(&text, section.deep_metric_names()),
        );

        AnalyticsOutcome { primary, deep }
    }

    async fn primary_tier(&self, text: &str, names: &[String]) -> BTreeMap<String, MetricResult> {
        self.tier(text, names, MetricClass::Primary).await
    }

    async fn deep_tier(&self, text: &str, names: &[String]) -> BTreeMap<String, MetricResult> {
        if names.is_empty() {
            return BTreeMap::new();
        }

        let deadline = self.driver.settings().deep_tier_timeout;
        match tokio::time::timeout(deadline, self.tier(text, names, MetricClass::Deep)).await {
            Ok(results) => results,
            Err(_) => {
                tracing::warn!(
                    metrics = names.len(),
                    timeout = ?deadline,
                    "Deep analysis tier timed out; reporting placeholders"
                );
                fallback_results(names)
            }
        }
    }

    async fn tier(
        &self,
        text: &str,
        names: &[String],
        class: MetricClass,
    ) -> BTreeMap<String, MetricResult> {
        let results = join_all(
            names
                .iter()
                .map(|name| self.driver.analyze(text, name, class)),
        )
        .await;

        names.iter().cloned().zip(results).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::{ExtractionStatus, Row};
    use crate::processing::test_support::{Scripted, ScriptedClient, metric_reply};
    use crate::processing::types::PipelineSettings;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn document() -> ParsedDocument {
        let mut row = Row::new();
        row.push("region", Some("EU".into()));
        row.push("revenue", Some("1200".into()));
        ParsedDocument::TabularFlat { rows: vec![row] }
    }

    fn analytics(client: Arc<ScriptedClient>, settings: PipelineSettings) -> SectionAnalytics {
        SectionAnalytics::new(AnalysisDriver::new(client, settings))
    }

    #[tokio::test(start_paused = true)]
    async fn all_metrics_live_when_model_answers() {
        let client = Arc::new(ScriptedClient::answering());
        let outcome = analytics(client.clone(), PipelineSettings::default())
            .run(&document(), &AnalysisSection::standard())
            .await;

        assert_eq!(client.calls(), 5);
        assert_eq!(outcome.fallback_count(), 0);
        assert_eq!(
            outcome.primary.keys().collect::<Vec<_>>(),
            ["insights", "summary", "trends"]
        );
        assert_eq!(outcome.deep["risks"].summary, "Live risks analysis");
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_deep_tier_is_abandoned_at_its_deadline() {
        let client = Arc::new(ScriptedClient::new(|metric| match metric {
            "risks" | "recommendations" => Scripted::Hang,
            other => Scripted::Reply(metric_reply(other)),
        }));
        let settings = PipelineSettings {
            call_timeout: Duration::from_secs(30),
            ..PipelineSettings::default()
        };
        let started = Instant::now();
        let outcome = analytics(client, settings)
            .run(&document(), &AnalysisSection::standard())
            .await;

        assert_eq!(started.elapsed(), Duration::from_secs(15));
        assert!(outcome.primary.values().all(|result| !result.fallback));
        assert_eq!(outcome.deep["risks"], MetricResult::pending("risks"));
        assert_eq!(
            outcome.deep["recommendations"],
            MetricResult::pending("recommendations")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn finished_deep_metrics_are_not_salvaged_after_timeout() {
        let client = Arc::new(ScriptedClient::new(|metric| match metric {
            "recommendations" => Scripted::Hang,
            other => Scripted::Reply(metric_reply(other)),
        }));
        let settings = PipelineSettings {
            call_timeout: Duration::from_secs(30),
            ..PipelineSettings::default()
        };
        let outcome = analytics(client, settings)
            .run(&document(), &AnalysisSection::standard())
            .await;

        assert!(outcome.deep["risks"].fallback);
        assert!(outcome.deep["recommendations"].fallback);
        assert_eq!(outcome.fallback_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_primary_metric_falls_back_alone() {
        let client = Arc::new(ScriptedClient::new(|metric| match metric {
            "trends" => Scripted::Fail,
            other => Scripted::Reply(metric_reply(other)),
        }));
        let outcome = analytics(client.clone(), PipelineSettings::default())
            .run(&document(), &AnalysisSection::standard())
            .await;

        // trends is attempted twice, every other metric once
        assert_eq!(client.calls(), 6);
        assert_eq!(outcome.primary["trends"], MetricResult::pending("trends"));
        assert!(!outcome.primary["summary"].fallback);
        assert_eq!(outcome.fallback_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn section_without_deep_metrics_skips_the_tier() {
        let client = Arc::new(ScriptedClient::answering());
        let section =
            AnalysisSection::new("Overview", ["summary"], Vec::<String>::new()).expect("section");
        let outcome = analytics(client.clone(), PipelineSettings::default())
            .run(&document(), &section)
            .await;

        assert_eq!(client.calls(), 1);
        assert_eq!(outcome.primary.len(), 1);
        assert!(outcome.deep.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unusable_chunk_size_yields_placeholders_without_calls() {
        let client = Arc::new(ScriptedClient::answering());
        let settings = PipelineSettings {
            chunk_size: 0,
            ..PipelineSettings::default()
        };
        let document = ParsedDocument::TextDocument {
            extracted_text: "hello".into(),
            page_count: 1,
            extraction_status: ExtractionStatus::Success,
        };
        let section = AnalysisSection::standard();
        let outcome = analytics(client.clone(), settings).run(&document, &section).await;

        assert_eq!(client.calls(), 0);
        assert_eq!(outcome, AnalyticsOutcome::fallback(&section));
    }
}
