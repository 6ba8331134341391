//! Scripted generation clients shared by the pipeline unit tests.

use crate::generation::{GenerationClient, GenerationClientError, GenerationRequest};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a scripted client does for one request.
pub(crate) enum Scripted {
    Reply(String),
    Fail,
    Hang,
}

type Handler = Box<dyn Fn(&str) -> Scripted + Send + Sync>;

/// Client whose behaviour is decided per metric named in the prompt.
pub(crate) struct ScriptedClient {
    handler: Handler,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub(crate) fn new(handler: impl Fn(&str) -> Scripted + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answers every metric with a well-formed payload.
    pub(crate) fn answering() -> Self {
        Self::new(|metric| Scripted::Reply(metric_reply(metric)))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let metric = metric_in_prompt(&request.prompt);
        match (self.handler)(&metric) {
            Scripted::Reply(text) => Ok(text),
            Scripted::Fail => Err(GenerationClientError::GenerationFailed(
                "scripted failure".into(),
            )),
            Scripted::Hang => std::future::pending().await,
        }
    }
}

/// A valid fenced model reply for `metric`.
pub(crate) fn metric_reply(metric: &str) -> String {
    let body = json!({
        "analysis": {
            metric: {
                "summary": format!("Live {metric} analysis"),
                "key_points": ["point"],
                "metrics": { "rows": 3 },
                "recommendations": ["act"]
            }
        },
        "overall_summary": "ok",
        "confidence_score": 0.9
    });
    format!("```json\n{body}\n```")
}

fn metric_in_prompt(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Metric: "))
        .unwrap_or_default()
        .trim()
        .to_string()
}
