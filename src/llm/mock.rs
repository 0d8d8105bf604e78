//! Mock generator for testing.
//!
//! Provides deterministic responses based on prompt patterns or a scripted
//! sequence.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::Result;
use crate::llm::Generator;

/// Response returned when nothing matches.
const FALLBACK_RESPONSE: &str = "Unable to process query.";

/// Mock generator that returns canned responses.
///
/// Scripted responses (see [`MockGenerator::with_sequence`]) are consumed
/// first, in order. After that, the first pattern contained in the prompt
/// (case-insensitive) decides the response.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    sequence: Arc<Mutex<VecDeque<String>>>,
    delay: Option<Duration>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockGenerator {
    /// Creates a new mock generator with no responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the prompt contains `pattern`, the mock will return `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Queues responses returned in order, one per call.
    pub fn with_sequence<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut queue) = self.sequence.lock() {
            queue.extend(responses.into_iter().map(Into::into));
        }
        self
    }

    /// Delays every response, simulating a slow service.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns every prompt received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn mock_response(&self, prompt: &str) -> String {
        if let Some(next) = self.sequence.lock().ok().and_then(|mut q| q.pop_front()) {
            return next;
        }

        let prompt_lower = prompt.to_lowercase();
        for (pattern, response) in &self.custom_responses {
            if prompt_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        FALLBACK_RESPONSE.to_string()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut log) = self.prompts.lock() {
            log.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.mock_response(prompt))
    }
}
