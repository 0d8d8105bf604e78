//! Intent classification.

use std::sync::Arc;
use tracing::{debug, info};

use crate::db::BackendTarget;
use crate::error::{BridgeError, Result};
use crate::llm::{parser, prompt, Generator};

use super::Intent;

/// Asks the generator for exactly one label from the backend's intent set.
#[derive(Clone)]
pub struct Classifier {
    generator: Arc<dyn Generator>,
}

impl Classifier {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Classifies an instruction for the given backend.
    ///
    /// The answer is trimmed and lowercased; anything outside the closed set
    /// fails with [`BridgeError::ClassificationAmbiguous`] carrying the raw
    /// answer. There is no retry.
    pub async fn classify(&self, instruction: &str, target: BackendTarget) -> Result<Intent> {
        let prompt = match target {
            BackendTarget::Relational => prompt::relational_classification(instruction),
            BackendTarget::Document => prompt::document_classification(instruction),
        };

        let raw = self.generator.generate(&prompt).await?;
        debug!(backend = %target, raw = %raw, "Classification response");

        let label = parser::normalize_label(&raw);
        let intent = Intent::from_label(target, &label).ok_or_else(|| BridgeError::ambiguous(raw))?;

        info!(backend = %target, intent = %intent, "Detected intent");
        Ok(intent)
    }
}
