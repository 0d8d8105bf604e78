//! Generator factory.
//!
//! Centralizes provider-specific logic for creating generators.

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{BridgeError, Result};
use crate::llm::{Generator, LlmProvider, MockGenerator, OpenAiClient, OpenAiConfig};

/// Creates a generator from the `[llm]` configuration.
///
/// For OpenAI the API key is resolved in order:
/// 1. Provided `api_key` parameter
/// 2. `api_key` from the config file
/// 3. `OPENAI_API_KEY` environment variable
///
/// `OPENAI_MODEL` overrides the configured model and `OPENAI_BASE_URL`
/// points the client at a compatible server.
pub fn create_generator(
    config: &LlmConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn Generator>> {
    let provider: LlmProvider = config.provider.parse().map_err(BridgeError::config)?;

    match provider {
        LlmProvider::OpenAi => {
            let key = api_key
                .or_else(|| config.api_key.clone())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    BridgeError::llm("No API key configured. Use --api-key or set OPENAI_API_KEY.")
                })?;

            let mut openai = OpenAiConfig::from_llm_config(config, key);
            if let Ok(model) = std::env::var("OPENAI_MODEL") {
                openai.model = model;
            }
            if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
                openai = openai.with_endpoint(format!(
                    "{}/chat/completions",
                    base.trim_end_matches('/')
                ));
            }
            Ok(Arc::new(OpenAiClient::new(openai)?))
        }
        LlmProvider::Mock => Ok(Arc::new(MockGenerator::new())),
    }
}
