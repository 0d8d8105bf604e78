//! Text-generation capability.
//!
//! The orchestrator treats the generation service as an opaque
//! `generate(prompt) -> text` function. Everything it returns is untrusted
//! and goes through [`parser`] before use.

pub mod factory;
pub mod mock;
pub mod openai;
pub mod parser;
pub mod prompt;

pub use factory::create_generator;
pub use mock::MockGenerator;
pub use openai::{OpenAiClient, OpenAiConfig};

use async_trait::async_trait;
use std::str::FromStr;

use crate::error::Result;

/// A text-generation service.
///
/// Implementations must be thread-safe (Send + Sync) so one instance can be
/// shared by concurrent requests.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generates a completion for a single prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generation provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    #[default]
    OpenAi,
    /// Scripted generator (no API key required)
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
