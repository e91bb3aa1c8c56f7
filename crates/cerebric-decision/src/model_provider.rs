//! External `ModelProvider` interface (§6). Local LLM backends are
//! consumed only through this trait; no concrete backend lives in this
//! crate.

use async_trait::async_trait;
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, Clone)]
pub enum ModelProviderError {
    #[error("model load error: {0}")]
    ModelLoadError(String),
    #[error("model not loaded: {0}")]
    ModelNotLoadedError(String),
    #[error("model not found: {0}")]
    ModelNotFoundError(String),
    #[error("generation error: {0}")]
    GenerationError(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    pub model_id: String,
    pub tokens_used: u32,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>, ModelProviderError>;
    async fn load(&self, model_id: &str) -> Result<(), ModelProviderError>;
    async fn unload(&self, model_id: &str) -> Result<(), ModelProviderError>;
    async fn is_loaded(&self, model_id: &str) -> bool;
    async fn generate(
        &self,
        prompt: &str,
        model_id: &str,
        max_tokens: u32,
        temperature: f64,
        opts: &GenerateOptions,
    ) -> Result<GenerateResponse, ModelProviderError>;
    async fn health_check(&self) -> Result<(), ModelProviderError>;
}
