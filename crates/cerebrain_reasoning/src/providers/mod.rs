pub mod mock;
pub mod openai;

use crate::llm::LlmClient;
use anyhow::Result;
use cerebrain_core::config::LlmConfig;
use std::sync::Arc;

/// Build the client named by `cfg.provider`. `"mock"` needs no network.
pub fn create_client(cfg: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match cfg.provider.to_lowercase().as_str() {
        "mock" => Ok(Arc::new(mock::MockProvider::new(&cfg.model))),
        _ => Ok(Arc::new(openai::OpenAiClient::new(cfg)?)),
    }
}
