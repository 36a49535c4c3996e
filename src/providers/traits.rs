use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system_message: &str, prompt: &str) -> Result<Completion>;

    /// One vector per input, in input order.
    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.generate_embeddings(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("No embedding returned"))
    }

    async fn get_model_info(&self) -> Result<String>;
}
