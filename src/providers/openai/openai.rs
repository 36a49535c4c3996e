use crate::config::ProviderConfig;
use crate::providers::traits::{Completion, CompletionProvider, TokenUsage};
use anyhow::{anyhow, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs, EmbeddingInput, Role,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;

#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY environment variable is not set."))?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(url) = &config.api_url {
            openai_config = openai_config.with_api_base(url);
        }

        Ok(Self {
            client: Client::with_config(openai_config),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(&self, system_message: &str, prompt: &str) -> Result<Completion> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .temperature(self.temperature)
            .messages(vec![
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    role: Role::System,
                    content: system_message.to_string(),
                    name: None,
                }),
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    role: Role::User,
                    content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
                    name: None,
                }),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();
        debug!("{} used {} tokens", self.chat_model, usage.total_tokens);

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("No response content"))?;

        Ok(Completion { text, usage })
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(EmbeddingInput::StringArray(texts.to_vec()))
            .build()?;

        let response = self.client.embeddings().create(request).await?;
        if response.data.len() != texts.len() {
            return Err(anyhow!(
                "Expected {} embeddings from OpenAI, got {}",
                texts.len(),
                response.data.len()
            ));
        }

        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok(self.chat_model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            api_key: api_key.map(String::from),
            api_url: None,
            chat_model: "gpt-4.1-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
            temperature: 0.3,
        }
    }

    #[test]
    fn missing_api_key_is_rejected() {
        assert!(OpenAIProvider::new(&config(None)).is_err());
    }

    #[tokio::test]
    async fn model_info_reports_chat_model() {
        let provider = OpenAIProvider::new(&config(Some("sk-test"))).unwrap();
        assert_eq!(provider.get_model_info().await.unwrap(), "gpt-4.1-mini");
        assert!(provider.generate_embeddings(&[]).await.unwrap().is_empty());
    }
}
