//! OpenAI-compatible vision oracle
//!
//! ## Stack
//! - `async-openai` for the chat completion call
//! - any OpenAI-compatible endpoint and model (Gemini, Azure, local gateways)
//! - page images travel inline as base64 data URLs

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::OracleError;
use crate::infrastructure::oracle::ModelOracle;
use crate::models::document::PageImage;

/// Upper bound for one completion
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const TEMPERATURE: f32 = 0.3;

/// Vision model behind an OpenAI-compatible chat API
pub struct OpenAiOracle {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_tokens: u32,
}

impl OpenAiOracle {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            max_tokens: config.llm_max_tokens,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Single user message: the prompt followed by the page image
    fn build_messages(
        &self,
        image: &PageImage,
        prompt: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>, OracleError> {
        let content_parts = vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: prompt.to_string(),
                },
            ),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: data_url(image),
                        detail: Some(ImageDetail::High),
                    },
                },
            ),
        ];

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(|e| OracleError::RequestBuildFailed {
                message: e.to_string(),
            })?;

        Ok(vec![ChatCompletionRequestMessage::User(user_msg)])
    }
}

#[async_trait]
impl ModelOracle for OpenAiOracle {
    async fn transcribe(&self, image: &PageImage, prompt: &str) -> Result<String, OracleError> {
        debug!(
            "oracle call, model: {}, prompt {} chars, image {} bytes",
            self.model_name,
            prompt.len(),
            image.bytes.len()
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(self.build_messages(image, prompt)?)
            .temperature(TEMPERATURE)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| OracleError::RequestBuildFailed {
                message: e.to_string(),
            })?;

        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.client.chat().create(request))
            .await
            .map_err(|_| OracleError::Timeout {
                seconds: REQUEST_TIMEOUT.as_secs(),
            })?
            .map_err(|e| {
                warn!("oracle call failed: {}", e);
                OracleError::RequestFailed {
                    model: self.model_name.clone(),
                    source: Box::new(e),
                }
            })?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| OracleError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        let content = choice
            .message
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OracleError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        debug!("oracle call succeeded, {} chars", content.len());
        Ok(content.to_string())
    }
}

/// `data:<mime>;base64,<payload>`
pub fn data_url(image: &PageImage) -> String {
    format!("data:{};base64,{}", image.mime, STANDARD.encode(&image.bytes))
}
