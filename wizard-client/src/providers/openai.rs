use anyhow::anyhow;
use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateImageRequestArgs, Image, ImageModel, ImageQuality, ImageSize,
    },
};
use async_trait::async_trait;
use base64::Engine;

use super::{ImageGenerator, Prompt, TextGenerator};
use crate::config::OpenAiSettings;

/// Build a client for OpenAI, or for an OpenAI-compatible server if `api_base` is set.
pub fn client(
    api_key: &str,
    settings: &OpenAiSettings,
    http: reqwest::Client,
) -> async_openai::Client<OpenAIConfig> {
    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(api_base) = &settings.api_base {
        config = config.with_api_base(api_base);
    }
    async_openai::Client::build(http, config, Default::default())
}

fn image_model(name: &str) -> ImageModel {
    match name {
        "dall-e-2" => ImageModel::DallE2,
        "dall-e-3" => ImageModel::DallE3,
        other => ImageModel::Other(other.to_string()),
    }
}

pub struct OpenAiText {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiText {
    pub fn new(client: async_openai::Client<OpenAIConfig>, settings: &OpenAiSettings) -> Self {
        Self {
            client,
            model: settings.chat_model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiText {
    /// One-shot chat completion: the system role, then the prompt.
    async fn generate_text(&self, prompt: &Prompt) -> Result<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![];
        if let Some(system) = &prompt.system {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.as_str())
                    .build()?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user.as_str())
                .build()?
                .into(),
        );
        let req_args = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build()?;
        tracing::debug!("Prompt: {}", prompt.user);
        let text = self
            .client
            .chat()
            .create(req_args)
            .await?
            .choices
            .into_iter()
            .next()
            .ok_or(anyhow!("No response from LLM"))?
            .message
            .content
            .ok_or(anyhow!("No response from LLM"))?;
        Ok(text)
    }
}

pub struct OpenAiImage {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
    http: reqwest::Client,
}

impl OpenAiImage {
    pub fn new(
        client: async_openai::Client<OpenAIConfig>,
        settings: &OpenAiSettings,
        http: reqwest::Client,
    ) -> Self {
        Self {
            client,
            model: settings.image_model.clone(),
            http,
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImage {
    /// Generate one square image. URL results are downloaded, base64 results decoded.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        let request = CreateImageRequestArgs::default()
            .prompt(prompt)
            .model(image_model(&self.model))
            .size(ImageSize::S1024x1024)
            .quality(ImageQuality::Standard)
            .build()?;
        let response = self.client.images().create(request).await?;
        let image = response
            .data
            .first()
            .ok_or_else(|| anyhow!("No image in response"))?;
        match image.as_ref() {
            Image::Url { url, .. } => {
                tracing::info!("Fetching image from {}", url);
                let bytes = self
                    .http
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?;
                Ok(bytes.to_vec())
            }
            Image::B64Json { b64_json, .. } => Ok(base64::engine::general_purpose::STANDARD
                .decode(b64_json.as_bytes())?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_model_names() {
        assert!(matches!(image_model("dall-e-3"), ImageModel::DallE3));
        assert!(matches!(image_model("dall-e-2"), ImageModel::DallE2));
        assert!(matches!(image_model("gpt-image-1"), ImageModel::Other(m) if m == "gpt-image-1"));
    }
}
