use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::{
    error::DisplayErrorContext,
    primitives::Blob,
    types::{ContentBlock, ConversationRole, InferenceConfiguration, Message, SystemContentBlock},
    Client,
};
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use super::{ImageGenerator, Prompt, TextGenerator};
use crate::config::BedrockSettings;

/// Connect to Bedrock in the configured region.
///
/// Credentials come from the SDK's default chain (environment, profile, instance role).
pub async fn client(settings: &BedrockSettings) -> Client {
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(settings.region.clone()))
        .load()
        .await;
    Client::new(&config)
}

pub struct BedrockText {
    client: Client,
    model: String,
    inference: InferenceConfiguration,
}

impl BedrockText {
    pub fn new(client: Client, settings: &BedrockSettings) -> Self {
        Self {
            client,
            model: settings.text_model.clone(),
            inference: InferenceConfiguration::builder()
                .max_tokens(settings.max_tokens)
                .temperature(settings.temperature)
                .top_p(settings.top_p)
                .build(),
        }
    }
}

#[async_trait]
impl TextGenerator for BedrockText {
    async fn generate_text(&self, prompt: &Prompt) -> Result<String> {
        let message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(prompt.user.clone()))
            .build()?;
        let mut request = self
            .client
            .converse()
            .model_id(&self.model)
            .messages(message)
            .inference_config(self.inference.clone());
        if let Some(system) = &prompt.system {
            request = request.system(SystemContentBlock::Text(system.clone()));
        }
        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Can't invoke '{}': {}", self.model, DisplayErrorContext(e)))?;
        let text = response
            .output()
            .and_then(|output| output.as_message().ok())
            .and_then(|message| message.content().iter().find_map(|c| c.as_text().ok()))
            .ok_or_else(|| anyhow!("No text in Bedrock response"))?;
        Ok(text.clone())
    }
}

/// Stable Diffusion XL parameters for a square "photographic" shot
fn sdxl_request(prompt: &str, seed: u32) -> serde_json::Value {
    json!({
        "text_prompts": [{"text": prompt}],
        "style_preset": "photographic",
        "seed": seed,
        "height": 640,
        "width": 640,
        "cfg_scale": 7,
        "steps": 150,
    })
}

#[derive(Deserialize)]
struct SdxlResponse {
    artifacts: Vec<SdxlArtifact>,
}

#[derive(Deserialize)]
struct SdxlArtifact {
    base64: String,
}

/// Pull the first image out of a Stable Diffusion XL response body
fn decode_sdxl_response(body: &[u8]) -> Result<Vec<u8>> {
    let response: SdxlResponse =
        serde_json::from_slice(body).context("Decoding Stable Diffusion response")?;
    let artifact = response
        .artifacts
        .first()
        .ok_or_else(|| anyhow!("No image artifacts in response"))?;
    Ok(base64::engine::general_purpose::STANDARD.decode(&artifact.base64)?)
}

pub struct BedrockImage {
    client: Client,
    model: String,
}

impl BedrockImage {
    pub fn new(client: Client, settings: &BedrockSettings) -> Self {
        Self {
            client,
            model: settings.image_model.clone(),
        }
    }
}

#[async_trait]
impl ImageGenerator for BedrockImage {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        let body = sdxl_request(prompt, rand::random());
        let response = self
            .client
            .invoke_model()
            .model_id(&self.model)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(serde_json::to_vec(&body)?))
            .send()
            .await
            .map_err(|e| anyhow!("Can't invoke '{}': {}", self.model, DisplayErrorContext(e)))?;
        decode_sdxl_response(response.body().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdxl_request_shape() {
        let body = sdxl_request("A bowl of ramen", 42);
        assert_eq!(body["text_prompts"][0]["text"], "A bowl of ramen");
        assert_eq!(body["seed"], 42);
        assert_eq!(body["style_preset"], "photographic");
        assert_eq!(body["width"], 640);
    }

    #[test]
    fn sdxl_response_decodes_first_artifact() {
        let body = br#"{"result": "success", "artifacts": [{"base64": "aGVsbG8=", "seed": 1}]}"#;
        assert_eq!(decode_sdxl_response(body).unwrap(), b"hello");
    }

    #[test]
    fn sdxl_response_without_artifacts_fails() {
        assert!(decode_sdxl_response(br#"{"artifacts": []}"#).is_err());
        assert!(decode_sdxl_response(b"not json").is_err());
    }
}
