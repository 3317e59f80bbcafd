use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ImageGenerator, Prompt, TextGenerator};
use crate::config::HuggingFaceSettings;

fn model_url(settings: &HuggingFaceSettings, model: &str) -> String {
    format!("{}/{}", settings.api_base.trim_end_matches('/'), model)
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum TextGenerationReply {
    Generated(Vec<GeneratedText>),
    Failed { error: String },
}

#[derive(Deserialize, Debug)]
struct GeneratedText {
    generated_text: String,
}

/// Some text-generation models echo the prompt back ahead of their answer.
fn strip_echoed_prompt(generated: &str, prompt: &str) -> String {
    generated
        .trim_start()
        .strip_prefix(prompt.trim())
        .unwrap_or(generated)
        .trim()
        .to_string()
}

pub struct HuggingFaceText {
    http: reqwest::Client,
    token: String,
    url: String,
    max_new_tokens: u32,
}

impl HuggingFaceText {
    pub fn new(http: reqwest::Client, token: &str, settings: &HuggingFaceSettings) -> Self {
        Self {
            http,
            token: token.to_string(),
            url: model_url(settings, &settings.text_model),
            max_new_tokens: settings.max_new_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceText {
    async fn generate_text(&self, prompt: &Prompt) -> Result<String> {
        let inputs = prompt.flattened();
        let reply: TextGenerationReply = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&json!({
                "inputs": inputs,
                "parameters": {"max_new_tokens": self.max_new_tokens},
                "task": "text-generation",
            }))
            .send()
            .await?
            .json()
            .await?;
        match reply {
            TextGenerationReply::Generated(generated) => generated
                .first()
                .map(|g| strip_echoed_prompt(&g.generated_text, &inputs))
                .ok_or_else(|| anyhow!("No generated text in response")),
            TextGenerationReply::Failed { error } => bail!("HuggingFace inference error: {error}"),
        }
    }
}

pub struct HuggingFaceImage {
    http: reqwest::Client,
    token: String,
    url: String,
}

impl HuggingFaceImage {
    pub fn new(http: reqwest::Client, token: &str, settings: &HuggingFaceSettings) -> Self {
        Self {
            http,
            token: token.to_string(),
            url: model_url(settings, &settings.image_model),
        }
    }
}

#[async_trait]
impl ImageGenerator for HuggingFaceImage {
    /// Text-to-image models answer with the raw image bytes.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&json!({ "inputs": prompt }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!(
                "HuggingFace image request failed ({status}): {}",
                response.text().await?
            );
        }
        Ok(response.bytes().await?.to_vec())
    }
}
