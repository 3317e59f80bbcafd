use serde::Deserialize;

use crate::providers::Provider;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Could not find {0} in the environment.")]
    MissingKey(&'static str),
    #[error("Could not read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Could not parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Everything needed to talk to the providers, except secrets.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub http: HttpSettings,
    pub openai: OpenAiSettings,
    pub bedrock: BedrockSettings,
    pub huggingface: HuggingFaceSettings,
}

impl ProviderSettings {
    /// Load the settings from a YAML file.
    pub fn load(yml_path: &str) -> Result<Self, ConfigError> {
        let yml = std::fs::read_to_string(yml_path)?;
        Ok(serde_yaml::from_str(&yml)?)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    /// Extra attempts after a failed provider call. Zero means fail on the first error.
    pub retries: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            retries: 0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    /// Point at any OpenAI-compatible server, e.g. `http://localhost:11434/v1`
    pub api_base: Option<String>,
    pub chat_model: String,
    pub image_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_base: None,
            chat_model: "gpt-4o-mini".into(),
            image_model: "dall-e-3".into(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BedrockSettings {
    pub region: String,
    pub text_model: String,
    pub image_model: String,
    pub max_tokens: i32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for BedrockSettings {
    fn default() -> Self {
        Self {
            region: "us-east-1".into(),
            text_model: "anthropic.claude-3-5-sonnet-20240620-v1:0".into(),
            image_model: "stability.stable-diffusion-xl-v1".into(),
            max_tokens: 2000,
            temperature: 0.5,
            top_p: 0.7,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HuggingFaceSettings {
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub max_new_tokens: u32,
}

impl Default for HuggingFaceSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api-inference.huggingface.co/models".into(),
            text_model: "microsoft/Phi-3-mini-4k-instruct".into(),
            image_model: "prompthero/openjourney".into(),
            max_new_tokens: 500,
        }
    }
}

/// API keys, read from the environment (or `.env`) at startup.
///
/// Bedrock is absent on purpose: the AWS SDK finds its own credentials.
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub huggingface: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &self.openai.as_ref().map(|_| "<set>"))
            .field("huggingface", &self.huggingface.as_ref().map(|_| "<set>"))
            .finish()
    }
}

pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
pub const HUGGINGFACE_KEY_VAR: &str = "HF_TOKEN";

impl ApiKeys {
    pub fn from_env() -> Self {
        let var = |name: &str| dotenvy::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            openai: var(OPENAI_KEY_VAR),
            huggingface: var(HUGGINGFACE_KEY_VAR),
        }
    }

    /// The key a provider needs, if it needs one.
    pub fn require(&self, provider: Provider) -> Result<Option<&str>, ConfigError> {
        match provider {
            Provider::OpenAI => self
                .openai
                .as_deref()
                .map(Some)
                .ok_or(ConfigError::MissingKey(OPENAI_KEY_VAR)),
            Provider::HuggingFace => self
                .huggingface
                .as_deref()
                .map(Some)
                .ok_or(ConfigError::MissingKey(HUGGINGFACE_KEY_VAR)),
            Provider::Bedrock => Ok(None),
        }
    }
}
