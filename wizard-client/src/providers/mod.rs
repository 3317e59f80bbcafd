//! Text and image generation behind one interface, whichever vendor does the work.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::{ApiKeys, ProviderSettings};

pub mod bedrock;
pub mod huggingface;
pub mod openai;

/// A prompt for a chat model: an optional system role plus the user's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// System role and message as one block of text, for plain completion endpoints.
    pub fn flattened(&self) -> String {
        match &self.system {
            Some(system) => format!("{} {}", system, self.user),
            None => self.user.clone(),
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &Prompt) -> Result<String>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns the encoded image (PNG, JPEG, WebP, ... whatever the provider sends).
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>>;
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Bedrock,
    HuggingFace,
}

/// A connected text generator and image generator from the same provider.
#[derive(Clone)]
pub struct Generators {
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
}

/// Build the generators for a provider.
///
/// Fails straight away if the provider's key is missing, before any request is made.
pub async fn connect(
    provider: Provider,
    settings: &ProviderSettings,
    keys: &ApiKeys,
) -> Result<Generators> {
    let key = keys.require(provider)?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.http.timeout_secs))
        .build()?;
    let retries = settings.http.retries;
    tracing::info!("Connecting to {provider} (retries: {retries})");
    let generators = match provider {
        Provider::OpenAI => {
            let client = openai::client(key.unwrap_or_default(), &settings.openai, http.clone());
            Generators {
                text: Arc::new(Retrying::new(
                    openai::OpenAiText::new(client.clone(), &settings.openai),
                    retries,
                )),
                image: Arc::new(Retrying::new(
                    openai::OpenAiImage::new(client, &settings.openai, http),
                    retries,
                )),
            }
        }
        Provider::Bedrock => {
            let client = bedrock::client(&settings.bedrock).await;
            Generators {
                text: Arc::new(Retrying::new(
                    bedrock::BedrockText::new(client.clone(), &settings.bedrock),
                    retries,
                )),
                image: Arc::new(Retrying::new(
                    bedrock::BedrockImage::new(client, &settings.bedrock),
                    retries,
                )),
            }
        }
        Provider::HuggingFace => {
            let token = key.unwrap_or_default();
            Generators {
                text: Arc::new(Retrying::new(
                    huggingface::HuggingFaceText::new(http.clone(), token, &settings.huggingface),
                    retries,
                )),
                image: Arc::new(Retrying::new(
                    huggingface::HuggingFaceImage::new(http, token, &settings.huggingface),
                    retries,
                )),
            }
        }
    };
    Ok(generators)
}

/// Longest wait between two attempts
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// 200ms, 400ms, 800ms, ... up to [`MAX_RETRY_DELAY`], before jitter.
fn backoff_schedule() -> ExponentialBackoff {
    ExponentialBackoff::from_millis(2)
        .factor(100)
        .max_delay(MAX_RETRY_DELAY)
}

fn backoff(retries: usize) -> impl Iterator<Item = Duration> {
    backoff_schedule().map(jitter).take(retries)
}

/// Retries a generator with exponential backoff and jitter.
pub struct Retrying<G> {
    inner: G,
    retries: usize,
}

impl<G> Retrying<G> {
    pub fn new(inner: G, retries: usize) -> Self {
        Self { inner, retries }
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for Retrying<G> {
    async fn generate_text(&self, prompt: &Prompt) -> Result<String> {
        Retry::spawn(backoff(self.retries), || async move {
            self.inner.generate_text(prompt).await.inspect_err(|e| {
                tracing::warn!("Text generation attempt failed: {e:#}");
            })
        })
        .await
    }
}

#[async_trait]
impl<G: ImageGenerator> ImageGenerator for Retrying<G> {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        Retry::spawn(backoff(self.retries), || async move {
            self.inner.generate_image(prompt).await.inspect_err(|e| {
                tracing::warn!("Image generation attempt failed: {e:#}");
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn provider_names() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAI);
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAI);
        assert_eq!("huggingface".parse::<Provider>().unwrap(), Provider::HuggingFace);
        assert_eq!(Provider::Bedrock.to_string(), "bedrock");
        assert!("gemini".parse::<Provider>().is_err());
    }

    #[test]
    fn flattened_prompt_puts_role_first() {
        let prompt = Prompt::new("Make soup.").with_system("You are a chef.");
        assert_eq!(prompt.flattened(), "You are a chef. Make soup.");
        assert_eq!(Prompt::new("Make soup.").flattened(), "Make soup.");
    }

    /// Fails a set number of times before answering
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for Flaky {
        async fn generate_text(&self, _prompt: &Prompt) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::ensure!(call >= self.failures, "rate limited");
            Ok("Title: Soup".into())
        }
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let delays = backoff_schedule().take(10).collect::<Vec<_>>();
        assert_eq!(delays[..3], [200, 400, 800].map(Duration::from_millis));
        assert_eq!(delays[9], MAX_RETRY_DELAY);
        assert!(delays.iter().all(|d| *d <= MAX_RETRY_DELAY));

        let jittered = backoff(10).collect::<Vec<_>>();
        assert_eq!(jittered.len(), 10);
        assert!(jittered.iter().all(|d| *d <= MAX_RETRY_DELAY));
    }

    #[tokio::test]
    async fn no_retries_by_default() {
        let flaky = Retrying::new(
            Flaky {
                failures: 1,
                calls: AtomicUsize::new(0),
            },
            0,
        );
        assert!(flaky.generate_text(&Prompt::new("soup")).await.is_err());
        assert_eq!(flaky.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let flaky = Retrying::new(
            Flaky {
                failures: 2,
                calls: AtomicUsize::new(0),
            },
            3,
        );
        let text = flaky.generate_text(&Prompt::new("soup")).await.unwrap();
        assert_eq!(text, "Title: Soup");
        assert_eq!(flaky.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn missing_key_fails_before_connecting() {
        let err = connect(Provider::OpenAI, &ProviderSettings::default(), &ApiKeys::default())
            .await
            .err()
            .unwrap();
        assert!(err
            .downcast_ref::<crate::config::ConfigError>()
            .is_some());
    }
}
