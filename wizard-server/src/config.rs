use serde::Deserialize;
use wizard_client::config::ProviderSettings;
use wizard_client::Provider;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub wizard: WizardConfig,
    pub providers: ProviderSettings,
}

impl Config {
    /// Load the configuration from a YAML file.
    pub fn load(yml_path: &str) -> anyhow::Result<Self> {
        let yml = std::fs::read_to_string(yml_path)?;
        let config: Config = serde_yaml::from_str(&yml)?;
        config.wizard.validate()?;
        Ok(config)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub tls: Option<TLSConfig>,
    /// Write daily rolling JSON logs here instead of to stdout
    pub log_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:3000".into(),
            tls: None,
            log_dir: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TLSConfig {
    pub cert_path: String,
    pub key_path: String,
}

/// Which providers the form offers
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    pub enabled: Vec<Provider>,
    pub default_provider: Provider,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            enabled: vec![Provider::OpenAI],
            default_provider: Provider::OpenAI,
        }
    }
}

impl WizardConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.enabled.is_empty(), "No providers are enabled");
        anyhow::ensure!(
            self.enabled.contains(&self.default_provider),
            "The default provider {} is not enabled",
            self.default_provider
        );
        Ok(())
    }
}
