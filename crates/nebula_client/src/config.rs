use serde::{Deserialize, Serialize};

const CONFIG_FILE_PATH: &str = "config.toml";

const DEFAULT_BASE_URL: &str = "https://nebulaone-pilot.uw.edu";
const DEFAULT_CONFIG_STATE_ID: &str = "6752e690-6a81-417b-80f5-61b9e99c6c50";
const DEFAULT_GPT_SYSTEM_ID: &str = "bd74d1b1-7ea5-4974-bdde-1ddf63cb8300";

/// Backend connection settings. Loaded from `config.toml` when present,
/// overridden by `NEBULA_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub config_state_id: String,
    pub gpt_system_id: String,
    /// Default bearer token used when a request does not carry its own.
    pub auth_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            config_state_id: DEFAULT_CONFIG_STATE_ID.to_string(),
            gpt_system_id: DEFAULT_GPT_SYSTEM_ID.to_string(),
            auth_token: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        let mut config = Config::default();

        if std::path::Path::new(CONFIG_FILE_PATH).exists() {
            if let Ok(content) = std::fs::read_to_string(CONFIG_FILE_PATH) {
                if let Ok(file_config) = toml::from_str::<Config>(&content) {
                    config = file_config;
                }
            }
        }

        // Override with environment variables if they exist
        if let Ok(base_url) = std::env::var("NEBULA_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(config_state_id) = std::env::var("NEBULA_CONFIG_STATE_ID") {
            config.config_state_id = config_state_id;
        }
        if let Ok(gpt_system_id) = std::env::var("NEBULA_GPT_SYSTEM_ID") {
            config.gpt_system_id = gpt_system_id;
        }
        if let Ok(auth_token) = std::env::var("NEBULA_AUTH_TOKEN") {
            if !auth_token.is_empty() {
                config.auth_token = Some(auth_token);
            }
        }
        config
    }
}
