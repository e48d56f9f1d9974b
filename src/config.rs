//! Server configuration from the environment

/// System prompt prepended to every conversation; fixed for the life of
/// the process.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer concisely and truthfully.";

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_MODEL: &str = "local-gguf";
const DEFAULT_PORT: u16 = 8000;

/// Configuration for the server and its inference backend
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the llama.cpp server
    pub backend_url: String,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("EMBER_PORT").unwrap_or(DEFAULT_PORT),
            backend_url: std::env::var("EMBER_BACKEND_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
            model: std::env::var("EMBER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            system_prompt: std::env::var("EMBER_SYSTEM_PROMPT")
                .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tokens: env_parse("EMBER_MAX_TOKENS"),
            temperature: env_parse("EMBER_TEMPERATURE"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: None,
            temperature: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
