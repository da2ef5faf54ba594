//! Runtime configuration for the debugify server
//!
//! Everything comes from the environment at process start. A missing API key
//! is logged as a configuration error but does not abort startup; chat
//! requests simply fail downstream with the standard 500 contract.

use std::path::PathBuf;

/// Stable 2.0 model, matching what the hosted frontend expects.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key, from GEMINI_API_KEY or GOOGLE_API_KEY.
    pub api_key: Option<String>,
    /// Model id used for generation.
    pub model: String,
    /// Directory for persisted workspace state.
    pub data_dir: PathBuf,
}

impl Config {
    /// Read configuration from the environment.
    pub fn from_env() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        if api_key.is_none() {
            log::error!(
                "Gemini API key is not set. Set GEMINI_API_KEY or GOOGLE_API_KEY; \
                 chat requests will fail until one is provided."
            );
        }

        let model = std::env::var("GEMINI_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self {
            api_key,
            model,
            data_dir: default_data_dir(),
        }
    }
}

/// Default directory for persisted workspace state.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("debugify"))
        .unwrap_or_else(|| PathBuf::from(".debugify"))
}
