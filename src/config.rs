//! Pipeline configuration loaded from environment variables.
//!
//! Settings are loaded once at startup (after `dotenv`), optionally
//! overridden by CLI flags, and passed by value into each component's
//! constructor. No component reads the process environment itself.
//!
//! ## Variables
//!
//! - `LLM_PROVIDER` - `openai` or `anthropic` (default: `openai`)
//! - `LLM_MODEL` - model name for the chosen provider (default: `gpt-4o-mini`)
//! - `LLM_TEMPERATURE` - generation temperature (default: `0.7`)
//! - `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` - provider credentials
//! - `TAVILY_API_KEY` - search credential; unset means empty research results
//! - `TAVILY_ENDPOINT` - search endpoint (default: `https://api.tavily.com/search`)
//! - `TAVILY_MAX_RESULTS` - per-query result cap (default: `3`)
//! - `MAX_WORDS` - soft budget for the rendered newsletter (default: `1000`)
//! - `PER_SECTION_WORD_TARGET` - per-section word cap (default: `180`)
//! - `ENABLE_MARKET_DATA` - toggle for the market section (default: `true`)
//! - `MARKET_DATA_POSITION` - insertion index; negative appends (default: `0`)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM`
//! - `LOG_LEVEL` - tracing filter (default: `info`)
//! - `OUTPUT_DIR` - artifact directory (default: `output`)
//! - `RESEARCH_CACHE_DIR` - research cache directory (default: `.cache/research`)

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::NewsletterError;
use crate::Result;

/// Supported text-generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
}

impl FromStr for LlmProvider {
    type Err = NewsletterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(NewsletterError::Configuration(format!(
                "Unsupported LLM provider: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    // LLM
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,

    // Search
    pub tavily_api_key: Option<String>,
    pub tavily_endpoint: String,
    pub tavily_max_results: usize,

    // Output & limits
    pub max_words: usize,
    pub per_section_word_target: usize,

    // Market data integration
    pub enable_market_data: bool,
    /// Insertion index for the market section; negative means append.
    pub market_data_position: i32,

    // Email (SMTP)
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,

    // Misc
    pub log_level: String,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Settings {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let llm_provider = match env::var("LLM_PROVIDER") {
            Ok(value) => value.parse()?,
            Err(_) => LlmProvider::OpenAi,
        };

        Ok(Self {
            llm_provider,
            llm_model: env_or("LLM_MODEL", "gpt-4o-mini"),
            llm_temperature: env_parsed("LLM_TEMPERATURE", 0.7),
            openai_api_key: non_empty(env::var("OPENAI_API_KEY").ok()),
            anthropic_api_key: non_empty(env::var("ANTHROPIC_API_KEY").ok()),
            tavily_api_key: non_empty(env::var("TAVILY_API_KEY").ok()),
            tavily_endpoint: env_or("TAVILY_ENDPOINT", "https://api.tavily.com/search"),
            tavily_max_results: env_parsed("TAVILY_MAX_RESULTS", 3),
            max_words: env_parsed("MAX_WORDS", 1000),
            per_section_word_target: env_parsed("PER_SECTION_WORD_TARGET", 180),
            enable_market_data: env_flag("ENABLE_MARKET_DATA", true),
            market_data_position: env_parsed("MARKET_DATA_POSITION", 0),
            smtp_host: non_empty(env::var("SMTP_HOST").ok()),
            smtp_port: env_parsed("SMTP_PORT", 587),
            smtp_username: non_empty(env::var("SMTP_USERNAME").ok()),
            smtp_password: non_empty(env::var("SMTP_PASSWORD").ok()),
            smtp_from: non_empty(env::var("SMTP_FROM").ok()),
            log_level: env_or("LOG_LEVEL", "info"),
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", "output")),
            cache_dir: PathBuf::from(env_or("RESEARCH_CACHE_DIR", ".cache/research")),
        })
    }

}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_provider: LlmProvider::OpenAi,
            llm_model: "gpt-4o-mini".to_string(),
            llm_temperature: 0.7,
            openai_api_key: None,
            anthropic_api_key: None,
            tavily_api_key: None,
            tavily_endpoint: "https://api.tavily.com/search".to_string(),
            tavily_max_results: 3,
            max_words: 1000,
            per_section_word_target: 180,
            enable_market_data: true,
            market_data_position: 0,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: None,
            log_level: "info".to_string(),
            output_dir: PathBuf::from("output"),
            cache_dir: PathBuf::from(".cache/research"),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
