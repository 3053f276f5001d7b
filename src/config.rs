use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::chatbot::gemini::{DEFAULT_API_BASE, DEFAULT_MODEL, GeminiConfig};
use crate::chatbot::relay::RelayConfig;
use crate::transport::{ProxyConfig, TransportConfig};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{}': {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failed to parse YAML.
    #[error("failed to parse config file '{}': {source}", .path.display())]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    /// A required setting is absent from both flags and file.
    #[error("missing required setting '{0}'")]
    Missing(&'static str),
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Run environment; selects the log format and level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Environment {
    Local,
    Dev,
    #[default]
    Prod,
}

/// Command line flags. Anything given here wins over the config file.
#[derive(Debug, Default, Parser)]
#[command(name = "geminigram", version, about = "Telegram bot relaying /text and /image prompts to Gemini")]
pub struct Args {
    /// YAML config file
    #[arg(long, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,
    /// Telegram bot token
    #[arg(long = "token")]
    pub tg_token: Option<String>,
    /// Run environment
    #[arg(long, value_enum)]
    pub env: Option<Environment>,
    /// Gemini API key
    #[arg(long = "ai_token", alias = "ai-token")]
    pub ai_token: Option<String>,
    /// Proxy server URL for Gemini traffic
    #[arg(long)]
    pub proxy: Option<String>,
    /// Proxy username
    #[arg(long = "user")]
    pub proxy_user: Option<String>,
    /// Proxy password
    #[arg(long = "pass")]
    pub proxy_pass: Option<String>,
    /// Directory downloaded photos are stored in
    #[arg(long = "static")]
    pub static_path: Option<PathBuf>,
    /// Gemini model name
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    env: Option<String>,
    ai_token: Option<String>,
    tg_token: Option<String>,
    static_path: Option<PathBuf>,
    #[serde(default)]
    proxy: ProxyFile,
    model: Option<String>,
    api_base: Option<String>,
    /// Bot API server, for a self-hosted `telegram-bot-api`.
    telegram_api_url: Option<String>,
    #[serde(default)]
    notify_failures: bool,
    /// Also write logs to `<log_dir>/geminigram.log`.
    log_dir: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProxyFile {
    addr: Option<String>,
    user: Option<String>,
    pass: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env: Environment,
    pub ai_token: String,
    pub tg_token: String,
    pub static_path: PathBuf,
    pub proxy: Option<ProxyConfig>,
    pub model: String,
    pub api_base: String,
    pub telegram_api_url: Option<reqwest::Url>,
    pub notify_failures: bool,
    pub log_dir: Option<PathBuf>,
    pub request_timeout: Option<Duration>,
}

impl Config {
    /// Merge flags over the optional config file and validate the result.
    pub fn load(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => read_file(path)?,
            None => ConfigFile::default(),
        };

        let ai_token = non_empty(args.ai_token.or(file.ai_token)).ok_or(ConfigError::Missing("ai_token"))?;
        let tg_token = non_empty(args.tg_token.or(file.tg_token)).ok_or(ConfigError::Missing("tg_token"))?;
        let static_path = args
            .static_path
            .or(file.static_path)
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::Missing("static_path"))?;

        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = tg_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "tg_token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }

        let proxy = non_empty(args.proxy.or(file.proxy.addr)).map(|url| ProxyConfig {
            url,
            username: args.proxy_user.or(file.proxy.user).unwrap_or_default(),
            password: args.proxy_pass.or(file.proxy.pass).unwrap_or_default(),
        });

        let telegram_api_url = non_empty(file.telegram_api_url)
            .map(|url| {
                reqwest::Url::parse(&url)
                    .map_err(|e| ConfigError::Validation(format!("telegram_api_url '{url}' is invalid: {e}")))
            })
            .transpose()?;

        let file_env = non_empty(file.env)
            .map(|name| {
                <Environment as clap::ValueEnum>::from_str(&name, false)
                    .map_err(|_| ConfigError::Validation(format!("unknown env '{name}' (expected local, dev or prod)")))
            })
            .transpose()?;

        if file.request_timeout_secs == Some(0) {
            return Err(ConfigError::Validation("request_timeout_secs must be positive".into()));
        }

        Ok(Self {
            env: args.env.or(file_env).unwrap_or_default(),
            ai_token,
            tg_token,
            static_path,
            proxy,
            model: non_empty(args.model.or(file.model)).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: non_empty(file.api_base).unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            telegram_api_url,
            notify_failures: file.notify_failures,
            log_dir: file.log_dir,
            request_timeout: file.request_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            api_key: self.ai_token.clone(),
            proxy: self.proxy.clone(),
            timeout: self.request_timeout,
        }
    }

    pub fn gemini(&self) -> GeminiConfig {
        GeminiConfig {
            api_base: self.api_base.clone(),
            model: self.model.clone(),
        }
    }

    pub fn relay(&self) -> RelayConfig {
        RelayConfig {
            static_path: self.static_path.clone(),
            notify_failures: self.notify_failures,
        }
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
        path: path.to_path_buf(),
        source: e,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
