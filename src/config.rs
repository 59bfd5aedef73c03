use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub irrigation: IrrigationConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub allowed_user_ids: Vec<u64>,
    /// Not used for routing; kept so existing deployments can carry it.
    #[serde(default)]
    pub notification_group_id: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IrrigationConfig {
    #[serde(default = "default_status_url")]
    pub status_url: String,
}

impl Default for IrrigationConfig {
    fn default() -> Self {
        Self {
            status_url: default_status_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    /// Pause between two sends of one broadcast (Telegram rate limits).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

impl BroadcastConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5008
}

fn default_status_url() -> String {
    "http://192.168.3.23:5000/api/status".to_string()
}

fn default_delay_ms() -> u64 {
    50
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;

        if config.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("[telegram] bot_token must not be empty");
        }

        let mut unique = Vec::with_capacity(config.telegram.allowed_user_ids.len());
        for id in &config.telegram.allowed_user_ids {
            if unique.contains(id) {
                warn!("Duplicate user ID {} in allowed_user_ids, ignoring", id);
            } else {
                unique.push(*id);
            }
        }
        config.telegram.allowed_user_ids = unique;

        Ok(config)
    }

    pub fn is_authorized(&self, user_id: u64) -> bool {
        self.telegram.allowed_user_ids.contains(&user_id)
    }
}
