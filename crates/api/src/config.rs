use anyhow::Result;
use debate::AppConfig;
use std::path::PathBuf;

pub const CONFIG_ENV: &str = "SURGICAL_DEBATE_CONFIG";
pub const BIND_ENV: &str = "SURGICAL_DEBATE_BIND";
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub app: AppConfig,
}

impl ServerConfig {
    /// Reads the TOML file named by `SURGICAL_DEBATE_CONFIG` (defaults when unset)
    /// and the listen address from `SURGICAL_DEBATE_BIND`.
    pub fn from_env() -> Result<Self> {
        let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let app = AppConfig::load_or_default(config_path.as_deref())?;
        let bind_addr = std::env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_BIND.to_string());

        Ok(Self { bind_addr, app })
    }
}
