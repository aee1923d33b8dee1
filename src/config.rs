use crate::error::InfraError;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TCP_ADDR: &str = "0.0.0.0:9876";
const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

fn default_tcp_addr() -> String {
    DEFAULT_TCP_ADDR.to_string()
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listen address, e.g. "0.0.0.0:9876"
    #[serde(default = "default_tcp_addr")]
    pub tcp_addr: String,
    /// Upper bound on a single inbound frame; longer lines drop the connection.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InfraError> {
        let data = std::fs::read_to_string(path).map_err(InfraError::ConfigRead)?;
        let cfg: Self = toml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self, InfraError> {
        let _ = dotenvy::from_filename(".env");

        let max_frame_bytes = match std::env::var("MAX_FRAME_BYTES") {
            Ok(v) => v
                .parse()
                .map_err(|_| InfraError::InvalidEnv("MAX_FRAME_BYTES".to_string(), v))?,
            Err(_) => DEFAULT_MAX_FRAME_BYTES,
        };

        Ok(Self {
            tcp_addr: std::env::var("TCP_ADDR").unwrap_or_else(|_| DEFAULT_TCP_ADDR.to_string()),
            max_frame_bytes,
        })
    }
}
