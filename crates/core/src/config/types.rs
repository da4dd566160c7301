use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::engine::EngineConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional directory with a static front-end, served as fallback.
    #[serde(default)]
    pub ui_dir: Option<PathBuf>,
    /// Largest accepted upload body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ui_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

/// Static engine asset configuration (bootstrap script and execution image).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetsConfig {
    /// Directory holding `ffmpeg-core.js` and `ffmpeg-core.wasm`.
    #[serde(default = "default_assets_dir")]
    pub dir: PathBuf,
    /// URL prefix the assets are served under.
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: default_assets_dir(),
            base_path: default_base_path(),
        }
    }
}

impl AssetsConfig {
    /// URL of the engine bootstrap script.
    pub fn core_url(&self) -> String {
        format!("{}/ffmpeg-core.js", self.base_path.trim_end_matches('/'))
    }

    /// URL of the engine execution image.
    pub fn wasm_url(&self) -> String {
        format!("{}/ffmpeg-core.wasm", self.base_path.trim_end_matches('/'))
    }
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("public/ffmpeg")
}

fn default_base_path() -> String {
    "/ffmpeg".to_string()
}

/// Sanitized config for API responses (local paths reduced to presence flags)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: SanitizedServerConfig,
    pub engine: SanitizedEngineConfig,
    pub assets: SanitizedAssetsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub ui_enabled: bool,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEngineConfig {
    pub log_level: String,
    pub extra_args: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAssetsConfig {
    pub base_path: String,
    pub core_url: String,
    pub wasm_url: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: SanitizedServerConfig {
                host: config.server.host,
                port: config.server.port,
                ui_enabled: config.server.ui_dir.is_some(),
                max_upload_bytes: config.server.max_upload_bytes,
            },
            engine: SanitizedEngineConfig {
                log_level: config.engine.log_level.clone(),
                extra_args: config.engine.extra_args.len(),
            },
            assets: SanitizedAssetsConfig {
                base_path: config.assets.base_path.clone(),
                core_url: config.assets.core_url(),
                wasm_url: config.assets.wasm_url(),
            },
        }
    }
}
