//! Response header rules for the static engine assets.

use serde::Serialize;

use crate::config::AssetsConfig;

/// One year.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
pub const ALLOW_ANY_ORIGIN: &str = "*";

/// Headers served with one static asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRule {
    /// File name under the asset directory.
    pub file_name: &'static str,
    /// Full request path.
    pub path: String,
    pub content_type: &'static str,
    pub cache_control: &'static str,
    pub allow_origin: &'static str,
}

impl AssetRule {
    /// Header name/value pairs in response order.
    pub fn headers(&self) -> [(&'static str, &str); 3] {
        [
            ("content-type", self.content_type),
            ("cache-control", self.cache_control),
            ("access-control-allow-origin", self.allow_origin),
        ]
    }
}

/// The set of servable engine assets.
#[derive(Debug, Clone, Serialize)]
pub struct AssetRules {
    rules: Vec<AssetRule>,
}

impl AssetRules {
    /// Rules for the engine bootstrap script and execution image under
    /// `base_path`.
    pub fn for_base_path(base_path: &str) -> Self {
        let base = base_path.trim_end_matches('/');
        let rule = |file_name: &'static str, content_type: &'static str| AssetRule {
            file_name,
            path: format!("{}/{}", base, file_name),
            content_type,
            cache_control: IMMUTABLE_CACHE_CONTROL,
            allow_origin: ALLOW_ANY_ORIGIN,
        };

        Self {
            rules: vec![
                rule("ffmpeg-core.js", "text/javascript"),
                rule("ffmpeg-core.wasm", "application/wasm"),
            ],
        }
    }

    pub fn from_config(config: &AssetsConfig) -> Self {
        Self::for_base_path(&config.base_path)
    }

    /// Rule for a full request path.
    pub fn for_path(&self, path: &str) -> Option<&AssetRule> {
        self.rules.iter().find(|r| r.path == path)
    }

    /// Rule for a file name under the asset directory.
    pub fn for_file(&self, file_name: &str) -> Option<&AssetRule> {
        self.rules.iter().find(|r| r.file_name == file_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetRule> {
        self.rules.iter()
    }
}
