use std::sync::Arc;
use stillfade_core::{AssetRules, Config, SanitizedConfig, Session};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    session: Arc<Session>,
    ws_broadcaster: WsBroadcaster,
    asset_rules: AssetRules,
}

impl AppState {
    pub fn new(config: Config, session: Arc<Session>, ws_broadcaster: WsBroadcaster) -> Self {
        let asset_rules = AssetRules::from_config(&config.assets);
        Self {
            config,
            session,
            ws_broadcaster,
            asset_rules,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }

    pub fn asset_rules(&self) -> &AssetRules {
        &self.asset_rules
    }
}
