//! Shared handles passed to services, resolvers and HTTP handlers.

use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::analytics::{Analytics, AnalyticsEvent};
use crate::config::Config;

/// Connection pool, configuration and analytics sink for one process.
///
/// Cheap to clone; built once at startup and handed to every component
/// instead of any process-wide lookup.
#[derive(Clone)]
pub struct AppContext {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub analytics: Arc<dyn Analytics>,
}

impl AppContext {
    pub fn new(pool: SqlitePool, config: Arc<Config>, analytics: Arc<dyn Analytics>) -> Self {
        Self {
            pool,
            config,
            analytics,
        }
    }

    /// Tracks `event` for `user_id`, tagged with the current `API_ENV`.
    pub fn track(&self, user_id: &str, event: &str) {
        self.analytics.track(AnalyticsEvent {
            user_id: user_id.to_string(),
            event: event.to_string(),
            properties: json!({ "env": self.config.server.api_env }),
        });
    }
}
