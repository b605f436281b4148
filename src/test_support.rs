//! Fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

use crate::analytics::MemoryAnalytics;
use crate::config::Config;
use crate::context::AppContext;
use crate::models::User;
use crate::{db, migrate, users};

pub(crate) fn required_vars() -> HashMap<String, String> {
    [
        ("PG_HOST", "localhost"),
        ("PG_PORT", "5432"),
        ("PG_USER", "app_user"),
        ("PG_PASSWORD", "secret"),
        ("PG_DB", "readlater.sqlite"),
        ("PG_POOL_MAX", "5"),
        ("JWT_SECRET", "jwt"),
        ("SSO_JWT_SECRET", "sso"),
        ("GATEWAY_URL", "http://localhost:8080/api"),
        ("API_ENV", "test"),
        ("CLIENT_URL", "http://localhost:3000"),
        ("USER", "dev"),
        ("HOSTNAME", "box"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub(crate) struct TestApp {
    pub ctx: AppContext,
    pub analytics: Arc<MemoryAnalytics>,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let mut vars = required_vars();
        vars.insert(
            "PG_DB".to_string(),
            tmp.path().join("test.sqlite").display().to_string(),
        );
        vars.insert("PUBSUB_VERIFICATION_TOKEN".to_string(), "s3cret".to_string());
        let config = Config::from_vars(&vars).unwrap();

        let pool = db::connect(&config.pg).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();

        let analytics = Arc::new(MemoryAnalytics::new());
        let ctx = AppContext::new(pool, Arc::new(config), analytics.clone());
        Self {
            ctx,
            analytics,
            _tmp: tmp,
        }
    }

    pub async fn user(&self, username: &str) -> User {
        users::ensure_user(&self.ctx.pool, username, username)
            .await
            .unwrap()
    }
}
