//! Shared setup for the integration tests: a migrated SQLite database in a
//! temp dir and, optionally, the HTTP server on an ephemeral port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

use readlater::analytics::MemoryAnalytics;
use readlater::config::Config;
use readlater::context::AppContext;
use readlater::{db, migrate, server};

pub const TOKEN: &str = "s3cret";

pub fn vars(db_path: &str) -> HashMap<String, String> {
    [
        ("PG_HOST", "localhost"),
        ("PG_PORT", "5432"),
        ("PG_USER", "app_user"),
        ("PG_PASSWORD", "secret"),
        ("PG_DB", db_path),
        ("PG_POOL_MAX", "4"),
        ("JWT_SECRET", "jwt"),
        ("SSO_JWT_SECRET", "sso"),
        ("GATEWAY_URL", "http://localhost:8080/api"),
        ("API_ENV", "test"),
        ("CLIENT_URL", "http://localhost:3000"),
        ("USER", "dev"),
        ("HOSTNAME", "box"),
        ("PUBSUB_VERIFICATION_TOKEN", TOKEN),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub struct Harness {
    pub ctx: AppContext,
    pub analytics: Arc<MemoryAnalytics>,
    _tmp: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("data").join("readlater.sqlite");
        let config = Config::from_vars(&vars(&db_path.display().to_string())).unwrap();

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

    /// Serves the router on 127.0.0.1:0 and returns its base url.
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = server::build_router(self.ctx.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}
