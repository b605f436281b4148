//! Environment-driven configuration.
//!
//! The whole backend is configured through named environment variables.
//! [`Config::load`] reads them once at startup (optionally merged over a
//! TOML overlay file) and the resulting [`Config`] is passed by reference
//! to every component that needs it.
//!
//! A variable that is absent or empty fails the load with
//! [`ConfigError::Missing`], unless its name is in the nullable allow-list.
//! Outside App Engine and outside the `prod`, `qa` and `demo` environments
//! the allow-list additionally tolerates `GCS_UPLOAD_BUCKET` and
//! `PREVIEW_GENERATION_SERVICE_URL`.
//!
//! # Overlay file
//!
//! ```toml
//! [env]
//! PG_HOST = "localhost"
//! PG_DB = "./data/readlater.sqlite"
//! ```
//!
//! Values from the process environment win over the overlay.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Names allowed to be absent or empty. They resolve to `""`.
const NULLABLE_ENV_VARS: &[&str] = &[
    "INTERCOM_TOKEN",
    "INTERCOM_SECRET_KEY",
    "GAE_INSTANCE",
    "SENTRY_DSN",
    "SENTRY_AUTH_TOKEN",
    "SENTRY_ORG",
    "SENTRY_PROJECT",
    "JAEGER_HOST",
    "IMAGE_PROXY_URL",
    "IMAGE_PROXY_SECRET",
    "SAMPLE_METRICS_LOCALLY",
    "PUPPETEER_QUEUE_LOCATION",
    "PUPPETEER_QUEUE_NAME",
    "CONTENT_FETCH_URL",
    "CONTENT_FETCH_GCF_URL",
    "PREVIEW_IMAGE_WRAPPER_ID",
    "PREVIEW_GENERATION_SERVICE_URL",
    "GCS_UPLOAD_SA_KEY_FILE_PATH",
    "GAUTH_IOS_CLIENT_ID",
    "GAUTH_ANDROID_CLIENT_ID",
    "GAUTH_CLIENT_ID",
    "GAUTH_SECRET",
    "SEGMENT_WRITE_KEY",
    "TWITTER_BEARER_TOKEN",
    "GCS_UPLOAD_PRIVATE_BUCKET",
    "SENDER_MESSAGE",
    "SENDER_FEEDBACK",
    "SENDER_GENERAL",
    "SENDGRID_CONFIRMATION_TEMPLATE_ID",
    "SENDGRID_REMINDER_TEMPLATE_ID",
    "SENDGRID_RESET_PASSWORD_TEMPLATE_ID",
    "SENDGRID_INSTALLATION_TEMPLATE_ID",
    "READWISE_API_URL",
    "INTEGRATION_TASK_HANDLER_URL",
    "TEXT_TO_SPEECH_TASK_HANDLER_URL",
    "AZURE_SPEECH_KEY",
    "AZURE_SPEECH_REGION",
    "GCP_LOCATION",
    "RECOMMENDATION_TASK_HANDLER_URL",
    "POCKET_CONSUMER_KEY",
    "THUMBNAIL_TASK_HANDLER_URL",
    "RSS_FEED_TASK_HANDLER_URL",
    "SENDGRID_VERIFICATION_TEMPLATE_ID",
    "REMINDER_TASK_HANDLER_URL",
    "TRUST_PROXY",
    "INTEGRATION_EXPORTER_URL",
    "INTEGRATION_IMPORTER_URL",
    "PUBSUB_VERIFICATION_TOKEN",
    "SERVER_BIND",
];

/// Extra names tolerated on local and dev deployments.
const DEV_NULLABLE_ENV_VARS: &[&str] = &["GCS_UPLOAD_BUCKET", "PREVIEW_GENERATION_SERVICE_URL"];

const STRICT_API_ENVS: &[&str] = &["prod", "qa", "demo"];

const DEFAULT_BIND: &str = "127.0.0.1:4000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing {0} with a non-empty value in process environment")]
    Missing(String),

    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: String, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub pg: PgConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub google: GoogleConfig,
    pub segment: SegmentConfig,
    pub intercom: IntercomConfig,
    pub sentry: SentryConfig,
    pub jaeger: JaegerConfig,
    pub image_proxy: ImageProxyConfig,
    pub twitter: TwitterConfig,
    pub dev: DevConfig,
    pub queue: QueueConfig,
    pub file_upload: FileUploadConfig,
    pub sender: SenderConfig,
    pub sendgrid: SendgridConfig,
    pub readwise: ReadwiseConfig,
    pub azure: AzureConfig,
    pub gcp: GcpConfig,
    pub pocket: PocketConfig,
}

/// Relational store settings.
///
/// `db_name` is the SQLite database file and `pool.max` bounds the
/// connection pool. Host, port and credentials are validated and carried
/// for deployments that front the store with a network service.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub user_name: String,
    pub password: String,
    pub db_name: String,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub sso_jwt_secret: String,
    pub gateway_url: String,
    pub api_env: String,
    pub instance_id: String,
    pub trust_proxy: bool,
    /// Address the HTTP server binds to.
    pub bind: String,
    /// Shared secret expected in the `token` query parameter of service
    /// endpoints. Empty means every service call is rejected.
    pub pubsub_verification_token: String,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    pub preview_generation_service_url: String,
    pub preview_image_wrapper_id: String,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub auth: GoogleAuthConfig,
}

#[derive(Debug, Clone)]
pub struct GoogleAuthConfig {
    pub ios_client_id: String,
    pub android_client_id: String,
    pub client_id: String,
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct SegmentConfig {
    pub write_key: String,
}

#[derive(Debug, Clone)]
pub struct IntercomConfig {
    pub token: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: String,
}

#[derive(Debug, Clone)]
pub struct JaegerConfig {
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct ImageProxyConfig {
    pub url: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct DevConfig {
    pub is_local: bool,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub location: String,
    pub name: String,
    pub content_fetch_url: String,
    pub content_fetch_gcf_url: String,
    pub reminder_task_handler_url: String,
    pub integration_task_handler_url: String,
    pub text_to_speech_task_handler_url: String,
    pub recommendation_task_handler_url: String,
    pub thumbnail_task_handler_url: String,
    pub rss_feed_task_handler_url: String,
    pub integration_exporter_url: String,
    pub integration_importer_url: String,
}

#[derive(Debug, Clone)]
pub struct FileUploadConfig {
    pub gcs_upload_bucket: String,
    pub gcs_upload_sa_key_file_path: String,
    pub gcs_upload_private_bucket: String,
}

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub message: String,
    pub feedback: String,
    pub general: String,
}

#[derive(Debug, Clone)]
pub struct SendgridConfig {
    pub confirmation_template_id: String,
    pub reminder_template_id: String,
    pub reset_password_template_id: String,
    pub installation_template_id: String,
    pub verification_template_id: String,
}

#[derive(Debug, Clone)]
pub struct ReadwiseConfig {
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub speech_key: String,
    pub speech_region: String,
}

#[derive(Debug, Clone)]
pub struct GcpConfig {
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct PocketConfig {
    pub consumer_key: String,
}

/// True when all the App Engine runtime variables are present.
pub fn is_app_engine(vars: &HashMap<String, String>) -> bool {
    ["GOOGLE_CLOUD_PROJECT", "GAE_INSTANCE", "GAE_SERVICE", "GAE_VERSION"]
        .iter()
        .all(|name| vars.contains_key(*name))
}

/// Resolves variable names against a snapshot of the environment.
pub struct EnvParser<'a> {
    vars: &'a HashMap<String, String>,
    nullable: Vec<&'static str>,
}

impl<'a> EnvParser<'a> {
    pub fn new(vars: &'a HashMap<String, String>) -> Self {
        let mut nullable = NULLABLE_ENV_VARS.to_vec();
        let api_env = vars.get("API_ENV").map(String::as_str).unwrap_or("");
        if !is_app_engine(vars) && !STRICT_API_ENVS.contains(&api_env) {
            nullable.extend_from_slice(DEV_NULLABLE_ENV_VARS);
        }
        Self { vars, nullable }
    }

    pub fn is_nullable(&self, name: &str) -> bool {
        self.nullable.contains(&name)
    }

    pub fn parse(&self, name: &str) -> Result<String, ConfigError> {
        match self.vars.get(name) {
            Some(value) if !value.is_empty() => Ok(value.clone()),
            _ if self.is_nullable(name) => Ok(String::new()),
            _ => Err(ConfigError::Missing(name.to_string())),
        }
    }

    fn parse_number<T: FromStr>(&self, name: &str) -> Result<T, ConfigError> {
        let value = self.parse(name)?;
        value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            name: name.to_string(),
            value,
        })
    }

    fn parse_or(&self, name: &str, default: &str) -> Result<String, ConfigError> {
        let value = self.parse(name)?;
        Ok(if value.is_empty() {
            default.to_string()
        } else {
            value
        })
    }
}

#[derive(Debug, Deserialize, Default)]
struct EnvFile {
    #[serde(default)]
    env: HashMap<String, String>,
}

impl Config {
    /// Loads configuration from the process environment, merged over the
    /// `[env]` table of an optional TOML overlay file.
    pub fn load(overlay: Option<&Path>) -> anyhow::Result<Config> {
        let mut vars = match overlay {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };
        vars.extend(unicode_vars(std::env::vars_os()));

        Ok(Config::from_vars(&vars)?)
    }

    /// Builds the configuration from an explicit name → value map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
        let parse = EnvParser::new(vars);

        let pg = PgConfig {
            host: parse.parse("PG_HOST")?,
            port: parse.parse_number("PG_PORT")?,
            user_name: parse.parse("PG_USER")?,
            password: parse.parse("PG_PASSWORD")?,
            db_name: parse.parse("PG_DB")?,
            pool: PoolConfig {
                max: parse.parse_number("PG_POOL_MAX")?,
            },
        };

        let gae_instance = parse.parse("GAE_INSTANCE")?;
        let server = ServerConfig {
            jwt_secret: parse.parse("JWT_SECRET")?,
            sso_jwt_secret: parse.parse("SSO_JWT_SECRET")?,
            gateway_url: parse.parse("GATEWAY_URL")?,
            api_env: parse.parse("API_ENV")?,
            instance_id: if gae_instance.is_empty() {
                local_instance_id(vars)
            } else {
                gae_instance
            },
            trust_proxy: parse.parse("TRUST_PROXY")? == "true",
            bind: parse.parse_or("SERVER_BIND", DEFAULT_BIND)?,
            pubsub_verification_token: parse.parse("PUBSUB_VERIFICATION_TOKEN")?,
        };

        let client = ClientConfig {
            url: parse.parse("CLIENT_URL")?,
            preview_generation_service_url: parse.parse("PREVIEW_GENERATION_SERVICE_URL")?,
            preview_image_wrapper_id: parse.parse("PREVIEW_IMAGE_WRAPPER_ID")?,
        };

        let google = GoogleConfig {
            auth: GoogleAuthConfig {
                ios_client_id: parse.parse("GAUTH_IOS_CLIENT_ID")?,
                android_client_id: parse.parse("GAUTH_ANDROID_CLIENT_ID")?,
                client_id: parse.parse("GAUTH_CLIENT_ID")?,
                secret: parse.parse("GAUTH_SECRET")?,
            },
        };

        let segment = SegmentConfig {
            write_key: parse.parse("SEGMENT_WRITE_KEY")?,
        };
        let intercom = IntercomConfig {
            token: parse.parse("INTERCOM_TOKEN")?,
            secret_key: parse.parse("INTERCOM_SECRET_KEY")?,
        };
        let sentry = SentryConfig {
            dsn: parse.parse("SENTRY_DSN")?,
        };
        let jaeger = JaegerConfig {
            host: parse.parse("JAEGER_HOST")?,
        };
        let dev = DevConfig {
            is_local: !is_app_engine(vars),
        };

        let queue = QueueConfig {
            location: parse.parse("PUPPETEER_QUEUE_LOCATION")?,
            name: parse.parse("PUPPETEER_QUEUE_NAME")?,
            content_fetch_url: parse.parse("CONTENT_FETCH_URL")?,
            content_fetch_gcf_url: parse.parse("CONTENT_FETCH_GCF_URL")?,
            reminder_task_handler_url: parse.parse("REMINDER_TASK_HANDLER_URL")?,
            integration_task_handler_url: parse.parse("INTEGRATION_TASK_HANDLER_URL")?,
            text_to_speech_task_handler_url: parse.parse("TEXT_TO_SPEECH_TASK_HANDLER_URL")?,
            recommendation_task_handler_url: parse.parse("RECOMMENDATION_TASK_HANDLER_URL")?,
            thumbnail_task_handler_url: parse.parse("THUMBNAIL_TASK_HANDLER_URL")?,
            rss_feed_task_handler_url: parse.parse("RSS_FEED_TASK_HANDLER_URL")?,
            integration_exporter_url: parse.parse("INTEGRATION_EXPORTER_URL")?,
            integration_importer_url: parse.parse("INTEGRATION_IMPORTER_URL")?,
        };

        let image_proxy = ImageProxyConfig {
            url: parse.parse("IMAGE_PROXY_URL")?,
            secret_key: parse.parse("IMAGE_PROXY_SECRET")?,
        };
        let twitter = TwitterConfig {
            token: parse.parse("TWITTER_BEARER_TOKEN")?,
        };
        let file_upload = FileUploadConfig {
            gcs_upload_bucket: parse.parse("GCS_UPLOAD_BUCKET")?,
            gcs_upload_sa_key_file_path: parse.parse("GCS_UPLOAD_SA_KEY_FILE_PATH")?,
            gcs_upload_private_bucket: parse.parse("GCS_UPLOAD_PRIVATE_BUCKET")?,
        };
        let sender = SenderConfig {
            message: parse.parse("SENDER_MESSAGE")?,
            feedback: parse.parse("SENDER_FEEDBACK")?,
            general: parse.parse("SENDER_GENERAL")?,
        };
        let sendgrid = SendgridConfig {
            confirmation_template_id: parse.parse("SENDGRID_CONFIRMATION_TEMPLATE_ID")?,
            reminder_template_id: parse.parse("SENDGRID_REMINDER_TEMPLATE_ID")?,
            reset_password_template_id: parse.parse("SENDGRID_RESET_PASSWORD_TEMPLATE_ID")?,
            installation_template_id: parse.parse("SENDGRID_INSTALLATION_TEMPLATE_ID")?,
            verification_template_id: parse.parse("SENDGRID_VERIFICATION_TEMPLATE_ID")?,
        };
        let readwise = ReadwiseConfig {
            api_url: parse.parse("READWISE_API_URL")?,
        };
        let azure = AzureConfig {
            speech_key: parse.parse("AZURE_SPEECH_KEY")?,
            speech_region: parse.parse("AZURE_SPEECH_REGION")?,
        };
        let gcp = GcpConfig {
            location: parse.parse("GCP_LOCATION")?,
        };
        let pocket = PocketConfig {
            consumer_key: parse.parse("POCKET_CONSUMER_KEY")?,
        };

        Ok(Config {
            pg,
            server,
            client,
            google,
            segment,
            intercom,
            sentry,
            jaeger,
            image_proxy,
            twitter,
            dev,
            queue,
            file_upload,
            sender,
            sendgrid,
            readwise,
            azure,
            gcp,
            pocket,
        })
    }
}

fn read_env_file(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;
    let file: EnvFile = toml::from_str(&content).with_context(|| "Failed to parse env file")?;
    Ok(file.env)
}

/// Keeps the entries whose name and value are valid Unicode. Anything else
/// cannot name a variable this loader reads, so it is skipped with a warning.
fn unicode_vars<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (Ok(name), Err(_)) => {
                tracing::warn!(name = %name, "skipping environment variable with non-Unicode value");
                None
            }
            (Err(name), _) => {
                tracing::warn!(name = ?name, "skipping environment variable with non-Unicode name");
                None
            }
        })
        .collect()
}

/// `x{user}_{host}`, used when not running on App Engine.
fn local_instance_id(vars: &HashMap<String, String>) -> String {
    let user = vars
        .get("USER")
        .or_else(|| vars.get("USERNAME"))
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());
    let host = vars
        .get("HOSTNAME")
        .cloned()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
        })
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string());
    format!("x{}_{}", user, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::required_vars;

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_environment_entries_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let bad = || OsString::from_vec(vec![0x66, 0x6f, 0x80]);
        let vars = unicode_vars(vec![
            (OsString::from("PG_HOST"), OsString::from("db.internal")),
            (OsString::from("BROKEN_VALUE"), bad()),
            (bad(), OsString::from("ignored")),
        ]);

        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("PG_HOST").map(String::as_str), Some("db.internal"));
    }

    #[test]
    fn test_required_vars_produce_config() {
        let config = Config::from_vars(&required_vars()).unwrap();
        assert_eq!(config.pg.host, "localhost");
        assert_eq!(config.pg.port, 5432);
        assert_eq!(config.pg.pool.max, 5);
        assert_eq!(config.server.api_env, "test");
        assert_eq!(config.server.instance_id, "xdev_box");
        assert_eq!(config.server.bind, DEFAULT_BIND);
        assert!(!config.server.trust_proxy);
        assert!(config.dev.is_local);
        assert_eq!(config.segment.write_key, "");
    }

    #[test]
    fn test_missing_pg_host_is_named() {
        let mut vars = required_vars();
        vars.remove("PG_HOST");
        let err = Config::from_vars(&vars).unwrap_err();
        assert_eq!(err, ConfigError::Missing("PG_HOST".to_string()));
        assert!(err.to_string().contains("PG_HOST"));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut vars = required_vars();
        vars.insert("JWT_SECRET".to_string(), String::new());
        let err = Config::from_vars(&vars).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET".to_string()));
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = required_vars();
        vars.insert("PG_PORT".to_string(), "five".to_string());
        let err = Config::from_vars(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "PG_PORT"));
    }

    #[test]
    fn test_upload_bucket_required_in_prod() {
        let mut vars = required_vars();
        vars.insert("API_ENV".to_string(), "prod".to_string());
        let err = Config::from_vars(&vars).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GCS_UPLOAD_BUCKET".to_string()));

        vars.insert("GCS_UPLOAD_BUCKET".to_string(), "bucket".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.file_upload.gcs_upload_bucket, "bucket");
        // still in the base allow-list
        assert_eq!(config.client.preview_generation_service_url, "");
    }

    #[test]
    fn test_upload_bucket_required_on_app_engine() {
        let mut vars = required_vars();
        for name in ["GOOGLE_CLOUD_PROJECT", "GAE_INSTANCE", "GAE_SERVICE", "GAE_VERSION"] {
            vars.insert(name.to_string(), "x".to_string());
        }
        let parser = EnvParser::new(&vars);
        assert!(!parser.is_nullable("GCS_UPLOAD_BUCKET"));

        vars.insert("GCS_UPLOAD_BUCKET".to_string(), "bucket".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert!(!config.dev.is_local);
        assert_eq!(config.server.instance_id, "x");
    }

    #[test]
    fn test_trust_proxy_and_bind_overrides() {
        let mut vars = required_vars();
        vars.insert("TRUST_PROXY".to_string(), "true".to_string());
        vars.insert("SERVER_BIND".to_string(), "0.0.0.0:9000".to_string());
        vars.insert("PUBSUB_VERIFICATION_TOKEN".to_string(), "tok".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert!(config.server.trust_proxy);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.pubsub_verification_token, "tok");
    }

    #[test]
    fn test_env_file_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.toml");
        std::fs::write(&path, "[env]\nPG_HOST = \"db.internal\"\nPG_PORT = \"6543\"\n").unwrap();

        let vars = read_env_file(&path).unwrap();
        assert_eq!(vars.get("PG_HOST").map(String::as_str), Some("db.internal"));
        assert_eq!(vars.get("PG_PORT").map(String::as_str), Some("6543"));
    }
}
