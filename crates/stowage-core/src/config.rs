//! Configuration module
//!
//! Process-level configuration read once at startup. Values operators change at
//! runtime (link lifetimes, the document preview template) live in
//! [`crate::settings`] instead.

use std::env;

const DEFAULT_PORT: u16 = 3000;
const UPLOAD_TIMEOUT_SECS: u64 = 3600;
const SESSION_SHARD_COUNT: usize = 16;
const SESSION_MAX_ENTRIES_PER_SHARD: usize = 10_000;
const MIN_SECRET_LEN: usize = 32;
const DEVELOPMENT_SECRET: &str = "stowage-development-signing-secret-change-me";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    /// Public base URL used when building signed and session links.
    pub site_url: String,
    pub signing_secret: String,
    pub local_storage_path: String,
    /// Directory holding prepared archives referenced by `archive_` sessions.
    pub archive_temp_path: String,
    pub upload_timeout_secs: u64,
    pub session_shard_count: usize,
    pub session_max_entries_per_shard: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            site_url: format!("http://localhost:{}", DEFAULT_PORT),
            signing_secret: DEVELOPMENT_SECRET.to_string(),
            local_storage_path: "./data/uploads".to_string(),
            archive_temp_path: "./data/archives".to_string(),
            upload_timeout_secs: UPLOAD_TIMEOUT_SECS,
            session_shard_count: SESSION_SHARD_COUNT,
            session_max_entries_per_shard: SESSION_MAX_ENTRIES_PER_SHARD,
        }
    }
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let signing_secret = match env::var("SIGNING_SECRET") {
            Ok(secret) => secret,
            Err(_) if is_production => {
                return Err(anyhow::anyhow!(
                    "SIGNING_SECRET must be set in production"
                ))
            }
            Err(_) => {
                tracing::warn!("SIGNING_SECRET not set, using the development secret");
                DEVELOPMENT_SECRET.to_string()
            }
        };

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let config = Config {
            server_port,
            site_url: env::var("SITE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", server_port))
                .trim_end_matches('/')
                .to_string(),
            environment,
            cors_origins,
            signing_secret,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "./data/uploads".to_string()),
            archive_temp_path: env::var("ARCHIVE_TEMP_PATH")
                .unwrap_or_else(|_| "./data/archives".to_string()),
            upload_timeout_secs: env::var("UPLOAD_TIMEOUT_SECS")
                .unwrap_or_else(|_| UPLOAD_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(UPLOAD_TIMEOUT_SECS),
            session_shard_count: env::var("SESSION_SHARD_COUNT")
                .unwrap_or_else(|_| SESSION_SHARD_COUNT.to_string())
                .parse()
                .unwrap_or(SESSION_SHARD_COUNT),
            session_max_entries_per_shard: env::var("SESSION_MAX_ENTRIES_PER_SHARD")
                .unwrap_or_else(|_| SESSION_MAX_ENTRIES_PER_SHARD.to_string())
                .parse()
                .unwrap_or(SESSION_MAX_ENTRIES_PER_SHARD),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.signing_secret.len() < MIN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "SIGNING_SECRET must be at least {} characters long",
                MIN_SECRET_LEN
            ));
        }

        if self.is_production() && self.signing_secret == DEVELOPMENT_SECRET {
            return Err(anyhow::anyhow!(
                "SIGNING_SECRET cannot be the development secret in production"
            ));
        }

        if !(self.site_url.starts_with("http://") || self.site_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "SITE_URL must be an absolute http(s) URL"
            ));
        }

        if self.session_shard_count == 0 {
            return Err(anyhow::anyhow!("SESSION_SHARD_COUNT must be greater than 0"));
        }

        if self.upload_timeout_secs == 0 {
            return Err(anyhow::anyhow!("UPLOAD_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }

    pub fn upload_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.upload_timeout_secs)
    }
}
