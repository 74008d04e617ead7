use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub signage_env: String,
    pub api_bind: String,
    pub middleware: MiddlewareSettings,
    pub cache_ttl_secs: u64,
    pub push_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiddlewareSettings {
    pub host: String,
    pub path: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl MiddlewareSettings {
    /// Base url every middleware route is appended to.
    pub fn base_url(&self) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), self.path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let database_url =
            std::env::var("DATABASE_URL").or_else(|_| std::env::var("SIGNAGE_DATABASE_URL"))?;
        let redis_url = std::env::var("REDIS_URL")
            .or_else(|_| std::env::var("SIGNAGE_REDIS_URL"))
            .ok();
        let signage_env = std::env::var("SIGNAGE_ENV").unwrap_or_else(|_| "dev".to_string());
        let api_bind =
            std::env::var("SIGNAGE_API_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let cache_ttl_secs = std::env::var("SIGNAGE_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        let push_interval_secs = std::env::var("SIGNAGE_PUSH_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let middleware = MiddlewareSettings {
            host: std::env::var("MIDDLEWARE_HOST")?,
            path: std::env::var("MIDDLEWARE_PATH").unwrap_or_else(|_| "/api".to_string()),
            api_key: std::env::var("MIDDLEWARE_APIKEY")?,
            timeout_secs: std::env::var("MIDDLEWARE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        };

        Ok(Self {
            database_url,
            redis_url,
            signage_env,
            api_bind,
            middleware,
            cache_ttl_secs,
            push_interval_secs,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_secs(self.push_interval_secs)
    }
}
