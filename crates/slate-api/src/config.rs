//! API configuration.

use slate_models::{DEFAULT_CACHE_TTL_SECS, MAX_CACHE_TTL_SECS};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Schedule views change with every edit, so they live far shorter than plans.
const DEFAULT_VIEW_TTL_SECS: u64 = 60 * 60;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// HS256 secret for bearer tokens; unset rejects every authenticated call
    pub jwt_secret: Option<String>,
    /// Expected `aud` claim, if any
    pub jwt_audience: Option<String>,
    pub cache: CacheConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            max_body_size: 10 * 1024 * 1024, // 10MB
            environment: "development".to_string(),
            jwt_secret: None,
            jwt_audience: None,
            cache: CacheConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            jwt_secret: std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            jwt_audience: std::env::var("JWT_AUDIENCE").ok().filter(|s| !s.is_empty()),
            cache: CacheConfig::from_env(),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

/// Lifetimes of cached AI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL of cached schedule plans, in seconds
    pub schedule_ttl_secs: u64,
    /// TTL of cached schedule views, in seconds
    pub view_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            schedule_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            view_ttl_secs: DEFAULT_VIEW_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let days: Option<u64> = env_parse("SCHEDULE_CACHE_TTL_DAYS");
        Self {
            schedule_ttl_secs: days
                .filter(|d| *d > 0)
                .map(|d| d.saturating_mul(SECS_PER_DAY).min(MAX_CACHE_TTL_SECS))
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
            view_ttl_secs: env_parse::<u64>("SCHEDULE_VIEW_CACHE_TTL_SECS")
                .filter(|s| *s > 0)
                .map(|s| s.min(MAX_CACHE_TTL_SECS))
                .unwrap_or(DEFAULT_VIEW_TTL_SECS),
        }
    }
}
