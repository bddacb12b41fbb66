use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// JWT Secret Key (Required in production)
    pub jwt_secret: String,

    /// Lifetime of issued access tokens in hours (default: 24)
    pub token_ttl_hours: i64,

    /// Maximum decoded recipe image size in bytes (default: 10 MB)
    pub max_image_size: usize,

    /// Filesystem root for the local storage backend (default: "media")
    pub media_root: String,

    /// Public URL prefix stored image keys are served under (default: "/media/")
    pub media_url: String,

    /// Default page size for paginated listings (default: 6)
    pub page_size: u64,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

/// Hard cap for the `limit` query parameter.
pub const MAX_PAGE_SIZE: u64 = 100;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "secret".to_string(),
            token_ttl_hours: 24,
            max_image_size: 10 * 1024 * 1024, // 10 MB
            media_root: "media".to_string(),
            media_url: "/media/".to_string(),
            page_size: 6,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            token_ttl_hours: env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.token_ttl_hours),

            max_image_size: env::var("MAX_IMAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_image_size),

            media_root: env::var("MEDIA_ROOT").unwrap_or(default.media_root),

            media_url: env::var("MEDIA_URL")
                .map(normalize_media_url)
                .unwrap_or(default.media_url),

            page_size: env::var("PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .map(|v: u64| v.min(MAX_PAGE_SIZE))
                .unwrap_or(default.page_size),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (relaxed limits, fixed secret)
    pub fn development() -> Self {
        Self {
            max_image_size: 20 * 1024 * 1024,
            allowed_origins: vec!["*".to_string()],
            ..Self::default()
        }
    }

    /// Create config for production (strict security)
    pub fn production() -> Self {
        let from_env = Self::from_env();
        Self {
            jwt_secret: env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set"),
            ..from_env
        }
    }

    /// Public URL of a stored object key.
    pub fn media_url_for(&self, key: &str) -> String {
        format!("{}{}", self.media_url, key)
    }
}

fn normalize_media_url(url: String) -> String {
    if url.ends_with('/') { url } else { format!("{}/", url) }
}
