use std::env;

/// Image normalization parameters for the client-upload pipeline.
#[derive(Debug, Clone)]
pub struct NormalizeSettings {
    /// Maximum output width in pixels (default: 2000)
    pub max_width: u32,

    /// Maximum output height in pixels (default: 2000)
    pub max_height: u32,

    /// Initial JPEG quality, 0.0..=1.0 (default: 0.9)
    pub start_quality: f32,

    /// Quality floor the re-encode loop will not go below (default: 0.4)
    pub floor_quality: f32,

    /// Target output size in bytes (default: 600 KB)
    pub target_bytes: usize,

    /// Preferred output format: "webp" or "jpeg" (default: "jpeg")
    pub preferred_format: String,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            max_width: 2000,
            max_height: 2000,
            start_quality: 0.9,
            floor_quality: 0.4,
            target_bytes: 600 * 1024,
            preferred_format: "jpeg".to_string(),
        }
    }
}

/// Application configuration, loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the hosted backend (identity + store + storage)
    pub service_url: String,

    /// Publishable API key sent with every collaborator request
    pub anon_key: String,

    /// Service-role key used by the store client (server-trusted)
    pub service_key: String,

    /// Collaborator mode: "hosted" or "memory" (default: "hosted")
    pub collaborators: String,

    /// World-readable bucket holding republished share images
    pub public_bucket: String,

    /// Private bucket holding entry and pair media
    pub private_bucket: String,

    /// Hard ceiling on accepted upload size in bytes (default: 25 MB)
    pub max_upload_size: usize,

    /// Signed-URL validity for feed/detail rendering (default: 7 days)
    pub signed_url_ttl_secs: u32,

    /// Signed-URL validity for active-editing contexts (default: 1 hour)
    pub edit_signed_url_ttl_secs: u32,

    /// Community feed page size (default: 24)
    pub page_size: usize,

    /// Per-source row limit for each feed query (default: 24)
    pub per_source_limit: usize,

    /// Origin used when building shareable page links
    pub site_origin: String,

    /// Allowed CORS origins (comma separated)
    pub allowed_origins: Vec<String>,

    pub normalize: NormalizeSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            service_key: String::new(),
            collaborators: "hosted".to_string(),
            public_bucket: "community".to_string(),
            private_bucket: "media".to_string(),
            max_upload_size: 25 * 1024 * 1024,
            signed_url_ttl_secs: 60 * 60 * 24 * 7,
            edit_signed_url_ttl_secs: 60 * 60,
            page_size: 24,
            per_source_limit: 24,
            site_origin: "http://localhost:5173".to_string(),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            normalize: NormalizeSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            service_url: env::var("VAULT_SERVICE_URL").unwrap_or(default.service_url),
            anon_key: env::var("VAULT_ANON_KEY").unwrap_or(default.anon_key),
            service_key: env::var("VAULT_SERVICE_KEY").unwrap_or(default.service_key),
            collaborators: env::var("COLLABORATORS").unwrap_or(default.collaborators),
            public_bucket: env::var("PUBLIC_BUCKET").unwrap_or(default.public_bucket),
            private_bucket: env::var("PRIVATE_BUCKET").unwrap_or(default.private_bucket),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            signed_url_ttl_secs: env::var("SIGNED_URL_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.signed_url_ttl_secs),

            edit_signed_url_ttl_secs: env::var("EDIT_SIGNED_URL_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.edit_signed_url_ttl_secs),

            page_size: env::var("FEED_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.page_size),

            per_source_limit: env::var("FEED_PER_SOURCE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.per_source_limit),

            site_origin: env::var("SITE_ORIGIN").unwrap_or(default.site_origin),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),

            normalize: NormalizeSettings {
                max_width: env::var("NORMALIZE_MAX_WIDTH")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.normalize.max_width),
                max_height: env::var("NORMALIZE_MAX_HEIGHT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.normalize.max_height),
                start_quality: env::var("NORMALIZE_START_QUALITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.normalize.start_quality),
                floor_quality: env::var("NORMALIZE_FLOOR_QUALITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.normalize.floor_quality),
                target_bytes: env::var("NORMALIZE_TARGET_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.normalize.target_bytes),
                preferred_format: env::var("NORMALIZE_FORMAT")
                    .unwrap_or(default.normalize.preferred_format),
            },
        }
    }

    /// Config for development and tests: in-memory collaborators, small limits.
    pub fn development() -> Self {
        Self {
            collaborators: "memory".to_string(),
            max_upload_size: 25 * 1024 * 1024,
            ..Self::default()
        }
    }
}
