//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Account service base URL (login, session resources).
    pub acc_api_url: Url,

    /// Business platform service base URL (management trees).
    pub bpc_api_url: Url,

    /// File resource service base URL (annex uploads).
    pub frc_api_url: Url,

    /// Public base path the console is mounted under (default: "/").
    pub base_path: String,

    /// Fixed timeout applied to every upstream request (default: 5000 ms).
    pub request_timeout: Duration,

    /// Redis URL for the session store. When None, sessions live in memory.
    pub redis_url: Option<String>,

    /// Session inactivity expiry in minutes (default: 30).
    pub session_expiry_minutes: i64,

    /// Cookie SameSite policy: "strict", "lax", or "none" (default: "strict").
    pub cookie_same_site: String,

    /// Mark the session cookie Secure (default: true).
    pub cookie_secure: bool,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Maximum number of files per upload tray (default: 5).
    pub upload_max_files: usize,

    /// Maximum combined upload size in megabytes (default: 10).
    pub upload_max_total_mb: u64,

    /// Directory of Tera templates overriding the embedded set.
    pub template_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let acc_api_url = env::var("ACC_API_URL")
            .context("ACC_API_URL environment variable is required")
            .and_then(|v| parse_base_url(&v).context("ACC_API_URL must be a valid URL"))?;

        let bpc_api_url = match env::var("BPC_API_URL") {
            Ok(v) => parse_base_url(&v).context("BPC_API_URL must be a valid URL")?,
            Err(_) => acc_api_url.clone(),
        };

        let frc_api_url = match env::var("FRC_API_URL") {
            Ok(v) => parse_base_url(&v).context("FRC_API_URL must be a valid URL")?,
            Err(_) => acc_api_url.clone(),
        };

        let base_path = env::var("BASE_PATH").unwrap_or_else(|_| "/".to_string());

        let request_timeout_ms: u64 = env::var("REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .context("REQUEST_TIMEOUT_MS must be a valid u64")?;

        let redis_url = env::var("REDIS_URL").ok().filter(|v| !v.is_empty());

        let session_expiry_minutes = env::var("SESSION_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("SESSION_EXPIRY_MINUTES must be a valid i64")?;

        let cookie_same_site = env::var("COOKIE_SAME_SITE")
            .unwrap_or_else(|_| "strict".to_string())
            .to_lowercase();

        let cookie_secure = env::var("COOKIE_SECURE")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let upload_max_files = env::var("UPLOAD_MAX_FILES")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("UPLOAD_MAX_FILES must be a valid usize")?;

        let upload_max_total_mb = env::var("UPLOAD_MAX_TOTAL_MB")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("UPLOAD_MAX_TOTAL_MB must be a valid u64")?;

        let template_dir = env::var("TEMPLATE_DIR")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            port,
            acc_api_url,
            bpc_api_url,
            frc_api_url,
            base_path,
            request_timeout: Duration::from_millis(request_timeout_ms),
            redis_url,
            session_expiry_minutes,
            cookie_same_site,
            cookie_secure,
            cors_allowed_origins,
            upload_max_files,
            upload_max_total_mb,
            template_dir,
        })
    }

    /// Configuration pointing every upstream at one base URL.
    ///
    /// Used by tests and local tooling that do not read the environment.
    pub fn for_upstream(base: &str) -> Result<Self> {
        let url = parse_base_url(base).context("invalid upstream base URL")?;
        Ok(Self {
            port: 0,
            acc_api_url: url.clone(),
            bpc_api_url: url.clone(),
            frc_api_url: url,
            base_path: "/".to_string(),
            request_timeout: Duration::from_millis(5000),
            redis_url: None,
            session_expiry_minutes: 30,
            cookie_same_site: "strict".to_string(),
            cookie_secure: false,
            cors_allowed_origins: vec!["*".to_string()],
            upload_max_files: 5,
            upload_max_total_mb: 10,
            template_dir: None,
        })
    }

    /// How long an unused console context is kept in memory.
    pub fn context_idle(&self) -> Duration {
        let minutes = u64::try_from(self.session_expiry_minutes).unwrap_or(0).max(1);
        Duration::from_secs(minutes * 60)
    }

    /// Upload size ceiling in bytes.
    pub fn upload_max_total_bytes(&self) -> u64 {
        self.upload_max_total_mb * 1024 * 1024
    }
}

/// Parse a base URL, ensuring a trailing slash so `Url::join` appends
/// rather than replacing the last path segment.
fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&normalized).with_context(|| format!("cannot parse '{trimmed}'"))
}
