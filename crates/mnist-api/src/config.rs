//! API configuration.

use std::path::{Path, PathBuf};

/// Model artifact location relative to the executable's directory.
pub const DEFAULT_MODEL_PATH: &str = "Best_Model/model.onnx";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "app_logs.log";

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Model artifact path
    pub model_path: PathBuf,
    /// Log file path
    pub log_file: PathBuf,
    /// Log file size that triggers rotation
    pub log_max_bytes: usize,
    /// Number of rotated log files kept
    pub log_backup_count: usize,
    /// Emit JSON lines on the console
    pub log_json: bool,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    /// Serve Prometheus metrics at /metrics
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_path: resolve_model_path(None),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            log_max_bytes: 1024 * 1024, // 1MB
            log_backup_count: 3,
            log_json: false,
            cors_origins: vec!["*".to_string()],
            max_body_size: 10 * 1024 * 1024, // 10MB
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            host: lookup("API_HOST").unwrap_or(defaults.host),
            port: lookup("API_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            model_path: resolve_model_path(lookup("MODEL_PATH").as_deref()),
            log_file: lookup("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
            log_max_bytes: lookup("LOG_MAX_BYTES")
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.log_max_bytes),
            log_backup_count: lookup("LOG_BACKUP_COUNT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.log_backup_count),
            log_json: lookup("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(defaults.log_json),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: lookup("MAX_BODY_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            metrics_enabled: lookup("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Address the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Directory containing the running executable, or the working directory if
/// it cannot be determined.
pub fn base_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve the model path against the executable's directory.
///
/// Absolute overrides are used as given.
pub fn resolve_model_path(override_path: Option<&str>) -> PathBuf {
    resolve_against(&base_dir(), override_path.unwrap_or(DEFAULT_MODEL_PATH))
}

fn resolve_against(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
