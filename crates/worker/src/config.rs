use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tradecard_core::cache::{CacheLimits, DEFAULT_MAX_CACHE_FILES, DEFAULT_MAX_CACHE_SIZE_MB};
use tradecard_core::queue::DEFAULT_MAX_CONCURRENCY;
use tradecard_pipeline::raster::DEFAULT_DENSITY;
use tradecard_sources::items::DEFAULT_ITEMS_CACHE_PATH;

/// Configuration errors detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults suitable for a single-job render worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3001`).
    pub port: u16,
    /// Allowed CORS origins. `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// Resident memory ceiling in MiB (default: `400`).
    pub ram_limit_mb: u64,
    /// Jobs admitted at once; further requests are rejected (default: `1`).
    pub max_jobs: usize,
    /// Jobs rendering at once; admitted jobs beyond this wait (default: `1`).
    pub queue_concurrency: usize,
    pub image_cache_dir: PathBuf,
    pub max_cache_files: usize,
    pub max_cache_size_mb: u64,
    pub items_cache_path: PathBuf,
    /// SVG template override. `None` uses the built-in template.
    pub template_path: Option<PathBuf>,
    pub http_timeout_secs: u64,
    /// Rasterization density in dpi (default: `150`).
    pub render_density: f32,
    pub memory_check_interval_secs: u64,
    /// Delay between scheduling a restart and exiting (default: `2000`).
    pub restart_grace_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            cors_origins: vec!["*".into()],
            ram_limit_mb: 400,
            max_jobs: 1,
            queue_concurrency: DEFAULT_MAX_CONCURRENCY,
            image_cache_dir: PathBuf::from("./image-cache"),
            max_cache_files: DEFAULT_MAX_CACHE_FILES,
            max_cache_size_mb: DEFAULT_MAX_CACHE_SIZE_MB,
            items_cache_path: PathBuf::from(DEFAULT_ITEMS_CACHE_PATH),
            template_path: None,
            http_timeout_secs: 10,
            render_density: DEFAULT_DENSITY,
            memory_check_interval_secs: 60,
            restart_grace_ms: 2000,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default         |
    /// |------------------------------|-----------------|
    /// | `HOST`                       | `0.0.0.0`       |
    /// | `PORT`                       | `3001`          |
    /// | `CORS_ORIGINS`               | `*`             |
    /// | `RAM_LIMIT_MB`               | `400`           |
    /// | `MAX_JOBS`                   | `1`             |
    /// | `QUEUE_CONCURRENCY`          | `1`             |
    /// | `IMAGE_CACHE_DIR`            | `./image-cache` |
    /// | `MAX_CACHE_FILES`            | `1000`          |
    /// | `MAX_CACHE_SIZE_MB`          | `50`            |
    /// | `ITEMS_CACHE_PATH`           | `./items.json`  |
    /// | `TEMPLATE_PATH`              | built-in        |
    /// | `HTTP_TIMEOUT_SECS`          | `10`            |
    /// | `RENDER_DENSITY`             | `150`           |
    /// | `MEMORY_CHECK_INTERVAL_SECS` | `60`            |
    /// | `RESTART_GRACE_MS`           | `2000`          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let cors_origins = match get("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        let config = Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_var(&get, "PORT", defaults.port)?,
            cors_origins,
            ram_limit_mb: parse_var(&get, "RAM_LIMIT_MB", defaults.ram_limit_mb)?,
            max_jobs: parse_var(&get, "MAX_JOBS", defaults.max_jobs)?,
            queue_concurrency: parse_var(&get, "QUEUE_CONCURRENCY", defaults.queue_concurrency)?,
            image_cache_dir: get("IMAGE_CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.image_cache_dir),
            max_cache_files: parse_var(&get, "MAX_CACHE_FILES", defaults.max_cache_files)?,
            max_cache_size_mb: parse_var(&get, "MAX_CACHE_SIZE_MB", defaults.max_cache_size_mb)?,
            items_cache_path: get("ITEMS_CACHE_PATH").map(PathBuf::from).unwrap_or(defaults.items_cache_path),
            template_path: get("TEMPLATE_PATH").map(PathBuf::from),
            http_timeout_secs: parse_var(&get, "HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
            render_density: parse_var(&get, "RENDER_DENSITY", defaults.render_density)?,
            memory_check_interval_secs: parse_var(
                &get,
                "MEMORY_CHECK_INTERVAL_SECS",
                defaults.memory_check_interval_secs,
            )?,
            restart_grace_ms: parse_var(&get, "RESTART_GRACE_MS", defaults.restart_grace_ms)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make the worker unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("RAM_LIMIT_MB", self.ram_limit_mb == 0),
            ("MAX_JOBS", self.max_jobs == 0),
            ("QUEUE_CONCURRENCY", self.queue_concurrency == 0),
            ("MAX_CACHE_FILES", self.max_cache_files == 0),
            ("MAX_CACHE_SIZE_MB", self.max_cache_size_mb == 0),
            ("HTTP_TIMEOUT_SECS", self.http_timeout_secs == 0),
            ("MEMORY_CHECK_INTERVAL_SECS", self.memory_check_interval_secs == 0),
            ("RENDER_DENSITY", self.render_density <= 0.0),
        ];
        match checks.into_iter().find(|(_, zero)| *zero) {
            Some((var, _)) => Err(ConfigError::Zero(var)),
            None => Ok(()),
        }
    }

    pub fn cache_limits(&self) -> CacheLimits {
        CacheLimits::new(self.max_cache_files, self.max_cache_size_mb)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn memory_check_interval(&self) -> Duration {
        Duration::from_secs(self.memory_check_interval_secs)
    }

    pub fn restart_grace(&self) -> Duration {
        Duration::from_millis(self.restart_grace_ms)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_var<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.ram_limit_mb, 400);
        assert_eq!(config.max_jobs, 1);
        assert_eq!(config.queue_concurrency, 1);
        assert!(config.allows_any_origin());
        assert!(config.template_path.is_none());
        assert_eq!(config.restart_grace(), Duration::from_secs(2));
        assert_eq!(config.cache_limits(), CacheLimits::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("PORT", "8080"),
            ("RAM_LIMIT_MB", "512"),
            ("MAX_JOBS", "2"),
            ("CORS_ORIGINS", "https://a.test, https://b.test,"),
            ("TEMPLATE_PATH", "/etc/card.svg"),
            ("RENDER_DENSITY", "300"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.ram_limit_mb, 512);
        assert_eq!(config.max_jobs, 2);
        assert_eq!(config.cors_origins, vec!["https://a.test", "https://b.test"]);
        assert!(!config.allows_any_origin());
        assert_eq!(config.template_path, Some(PathBuf::from("/etc/card.svg")));
        assert_eq!(config.render_density, 300.0);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("PORT", "  "), ("HOST", "")]).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn unparsable_value_names_the_variable() {
        let err = load(&[("RAM_LIMIT_MB", "lots")]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "RAM_LIMIT_MB", .. });
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert_matches!(load(&[("MAX_JOBS", "0")]), Err(ConfigError::Zero("MAX_JOBS")));
        assert_matches!(
            load(&[("MAX_CACHE_SIZE_MB", "0")]),
            Err(ConfigError::Zero("MAX_CACHE_SIZE_MB"))
        );
    }
}
