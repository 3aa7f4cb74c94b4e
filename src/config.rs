use crate::engines;
use crate::retry::RetryPolicy;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "odometer-ocr-server")]
#[command(about = "Reads kilometre values from odometer photos")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "ODO_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "ODO_PORT", default_value = "9393")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 10MB)
    #[arg(long, env = "ODO_MAX_FILE_SIZE", default_value = "10485760")]
    pub max_file_size: usize,

    /// Recognition engine: ocrs, tesseract or none
    #[arg(long, env = "ODO_ENGINE", default_value = engines::DEFAULT_ENGINE)]
    pub engine: String,

    /// Path to tessdata directory (downloaded to the cache dir if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<PathBuf>,

    /// Attempts at loading the engine before giving up
    #[arg(long, env = "ODO_ENGINE_INIT_ATTEMPTS", default_value = "3")]
    pub engine_init_attempts: u32,

    /// Delay before the first engine load retry, in milliseconds
    #[arg(long, env = "ODO_ENGINE_INIT_DELAY_MS", default_value = "2000")]
    pub engine_init_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    /// Engine to load at startup (`ocrs`, `tesseract` or `none`)
    pub engine: String,
    pub tessdata_path: Option<PathBuf>,
    pub engine_init_attempts: u32,
    pub engine_init_delay: Duration,
}

impl Config {
    /// Retry policy for engine bootstrap (model downloads can be flaky)
    pub fn engine_init_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.engine_init_attempts.max(1),
            initial_delay: self.engine_init_delay,
            ..RetryPolicy::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9393,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            engine: engines::DEFAULT_ENGINE.to_string(),
            tessdata_path: None,
            engine_init_attempts: 3,
            engine_init_delay: Duration::from_secs(2),
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            engine: args.engine.to_lowercase(),
            tessdata_path: args.tessdata_path,
            engine_init_attempts: args.engine_init_attempts,
            engine_init_delay: Duration::from_millis(args.engine_init_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_convert_to_config() {
        let args = Args::parse_from([
            "odometer-ocr-server",
            "--port",
            "8080",
            "--engine",
            "NONE",
            "--engine-init-attempts",
            "0",
            "--engine-init-delay-ms",
            "250",
        ]);
        let config = Config::from(args);

        assert_eq!(config.port, 8080);
        assert_eq!(config.engine, "none");
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);

        let policy = config.engine_init_policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
    }
}
