use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "AUDIOBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/audiobox.toml";
const ENV_PREFIX: &str = "AUDIOBOX";
const ENV_SEPARATOR: &str = "__";
const FFMPEG_LOCATION_VAR: &str = "FFMPEG_LOCATION";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(path_override: Option<PathBuf>) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = path_override
        .or_else(|| env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_toolchain_overrides(&mut config);

    Ok(config)
}

/// `FFMPEG_LOCATION` is honored for compatibility with existing deployments
/// and wins over the config file.
fn load_toolchain_overrides(config: &mut Config) {
    if let Ok(location) = env::var(FFMPEG_LOCATION_VAR) {
        if !location.trim().is_empty() {
            config.extractor.ffmpeg_location = Some(PathBuf::from(location));
        }
    }
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // AUDIOBOX__WORKER__POOL_SIZE -> worker.pool_size
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
