use super::models::Config;
use thiserror::Error;

/// Upper bound on concurrent extractions; each one is a yt-dlp + ffmpeg pair
pub const MAX_POOL_SIZE: usize = 64;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("worker.pool_size must be between 1 and {max}, got {actual}")]
    InvalidPoolSize { actual: usize, max: usize },

    #[error("server.downloads_dir must not be empty")]
    EmptyDownloadsDir,

    #[error("server.max_body_bytes must be positive")]
    InvalidBodyLimit,

    #[error("Retention duration must be positive: {field}")]
    InvalidRetentionDuration { field: String },

    #[error("extractor.{field} must not be empty")]
    EmptyExtractorField { field: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_worker(config)?;
    validate_extractor(config)?;
    validate_retention(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.downloads_dir.as_os_str().is_empty() {
        return Err(ValidationError::EmptyDownloadsDir);
    }

    if config.server.max_body_bytes.as_u64() == 0 {
        return Err(ValidationError::InvalidBodyLimit);
    }

    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    let pool_size = config.worker.pool_size;
    if !(1..=MAX_POOL_SIZE).contains(&pool_size) {
        return Err(ValidationError::InvalidPoolSize {
            actual: pool_size,
            max: MAX_POOL_SIZE,
        });
    }
    Ok(())
}

fn validate_extractor(config: &Config) -> Result<(), ValidationError> {
    for (field, value) in [
        ("audio_format", &config.extractor.audio_format),
        ("audio_quality", &config.extractor.audio_quality),
    ] {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyExtractorField {
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_retention(config: &Config) -> Result<(), ValidationError> {
    if config.retention.prune_interval.is_zero() {
        return Err(ValidationError::InvalidRetentionDuration {
            field: "prune_interval".to_string(),
        });
    }

    if config.retention.task_ttl.is_some_and(|ttl| ttl.is_zero()) {
        return Err(ValidationError::InvalidRetentionDuration {
            field: "task_ttl".to_string(),
        });
    }

    Ok(())
}
