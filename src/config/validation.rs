use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("downloader.executable must not be empty")]
    EmptyExecutable,

    #[error("Timeout must be positive: {field} = 0")]
    ZeroTimeout { field: &'static str },

    #[error("workers.max_concurrent_jobs must be at least 1")]
    NoWorkers,

    #[error("workers.queue_capacity must be at least 1")]
    NoQueueCapacity,

    #[error("cache.max_entries must be at least 1")]
    NoCacheCapacity,

    #[error("progress.poll_interval_ms must be positive")]
    ZeroPollInterval,

    #[error("server.max_payload_bytes must be positive")]
    ZeroPayloadLimit,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_downloader(config)?;
    validate_workers(config)?;

    if config.cache.max_entries == 0 {
        return Err(ValidationError::NoCacheCapacity);
    }
    if config.progress.poll_interval_ms == 0 {
        return Err(ValidationError::ZeroPollInterval);
    }
    if config.server.max_payload_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroPayloadLimit);
    }
    Ok(())
}

fn validate_downloader(config: &Config) -> Result<(), ValidationError> {
    let downloader = &config.downloader;
    if downloader.executable.trim().is_empty() {
        return Err(ValidationError::EmptyExecutable);
    }

    let timeouts = [
        ("downloader.describe_timeout_secs", downloader.describe_timeout_secs),
        ("downloader.fetch_timeout_secs", downloader.fetch_timeout_secs),
        ("downloader.health_timeout_secs", downloader.health_timeout_secs),
    ];
    if let Some((field, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
        return Err(ValidationError::ZeroTimeout { field });
    }
    Ok(())
}

fn validate_workers(config: &Config) -> Result<(), ValidationError> {
    if config.workers.max_concurrent_jobs == 0 {
        return Err(ValidationError::NoWorkers);
    }
    if config.workers.queue_capacity == 0 {
        return Err(ValidationError::NoQueueCapacity);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_empty_executable() {
        let mut config = Config::default();
        config.downloader.executable = "  ".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::EmptyExecutable)));
    }

    #[test]
    fn test_zero_timeout_names_field() {
        let mut config = Config::default();
        config.downloader.fetch_timeout_secs = 0;

        match validate(&config) {
            Err(ValidationError::ZeroTimeout { field }) => {
                assert_eq!(field, "downloader.fetch_timeout_secs")
            }
            other => panic!("expected ZeroTimeout, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_workers() {
        let mut config = Config::default();
        config.workers.max_concurrent_jobs = 0;
        assert!(matches!(validate(&config), Err(ValidationError::NoWorkers)));

        let mut config = Config::default();
        config.workers.queue_capacity = 0;
        assert!(matches!(validate(&config), Err(ValidationError::NoQueueCapacity)));
    }

    #[test]
    fn test_zero_cache_and_poll() {
        let mut config = Config::default();
        config.cache.max_entries = 0;
        assert!(matches!(validate(&config), Err(ValidationError::NoCacheCapacity)));

        let mut config = Config::default();
        config.progress.poll_interval_ms = 0;
        assert!(matches!(validate(&config), Err(ValidationError::ZeroPollInterval)));
    }
}
