use crate::config::types::{Config, FetchConfig, JobConfig, ProgressConfig};
use crate::ConfigError;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_progress_config(&config.progress)?;
    validate_jobs(&config.job)?;
    Ok(())
}

/// Validates fetch layer configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.pool_size < 1 {
        return Err(ConfigError::Validation(format!(
            "pool-size must be >= 1, got {}",
            config.pool_size
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_delay_secs < config.error_delay_secs {
        return Err(ConfigError::Validation(format!(
            "max-delay-secs ({}) must be >= error-delay-secs ({})",
            config.max_delay_secs, config.error_delay_secs
        )));
    }

    Ok(())
}

/// Validates progress hub configuration
fn validate_progress_config(config: &ProgressConfig) -> Result<(), ConfigError> {
    if config.queue_size < 1 {
        return Err(ConfigError::Validation(format!(
            "queue-size must be >= 1, got {}",
            config.queue_size
        )));
    }

    if config.subscriber_buffer < 1 {
        return Err(ConfigError::Validation(format!(
            "subscriber-buffer must be >= 1, got {}",
            config.subscriber_buffer
        )));
    }

    if config.max_strikes < 1 {
        return Err(ConfigError::Validation(format!(
            "max-strikes must be >= 1, got {}",
            config.max_strikes
        )));
    }

    if config.heartbeat_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "heartbeat-secs must be >= 1, got {}",
            config.heartbeat_secs
        )));
    }

    if config.keepalive_timeout_secs <= config.heartbeat_secs {
        return Err(ConfigError::Validation(format!(
            "keepalive-timeout-secs ({}) must be > heartbeat-secs ({})",
            config.keepalive_timeout_secs, config.heartbeat_secs
        )));
    }

    Ok(())
}

/// Validates job entries
fn validate_jobs(jobs: &[JobConfig]) -> Result<(), ConfigError> {
    if jobs.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[job]] entry is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for job in jobs {
        if job.kind.is_empty() {
            return Err(ConfigError::Validation(
                "job kind cannot be empty".to_string(),
            ));
        }

        if !seen.insert(job.kind.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate job kind '{}'",
                job.kind
            )));
        }

        if job.targets_path.is_empty() {
            return Err(ConfigError::Validation(format!(
                "job '{}': targets-path cannot be empty",
                job.kind
            )));
        }

        if job.checkpoint_path.is_empty() {
            return Err(ConfigError::Validation(format!(
                "job '{}': checkpoint-path cannot be empty",
                job.kind
            )));
        }

        if job.workers < 1 || job.workers > 16 {
            return Err(ConfigError::Validation(format!(
                "job '{}': workers must be between 1 and 16, got {}",
                job.kind, job.workers
            )));
        }

        if job.save_every < 1 {
            return Err(ConfigError::Validation(format!(
                "job '{}': save-every must be >= 1, got {}",
                job.kind, job.save_every
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            fetch: FetchConfig {
                max_retries: 5,
                request_timeout_secs: 45,
                pool_size: 6,
                rate_limit_delay_secs: 20,
                block_delay_secs: 30,
                error_delay_secs: 5,
                max_delay_secs: 120,
            },
            progress: ProgressConfig::default(),
            job: vec![JobConfig {
                kind: "team-squads".to_string(),
                targets_path: "./db/teamlinks.json".to_string(),
                checkpoint_path: "./db/team_squads.json".to_string(),
                workers: 2,
                save_every: 5,
                min_interval_ms: None,
            }],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let mut config = base_config();
        config.fetch.max_retries = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_no_jobs_rejected() {
        let mut config = base_config();
        config.job.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let mut config = base_config();
        let dup = config.job[0].clone();
        config.job.push(dup);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = base_config();
        config.job[0].workers = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_keepalive_must_exceed_heartbeat() {
        let mut config = base_config();
        config.progress.heartbeat_secs = 90;
        config.progress.keepalive_timeout_secs = 90;
        assert!(validate(&config).is_err());
    }
}
