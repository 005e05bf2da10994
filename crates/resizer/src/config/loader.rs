use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::task::{MAX_PRICE, MIN_PRICE};

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.output_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "output_directory must not be empty".to_string(),
        });
    }

    if config.resolutions.is_empty() {
        return Err(ConfigError::Validation {
            message: "At least one resolution must be configured".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for &resolution in &config.resolutions {
        if resolution == 0 {
            return Err(ConfigError::Validation {
                message: "Resolutions must be positive widths".to_string(),
            });
        }
        if !seen.insert(resolution) {
            return Err(ConfigError::Validation {
                message: format!("Duplicate resolution: {}", resolution),
            });
        }
    }

    if config.worker.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "worker.timeout_secs must be greater than zero".to_string(),
        });
    }

    let pricing = &config.pricing;
    if !(pricing.min <= pricing.max && pricing.min.is_finite() && pricing.max.is_finite()) {
        return Err(ConfigError::Validation {
            message: format!(
                "Invalid price range [{}, {}]",
                pricing.min, pricing.max
            ),
        });
    }
    if pricing.min < MIN_PRICE || pricing.max > MAX_PRICE {
        return Err(ConfigError::Validation {
            message: format!(
                "Price range [{}, {}] must lie within [{}, {}]",
                pricing.min, pricing.max, MIN_PRICE, MAX_PRICE
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::WorkerMode;

    #[test]
    fn test_load_minimal_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "output_directory": "/output"
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.output_directory, "/output");
        assert_eq!(config.resolutions, vec![1024, 800]);
        assert_eq!(config.worker.mode, WorkerMode::Thread);
        assert_eq!(config.worker.timeout_secs, 300);
        assert_eq!(config.pricing.min, 5.0);
        assert_eq!(config.pricing.max, 50.0);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "output_directory": "/srv/output",
            "upload_directory": "/srv/uploads",
            "resolutions": [1920, 640, 320],
            "database_path": "/srv/resizer.db",
            "worker": { "mode": "process", "program": "/usr/bin/resizer", "timeout_secs": 30 },
            "pricing": { "min": 10.0, "max": 25.5 }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.resolutions, vec![1920, 640, 320]);
        assert_eq!(config.worker.mode, WorkerMode::Process);
        assert_eq!(config.worker.program.as_deref(), Some("/usr/bin/resizer"));
        assert_eq!(
            config.upload_directory(),
            std::path::PathBuf::from("/srv/uploads")
        );
        assert_eq!(
            config.database_path(),
            Some(std::path::PathBuf::from("/srv/resizer.db"))
        );
    }

    #[test]
    fn test_default_upload_directory_under_output() {
        let config =
            load_config_from_str(r#"{ "version": "1.0", "output_directory": "/out" }"#).unwrap();
        assert_eq!(
            config.upload_directory(),
            std::path::PathBuf::from("/out/.uploads")
        );
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0", "output_directory": "/out" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_empty_resolutions_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "output_directory": "/out", "resolutions": [] }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_duplicate_resolution_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "output_directory": "/out", "resolutions": [800, 800] }"#,
        );
        match result {
            Err(ConfigError::Validation { message }) => assert!(message.contains("800")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_inverted_price_range_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "output_directory": "/out", "pricing": { "min": 10.0, "max": 5.0 } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_price_range_outside_bounds_rejected() {
        for pricing in [
            r#"{ "min": 1.0, "max": 2.5 }"#,
            r#"{ "min": 4.9, "max": 20.0 }"#,
            r#"{ "min": 10.0, "max": 50.1 }"#,
        ] {
            let json = format!(
                r#"{{ "version": "1.0", "output_directory": "/out", "pricing": {} }}"#,
                pricing
            );
            let err = load_config_from_str(&json).unwrap_err();
            assert!(err.to_string().contains("must lie within"), "{}: {}", pricing, err);
        }
    }

    #[test]
    fn test_malformed_json() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/nonexistent/resizer.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
