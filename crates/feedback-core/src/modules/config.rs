use std::fs;
use std::path::Path;

use feedback_types::{ConfigError, IngestConfig};
use validator::Validate;

/// Load configuration from a JSON file, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<IngestConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(IngestConfig::default());
    };

    if !path.exists() {
        return Err(ConfigError::NotFound { path: path.display().to_string() });
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::from_io_error(&e))?;
    let config: IngestConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))?;

    config
        .validate()
        .map_err(|e| ConfigError::ValidationError { message: e.to_string() })?;

    tracing::info!(path = %path.display(), credentials = config.credentials.len(), "Loaded config");
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_no_path_gives_defaults() {
        assert_eq!(load_config(None).unwrap(), IngestConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/ingest.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_load_overrides_plan_limits() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "port": 9100,
                "plans": {{
                    "free": {{"rate_limit_requests": 5, "rate_limit_window_secs": 10, "monthly_responses": 3, "gate_over_quota": true}},
                    "pro": {{"rate_limit_requests": 50, "rate_limit_window_secs": 10, "monthly_responses": 100}},
                    "business": {{"rate_limit_requests": 100, "rate_limit_window_secs": 10}},
                    "enterprise": {{"rate_limit_requests": 1000, "rate_limit_window_secs": 10}}
                }},
                "credentials": [
                    {{"key": "fk_live_0123456789abcdef", "tenant_id": "acme", "project_id": "web", "plan": "pro"}}
                ]
            }}"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.plans.free.rate_limit_requests, 5);
        assert_eq!(config.plans.free.monthly_responses, Some(3));
        assert_eq!(config.plans.business.monthly_responses, None);
        assert_eq!(config.credentials[0].plan, feedback_types::PlanTier::Pro);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"idempotency": {{"ttl_secs": 5}}}}"#).unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
