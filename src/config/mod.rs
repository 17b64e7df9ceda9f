// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = parse_config(&contents, path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let ext = path.extension().and_then(|s| s.to_str());
    let config = if ext == Some("yaml") || ext == Some("yml") {
        serde_yaml::from_str(contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(contents).context("Failed to parse JSON config")?
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn yaml_fills_defaults() {
        let config = parse_config("trace: true\n", Path::new("lb.yaml")).unwrap();
        config.validate().unwrap();

        assert!(config.trace);
        assert!(!config.https);
        assert_eq!(config.port, 8090);
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.health_check.interval(), Duration::from_secs(5));
        assert_eq!(
            config.backends,
            vec!["server1:8080", "server2:8080", "server3:8080"]
        );
        assert_eq!(config.client_header().as_str(), "x-test-client");
        assert_eq!(config.trace_header().as_str(), "lb-from");
        assert_eq!(config.scheme(), "http");
    }

    #[test]
    fn json_is_parsed_by_default() {
        let raw = r#"{"port": 9000, "https": true, "backends": ["a:1", "b:2"]}"#;
        let config = parse_config(raw, Path::new("lb.json")).unwrap();
        config.validate().unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.scheme(), "https");
        assert_eq!(config.backends.len(), 2);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_config("weights: [1, 2]\n", Path::new("lb.yml"));
        assert!(err.is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.backends.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.backends.push("server1:8080".to_string());
        assert!(config.validate().is_err());

        for bad in ["a:1/x", "a:1?q", "no-port", "user@a:1", "http://a:1"] {
            let mut config = Config::default();
            config.backends = vec![bad.to_string()];
            assert!(config.validate().is_err(), "{} should be rejected", bad);
        }

        let mut config = Config::default();
        config.backends = vec!["127.0.0.1:8080".to_string(), "[::1]:8081".to_string()];
        config.validate().unwrap();

        let mut config = Config::default();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.health_check.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.trace_header = "bad header".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.metrics.enabled = true;
        config.metrics.path = "metrics".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        assert!(load_config("/nonexistent/lb.yaml").await.is_err());
    }
}
