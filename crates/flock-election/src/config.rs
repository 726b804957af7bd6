//! Election configuration management

use crate::error::{ElectionError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one election participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Human-readable name of this candidate
    pub candidate_name: String,

    /// Address of the coordination service, as `host:port`
    pub address: String,

    /// Session timeout negotiated with the coordination service
    pub session_timeout: Duration,

    /// Namespace path the election runs under
    pub namespace: String,

    /// Name prefix for candidacy nodes; the service appends the sequence suffix
    pub candidate_prefix: String,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            candidate_name: format!("candidate-{}", uuid::Uuid::new_v4()),
            address: "localhost:2181".to_string(),
            session_timeout: Duration::from_millis(3000),
            namespace: "/election".to_string(),
            candidate_prefix: "c_".to_string(),
        }
    }
}

impl ElectionConfig {
    /// Load configuration from file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ElectionError::configuration(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ElectionError::configuration(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ElectionError::configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ElectionError::configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.candidate_name.is_empty() {
            return Err(ElectionError::configuration("Candidate name cannot be empty"));
        }

        let address_ok = match self.address.rsplit_once(':') {
            Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
            None => false,
        };
        if !address_ok {
            return Err(ElectionError::configuration(format!(
                "Service address must be host:port, got '{}'",
                self.address
            )));
        }

        if !self.namespace.starts_with('/') || self.namespace.len() < 2 {
            return Err(ElectionError::configuration(
                "Namespace must be an absolute path",
            ));
        }
        if self.namespace.ends_with('/') {
            return Err(ElectionError::configuration(
                "Namespace must not end with a slash",
            ));
        }

        if self.candidate_prefix.is_empty() || self.candidate_prefix.contains('/') {
            return Err(ElectionError::configuration(
                "Candidate prefix must be a non-empty leaf name",
            ));
        }

        if self.session_timeout < Duration::from_millis(100) {
            return Err(ElectionError::configuration(
                "Session timeout must be at least 100ms",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ElectionConfig::default();
        assert!(config.candidate_name.starts_with("candidate-"));
        assert_eq!(config.address, "localhost:2181");
        assert_eq!(config.namespace, "/election");
        assert_eq!(config.candidate_prefix, "c_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ElectionConfig::default();

        config.address = "no-port".to_string();
        assert!(config.validate().is_err());

        config = ElectionConfig::default();
        config.namespace = "election".to_string();
        assert!(config.validate().is_err());

        config = ElectionConfig::default();
        config.namespace = "/election/".to_string();
        assert!(config.validate().is_err());

        config = ElectionConfig::default();
        config.candidate_prefix = "c_/".to_string();
        assert!(config.validate().is_err());

        config = ElectionConfig::default();
        config.session_timeout = Duration::from_millis(10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = ElectionConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: ElectionConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config.candidate_name, deserialized.candidate_name);
        assert_eq!(config.address, deserialized.address);
        assert_eq!(config.session_timeout, deserialized.session_timeout);
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("election.toml");

        let config = ElectionConfig::default();

        config.to_file(&config_path).unwrap();
        assert!(config_path.exists());

        let loaded = ElectionConfig::from_file(&config_path).unwrap();
        assert_eq!(config.candidate_name, loaded.candidate_name);
        assert_eq!(config.namespace, loaded.namespace);
    }
}
