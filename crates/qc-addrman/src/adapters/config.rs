//! Configuration providers.
//!
//! `StaticConfigProvider` hands out a config built in code;
//! `TomlConfigProvider` reads the `[addrman]` section of a node config file.

use crate::domain::AddressManagerConfig;
use crate::ports::ConfigProvider;

/// Fixed configuration, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider(AddressManagerConfig);

impl StaticConfigProvider {
    #[must_use]
    pub fn new(config: AddressManagerConfig) -> Self {
        Self(config)
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn address_manager_config(&self) -> AddressManagerConfig {
        self.0.clone()
    }
}

// ============================================================================
// TOML FILE (feature "config")
// ============================================================================

#[cfg(feature = "config")]
mod toml_config {
    use super::*;
    use crate::domain::ConfigError;
    use serde::Deserialize;
    use std::fs;
    use std::path::Path;

    /// Configuration file structure.
    #[derive(Debug, Deserialize)]
    struct ConfigFile {
        #[serde(default)]
        addrman: AddressManagerConfig,
    }

    /// TOML-based configuration provider.
    ///
    /// Missing keys keep their defaults.
    ///
    /// # Config File Format
    ///
    /// ```toml
    /// [addrman]
    /// new_bucket_count = 1024
    /// tried_bucket_count = 256
    /// bucket_size = 64
    /// horizon_days = 30
    /// consistency_check_ratio = 0
    /// persist_key = true
    /// ```
    #[derive(Debug, Clone)]
    pub struct TomlConfigProvider {
        config: AddressManagerConfig,
    }

    impl TomlConfigProvider {
        /// Load configuration from a TOML file.
        ///
        /// # Errors
        ///
        /// Returns error if the file cannot be read, parsed or validated.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
            let content = fs::read_to_string(path.as_ref()).map_err(|e| {
                ConfigError::Io(format!("{}: {}", path.as_ref().display(), e))
            })?;

            Self::parse(&content)
        }

        /// Parse configuration from a TOML string.
        pub fn parse(content: &str) -> Result<Self, ConfigError> {
            let file: ConfigFile =
                toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            file.addrman.validate()?;
            Ok(Self {
                config: file.addrman,
            })
        }
    }

    impl ConfigProvider for TomlConfigProvider {
        fn address_manager_config(&self) -> AddressManagerConfig {
            self.config.clone()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_partial_section_keeps_defaults() {
            let provider = TomlConfigProvider::parse(
                "[addrman]\nconsistency_check_ratio = 100\npersist_key = false\n",
            )
            .unwrap();
            let config = provider.address_manager_config();
            assert_eq!(config.consistency_check_ratio, 100);
            assert!(!config.persist_key);
            assert_eq!(config.new_bucket_count, 1024);
        }

        #[test]
        fn test_empty_file_is_default() {
            let provider = TomlConfigProvider::parse("").unwrap();
            assert_eq!(provider.address_manager_config(), AddressManagerConfig::default());
        }

        #[test]
        fn test_invalid_values_rejected() {
            assert_eq!(
                TomlConfigProvider::parse("[addrman]\nbucket_size = 0\n").unwrap_err(),
                ConfigError::Zero("bucket_size")
            );
            assert!(matches!(
                TomlConfigProvider::parse("[addrman]\nbucket_size = \"big\"\n"),
                Err(ConfigError::Parse(_))
            ));
        }

        #[test]
        fn test_load_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("node.toml");
            std::fs::write(&path, "[addrman]\nhorizon_days = 10\n").unwrap();
            let provider = TomlConfigProvider::load(&path).unwrap();
            assert_eq!(provider.address_manager_config().horizon_days, 10);

            assert!(matches!(
                TomlConfigProvider::load(dir.path().join("missing.toml")),
                Err(ConfigError::Io(_))
            ));
        }
    }
}

#[cfg(feature = "config")]
pub use toml_config::TomlConfigProvider;
