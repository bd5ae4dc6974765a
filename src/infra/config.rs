//! Configuration loading from TOML files
//!
//! The binary picks the file from `--config`, then the CONFIG_FILE
//! environment variable, then config/dev.toml. A missing or unreadable
//! file falls back to built-in defaults.

use crate::domain::types::ObjectType;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct FacilityConfig {
    /// Facility display name used in notifications
    #[serde(default)]
    pub name: Option<String>,
    /// Facility street address used in notifications
    #[serde(default)]
    pub address: Option<String>,
    /// Country calling code prepended to recipient phones
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// chrono format string for dates shown to recipients
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Shown in place of a missing tracking code
    #[serde(default = "default_not_available")]
    pub not_available: String,
}

impl Default for FacilityConfig {
    fn default() -> Self {
        Self {
            name: None,
            address: None,
            country_code: default_country_code(),
            date_format: default_date_format(),
            not_available: default_not_available(),
        }
    }
}

fn default_country_code() -> String {
    "55".to_string()
}

fn default_date_format() -> String {
    "%d/%m/%Y".to_string()
}

fn default_not_available() -> String {
    "Não disponível".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationConfig {
    /// Type pre-selected for rows no rule matched
    #[serde(default = "default_object_type")]
    pub default_object_type: String,
    /// Storage days when neither rule nor type supplies one
    #[serde(default = "default_fallback_storage_days")]
    pub fallback_storage_days: u32,
    /// Storage days for letter-like types ("Carta", "Cartão") without a configured value
    #[serde(default = "default_letter_storage_days")]
    pub letter_storage_days: u32,
}

fn default_object_type() -> String {
    "Encomenda PAC".to_string()
}

fn default_fallback_storage_days() -> u32 {
    7
}

fn default_letter_storage_days() -> u32 {
    20
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            default_object_type: default_object_type(),
            fallback_storage_days: default_fallback_storage_days(),
            letter_storage_days: default_letter_storage_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot file backing the record store
    #[serde(default = "default_store_file")]
    pub file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { file: default_store_file() }
    }
}

fn default_store_file() -> String {
    "data/store.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Base URL of the outbound messaging deep link
    #[serde(default = "default_link_base")]
    pub link_base: String,
    /// Directory for batch artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { link_base: default_link_base(), output_dir: default_output_dir() }
    }
}

fn default_link_base() -> String {
    "https://wa.me".to_string()
}

fn default_output_dir() -> String {
    "out".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub facility: FacilityConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub object_types: Vec<ObjectType>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    facility_name: Option<String>,
    facility_address: Option<String>,
    country_code: String,
    date_format: String,
    not_available: String,
    default_object_type: String,
    fallback_storage_days: u32,
    letter_storage_days: u32,
    object_types: Vec<ObjectType>,
    store_file: String,
    link_base: String,
    output_dir: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            facility_name: None,
            facility_address: None,
            country_code: default_country_code(),
            date_format: default_date_format(),
            not_available: default_not_available(),
            default_object_type: default_object_type(),
            fallback_storage_days: default_fallback_storage_days(),
            letter_storage_days: default_letter_storage_days(),
            object_types: Self::default_object_types(),
            store_file: default_store_file(),
            link_base: default_link_base(),
            output_dir: default_output_dir(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    fn default_object_types() -> Vec<ObjectType> {
        vec![
            ObjectType::new("Encomenda PAC"),
            ObjectType::new("Encomenda SEDEX"),
            ObjectType::new("Carta Registrada"),
            ObjectType::new("Cartão Postal"),
        ]
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let object_types = if toml_config.object_types.is_empty() {
            Self::default_object_types()
        } else {
            toml_config.object_types
        };

        Ok(Self {
            facility_name: toml_config.facility.name.filter(|s| !s.trim().is_empty()),
            facility_address: toml_config.facility.address.filter(|s| !s.trim().is_empty()),
            country_code: toml_config.facility.country_code,
            date_format: toml_config.facility.date_format,
            not_available: toml_config.facility.not_available,
            default_object_type: toml_config.classification.default_object_type,
            fallback_storage_days: toml_config.classification.fallback_storage_days,
            letter_storage_days: toml_config.classification.letter_storage_days,
            object_types,
            store_file: toml_config.store.file,
            link_base: toml_config.notifications.link_base,
            output_dir: toml_config.notifications.output_dir,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration from a path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Find a configured object type by exact name
    pub fn object_type(&self, name: &str) -> Option<&ObjectType> {
        self.object_types.iter().find(|t| t.name == name)
    }

    pub fn facility_name(&self) -> Option<&str> {
        self.facility_name.as_deref()
    }

    pub fn facility_address(&self) -> Option<&str> {
        self.facility_address.as_deref()
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    pub fn not_available(&self) -> &str {
        &self.not_available
    }

    pub fn default_object_type(&self) -> &str {
        &self.default_object_type
    }

    pub fn fallback_storage_days(&self) -> u32 {
        self.fallback_storage_days
    }

    pub fn letter_storage_days(&self) -> u32 {
        self.letter_storage_days
    }

    pub fn object_types(&self) -> &[ObjectType] {
        &self.object_types
    }

    pub fn store_file(&self) -> &str {
        &self.store_file
    }

    pub fn link_base(&self) -> &str {
        &self.link_base
    }

    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to set facility name and address
    pub fn with_facility(mut self, name: &str, address: &str) -> Self {
        self.facility_name = Some(name.to_string());
        self.facility_address = Some(address.to_string());
        self
    }
}
