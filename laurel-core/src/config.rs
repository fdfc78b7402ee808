//! Configuration types

use serde::{Deserialize, Serialize};

use crate::{ConfigError, LaurelResult};

/// Page size used for every achievement fetch unless overridden.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size accepted by [`ManagerConfig::validate`].
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Configuration for one title's achievements manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Title whose achievements are cached.
    pub title_id: u32,
    /// Service configuration id used for progress updates.
    pub service_configuration_id: String,
    /// Number of achievements requested per page.
    pub page_size: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            title_id: 0,
            service_configuration_id: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ManagerConfig {
    pub fn new(title_id: u32, service_configuration_id: impl Into<String>) -> Self {
        Self {
            title_id,
            service_configuration_id: service_configuration_id.into(),
            ..Self::default()
        }
    }

    pub fn with_title_id(mut self, title_id: u32) -> Self {
        self.title_id = title_id;
        self
    }

    pub fn with_service_configuration_id(mut self, scid: impl Into<String>) -> Self {
        self.service_configuration_id = scid.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - title_id is non-zero
    /// - service_configuration_id is non-empty
    /// - page_size in 1..=MAX_PAGE_SIZE
    pub fn validate(&self) -> LaurelResult<()> {
        if self.title_id == 0 {
            return Err(ConfigError::InvalidValue {
                field: "title_id".to_string(),
                value: self.title_id.to_string(),
                reason: "title_id must be non-zero".to_string(),
            }
            .into());
        }

        if self.service_configuration_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "service_configuration_id".to_string(),
            }
            .into());
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "page_size".to_string(),
                value: self.page_size.to_string(),
                reason: format!("page_size must be between 1 and {}", MAX_PAGE_SIZE),
            }
            .into());
        }

        Ok(())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `LAUREL_TITLE_ID`: Title id (default: 0, which fails validation)
    /// - `LAUREL_SERVICE_CONFIG_ID`: Service configuration id (default: empty)
    /// - `LAUREL_PAGE_SIZE`: Achievements per fetch (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            title_id: std::env::var("LAUREL_TITLE_ID")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.title_id),
            service_configuration_id: std::env::var("LAUREL_SERVICE_CONFIG_ID")
                .ok()
                .unwrap_or(defaults.service_configuration_id),
            page_size: std::env::var("LAUREL_PAGE_SIZE")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.page_size),
        }
    }
}
