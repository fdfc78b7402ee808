//! Error types for Laurel operations

use crate::{AchievementOrderBy, SortOrder, Xuid};
use thiserror::Error;

/// Per-user cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("User not registered: {xuid}")]
    UserNotFound { xuid: Xuid },

    #[error("User already registered: {xuid}")]
    UserAlreadyRegistered { xuid: Xuid },

    #[error("User {xuid} has not finished initialization")]
    UserNotInitialized { xuid: Xuid },

    #[error("Achievement not found for user {xuid}: {achievement_id}")]
    AchievementNotFound { xuid: Xuid, achievement_id: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Validation errors raised before any state is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Progress for {achievement_id} must exceed {current}%, got {requested}%")]
    ProgressNotGreater {
        achievement_id: String,
        current: u32,
        requested: u32,
    },

    #[error("Invalid sort combination: {order_by} with {sort_order}")]
    InvalidSortCombination {
        order_by: AchievementOrderBy,
        sort_order: SortOrder,
    },

    #[error("Achievement already unlocked: {achievement_id}")]
    AlreadyUnlocked { achievement_id: String },

    #[error("Achievement {achievement_id} cannot be updated by percentage: {reason}")]
    UnsupportedAchievement {
        achievement_id: String,
        reason: String,
    },
}

/// Errors reported by the backing service collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Achievement fetch failed for user {xuid}: {reason}")]
    FetchFailed { xuid: Xuid, reason: String },

    #[error("Achievement update failed for {achievement_id}: {reason}")]
    UpdateFailed {
        achievement_id: String,
        reason: String,
    },

    #[error("Real-time subscription failed for user {xuid}: {reason}")]
    SubscriptionFailed { xuid: Xuid, reason: String },

    #[error("Background runtime unavailable: {reason}")]
    RuntimeUnavailable { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Coarse failure category reported to titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown user or achievement.
    NotFound,
    /// Malformed input or a progress value that does not advance.
    InvalidArgument,
    /// Operation not valid in the current cache state.
    InvalidState,
    /// Operation excluded for this achievement shape.
    NotSupported,
    /// Backing service or runtime failure.
    Service,
    /// Internal fault such as a poisoned lock or bad configuration.
    Internal,
}

/// Master error type for all Laurel errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LaurelError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl LaurelError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LaurelError::Cache(err) => match err {
                CacheError::UserNotFound { .. } | CacheError::AchievementNotFound { .. } => {
                    ErrorKind::NotFound
                }
                CacheError::UserAlreadyRegistered { .. } | CacheError::UserNotInitialized { .. } => {
                    ErrorKind::InvalidState
                }
                CacheError::LockPoisoned => ErrorKind::Internal,
            },
            LaurelError::Validation(err) => match err {
                ValidationError::AlreadyUnlocked { .. } => ErrorKind::InvalidState,
                ValidationError::UnsupportedAchievement { .. } => ErrorKind::NotSupported,
                ValidationError::RequiredFieldMissing { .. }
                | ValidationError::InvalidValue { .. }
                | ValidationError::ProgressNotGreater { .. }
                | ValidationError::InvalidSortCombination { .. } => ErrorKind::InvalidArgument,
            },
            LaurelError::Service(_) => ErrorKind::Service,
            LaurelError::Config(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for Laurel operations.
pub type LaurelResult<T> = Result<T, LaurelError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display_not_found() {
        let err = CacheError::AchievementNotFound {
            xuid: Xuid::new(7),
            achievement_id: "12".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Achievement not found"));
        assert!(msg.contains('7'));
        assert!(msg.contains("12"));
    }

    #[test]
    fn test_validation_error_display_progress_not_greater() {
        let err = ValidationError::ProgressNotGreater {
            achievement_id: "3".to_string(),
            current: 40,
            requested: 25,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("40%"));
        assert!(msg.contains("25%"));
    }

    #[test]
    fn test_validation_error_display_sort_combination() {
        let err = ValidationError::InvalidSortCombination {
            order_by: AchievementOrderBy::DefaultOrder,
            sort_order: SortOrder::Descending,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("DefaultOrder"));
        assert!(msg.contains("Descending"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "page_size".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("page_size"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_laurel_error_from_variants() {
        let cache = LaurelError::from(CacheError::LockPoisoned);
        assert!(matches!(cache, LaurelError::Cache(_)));

        let validation = LaurelError::from(ValidationError::RequiredFieldMissing {
            field: "achievement_id".to_string(),
        });
        assert!(matches!(validation, LaurelError::Validation(_)));

        let service = LaurelError::from(ServiceError::RuntimeUnavailable {
            reason: "shut down".to_string(),
        });
        assert!(matches!(service, LaurelError::Service(_)));

        let config = LaurelError::from(ConfigError::MissingRequired {
            field: "title_id".to_string(),
        });
        assert!(matches!(config, LaurelError::Config(_)));
    }

    #[test]
    fn test_error_kind_mapping() {
        let xuid = Xuid::new(1);
        assert_eq!(
            LaurelError::from(CacheError::UserNotFound { xuid }).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LaurelError::from(CacheError::UserNotInitialized { xuid }).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            LaurelError::from(CacheError::UserAlreadyRegistered { xuid }).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            LaurelError::from(ValidationError::AlreadyUnlocked {
                achievement_id: "1".to_string()
            })
            .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            LaurelError::from(ValidationError::UnsupportedAchievement {
                achievement_id: "1".to_string(),
                reason: "two requirements".to_string()
            })
            .kind(),
            ErrorKind::NotSupported
        );
        assert_eq!(
            LaurelError::from(ValidationError::ProgressNotGreater {
                achievement_id: "1".to_string(),
                current: 50,
                requested: 50
            })
            .kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            LaurelError::from(ServiceError::FetchFailed {
                xuid,
                reason: "timeout".to_string()
            })
            .kind(),
            ErrorKind::Service
        );
        assert_eq!(LaurelError::from(CacheError::LockPoisoned).kind(), ErrorKind::Internal);
    }
}
