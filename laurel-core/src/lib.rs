//! Laurel Core - Achievement Types
//!
//! Data structures shared by every Laurel crate: identities, enums, the
//! achievement record, the events flushed to titles, the error taxonomy,
//! configuration, and the progress value comparator.
//! This crate performs no I/O.

pub mod achievement;
pub mod config;
pub mod enums;
pub mod error;
pub mod event;
pub mod identity;
pub mod progress;

pub use achievement::{
    Achievement, MediaAsset, Progression, Requirement, Reward, TimeWindow, TitleAssociation,
};
pub use config::{ManagerConfig, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use enums::{
    AchievementOrderBy, AchievementType, ConnectionState, MediaAssetType, ParticipationType,
    ProgressState, RewardType, SortFilterSettings, SortOrder, StateFilter,
};
pub use error::{
    CacheError, ConfigError, ErrorKind, LaurelError, LaurelResult, ServiceError, ValidationError,
};
pub use event::{
    AchievementsManagerEvent, AchievementsManagerEventType, ProgressChangeEntry,
    RequirementProgress,
};
pub use identity::{SubscriptionToken, Timestamp, Xuid};
pub use progress::{
    classify, force_to_unsigned, parse_progress_lenient, should_update_progress,
    ProgressValueType,
};
