//! Enum types for Laurel entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{LaurelResult, ValidationError};

// ============================================================================
// ACHIEVEMENT ENUMS
// ============================================================================

/// Unlock state of an achievement for one user.
///
/// Within a session the state only moves forward:
/// `NotStarted -> InProgress -> Achieved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProgressState {
    #[default]
    Unknown,
    Achieved,
    NotStarted,
    InProgress,
}

/// Kind of achievement as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AchievementType {
    #[default]
    Unknown,
    /// Used only as a query filter: every achievement type.
    All,
    /// Title-managed achievement that can be earned at any time.
    Persistent,
    /// Time-boxed achievement.
    Challenge,
}

/// Whether an achievement is earned alone or as part of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParticipationType {
    #[default]
    Unknown,
    Individual,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MediaAssetType {
    #[default]
    Unknown,
    Icon,
    Art,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RewardType {
    #[default]
    Unknown,
    Gamerscore,
    InApp,
    Art,
}

// ============================================================================
// QUERY ENUMS
// ============================================================================

/// Field used to order achievement listings.
///
/// `TitleId` behaves like `DefaultOrder`: the cache only ever holds one
/// title's achievements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AchievementOrderBy {
    #[default]
    DefaultOrder,
    TitleId,
    UnlockTime,
}

/// Direction used when ordering by unlock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Unsorted,
    Ascending,
    Descending,
}

/// Progress-state filter applied to achievement listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StateFilter {
    #[default]
    All,
    Unlocked,
    InProgress,
    NotStarted,
}

impl StateFilter {
    /// Map a requested progress state onto a filter. `Unknown` means no filter.
    pub fn from_progress_state(state: ProgressState) -> Self {
        match state {
            ProgressState::Achieved => StateFilter::Unlocked,
            ProgressState::InProgress => StateFilter::InProgress,
            ProgressState::NotStarted => StateFilter::NotStarted,
            ProgressState::Unknown => StateFilter::All,
        }
    }

    /// Whether an achievement in `state` passes this filter.
    pub fn matches(&self, state: ProgressState) -> bool {
        match self {
            StateFilter::All => true,
            StateFilter::Unlocked => state == ProgressState::Achieved,
            StateFilter::InProgress => state == ProgressState::InProgress,
            StateFilter::NotStarted => state == ProgressState::NotStarted,
        }
    }
}

/// Sort and filter options for a filtered achievement listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortFilterSettings {
    pub order_by: AchievementOrderBy,
    pub sort_order: SortOrder,
    pub state_filter: StateFilter,
}

impl SortFilterSettings {
    pub fn new(order_by: AchievementOrderBy, sort_order: SortOrder, state_filter: StateFilter) -> Self {
        Self {
            order_by,
            sort_order,
            state_filter,
        }
    }

    /// Settings for the plain unsorted listing with an optional state filter.
    pub fn unsorted(state_filter: StateFilter) -> Self {
        Self::new(AchievementOrderBy::DefaultOrder, SortOrder::Unsorted, state_filter)
    }

    /// Settings ordering by unlock time.
    pub fn by_unlock_time(sort_order: SortOrder, state_filter: StateFilter) -> Self {
        Self::new(AchievementOrderBy::UnlockTime, sort_order, state_filter)
    }

    /// Whether these settings ask for a sorted listing.
    pub fn is_sorted(&self) -> bool {
        self.order_by == AchievementOrderBy::UnlockTime
    }

    /// Reject combinations the cache cannot serve.
    ///
    /// Unlock time needs a direction, and a direction is only meaningful
    /// for unlock time.
    pub fn validate(&self) -> LaurelResult<()> {
        let sorted_field = self.order_by == AchievementOrderBy::UnlockTime;
        let has_direction = self.sort_order != SortOrder::Unsorted;
        if sorted_field != has_direction {
            return Err(ValidationError::InvalidSortCombination {
                order_by: self.order_by,
                sort_order: self.sort_order,
            }
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// REAL-TIME ENUMS
// ============================================================================

/// State of the real-time notification connection for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

// ============================================================================
// DISPLAY / FROMSTR
// ============================================================================

/// Normalize a token for tolerant parsing ("in_progress", "In Progress", "inprogress").
fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ProgressState::Unknown => "Unknown",
            ProgressState::Achieved => "Achieved",
            ProgressState::NotStarted => "NotStarted",
            ProgressState::InProgress => "InProgress",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for ProgressState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "unknown" => Ok(ProgressState::Unknown),
            "achieved" | "unlocked" => Ok(ProgressState::Achieved),
            "notstarted" => Ok(ProgressState::NotStarted),
            "inprogress" => Ok(ProgressState::InProgress),
            _ => Err(format!("Invalid ProgressState: {}", s)),
        }
    }
}

impl fmt::Display for AchievementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AchievementType::Unknown => "Unknown",
            AchievementType::All => "All",
            AchievementType::Persistent => "Persistent",
            AchievementType::Challenge => "Challenge",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for AchievementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "unknown" => Ok(AchievementType::Unknown),
            "all" => Ok(AchievementType::All),
            "persistent" => Ok(AchievementType::Persistent),
            "challenge" => Ok(AchievementType::Challenge),
            _ => Err(format!("Invalid AchievementType: {}", s)),
        }
    }
}

impl fmt::Display for AchievementOrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AchievementOrderBy::DefaultOrder => "DefaultOrder",
            AchievementOrderBy::TitleId => "TitleId",
            AchievementOrderBy::UnlockTime => "UnlockTime",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for AchievementOrderBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "default" | "defaultorder" => Ok(AchievementOrderBy::DefaultOrder),
            "titleid" => Ok(AchievementOrderBy::TitleId),
            "unlocktime" => Ok(AchievementOrderBy::UnlockTime),
            _ => Err(format!("Invalid AchievementOrderBy: {}", s)),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            SortOrder::Unsorted => "Unsorted",
            SortOrder::Ascending => "Ascending",
            SortOrder::Descending => "Descending",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "unsorted" | "none" => Ok(SortOrder::Unsorted),
            "ascending" | "asc" => Ok(SortOrder::Ascending),
            "descending" | "desc" => Ok(SortOrder::Descending),
            _ => Err(format!("Invalid SortOrder: {}", s)),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected => "Disconnected",
        };
        write!(f, "{}", value)
    }
}
