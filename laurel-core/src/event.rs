//! Events flushed to the title by the per-frame pump

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Achievement, ProgressState, Timestamp, Xuid};

/// Progress of one requirement as carried by a notification or event.
///
/// The target is optional: progress notifications that do not unlock the
/// achievement usually omit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementProgress {
    pub id: String,
    pub current_progress_value: String,
    #[serde(default)]
    pub target_progress_value: Option<String>,
}

impl RequirementProgress {
    pub fn new(id: impl Into<String>, current_progress_value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            current_progress_value: current_progress_value.into(),
            target_progress_value: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_progress_value = Some(target.into());
        self
    }
}

/// One achievement's change as reported by the service or derived locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressChangeEntry {
    pub achievement_id: String,
    pub progress_state: ProgressState,
    #[serde(default)]
    pub requirements: Vec<RequirementProgress>,
    #[serde(default)]
    pub time_unlocked: Option<Timestamp>,
}

impl ProgressChangeEntry {
    pub fn new(achievement_id: impl Into<String>, progress_state: ProgressState) -> Self {
        Self {
            achievement_id: achievement_id.into(),
            progress_state,
            requirements: Vec::new(),
            time_unlocked: None,
        }
    }

    pub fn with_requirement(mut self, requirement: RequirementProgress) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn with_time_unlocked(mut self, time: Timestamp) -> Self {
        self.time_unlocked = Some(time);
        self
    }

    /// Entry describing an unlock. Carries no requirement details since an
    /// unlock always drives every requirement to its target.
    pub fn unlocked(achievement_id: impl Into<String>, time_unlocked: Option<Timestamp>) -> Self {
        Self {
            achievement_id: achievement_id.into(),
            progress_state: ProgressState::Achieved,
            requirements: Vec::new(),
            time_unlocked,
        }
    }

    /// Snapshot an achievement's current progress as an entry.
    pub fn from_achievement(achievement: &Achievement) -> Self {
        Self {
            achievement_id: achievement.id.clone(),
            progress_state: achievement.progress_state,
            requirements: achievement
                .requirements()
                .iter()
                .map(|r| RequirementProgress {
                    id: r.id.clone(),
                    current_progress_value: r.current_progress_value.clone(),
                    target_progress_value: Some(r.target_progress_value.clone()),
                })
                .collect(),
            time_unlocked: achievement.time_unlocked(),
        }
    }
}

/// Discriminant of [`AchievementsManagerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AchievementsManagerEventType {
    LocalUserInitialStateSynced,
    AchievementProgressUpdated,
    AchievementUnlocked,
}

impl fmt::Display for AchievementsManagerEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AchievementsManagerEventType::LocalUserInitialStateSynced => "LocalUserInitialStateSynced",
            AchievementsManagerEventType::AchievementProgressUpdated => "AchievementProgressUpdated",
            AchievementsManagerEventType::AchievementUnlocked => "AchievementUnlocked",
        };
        write!(f, "{}", value)
    }
}

/// Event delivered to the title by `do_work`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AchievementsManagerEvent {
    /// The user's first full fetch completed.
    LocalUserInitialStateSynced { xuid: Xuid },
    AchievementProgressUpdated {
        xuid: Xuid,
        progress: ProgressChangeEntry,
    },
    AchievementUnlocked {
        xuid: Xuid,
        progress: ProgressChangeEntry,
    },
}

impl AchievementsManagerEvent {
    pub fn event_type(&self) -> AchievementsManagerEventType {
        match self {
            Self::LocalUserInitialStateSynced { .. } => {
                AchievementsManagerEventType::LocalUserInitialStateSynced
            }
            Self::AchievementProgressUpdated { .. } => {
                AchievementsManagerEventType::AchievementProgressUpdated
            }
            Self::AchievementUnlocked { .. } => AchievementsManagerEventType::AchievementUnlocked,
        }
    }

    pub fn xuid(&self) -> Xuid {
        match self {
            Self::LocalUserInitialStateSynced { xuid }
            | Self::AchievementProgressUpdated { xuid, .. }
            | Self::AchievementUnlocked { xuid, .. } => *xuid,
        }
    }

    /// Progress payload, absent for the initial sync event.
    pub fn progress(&self) -> Option<&ProgressChangeEntry> {
        match self {
            Self::LocalUserInitialStateSynced { .. } => None,
            Self::AchievementProgressUpdated { progress, .. }
            | Self::AchievementUnlocked { progress, .. } => Some(progress),
        }
    }

    pub fn achievement_id(&self) -> Option<&str> {
        self.progress().map(|p| p.achievement_id.as_str())
    }
}
