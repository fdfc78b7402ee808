//! Achievement records and their nested display metadata

use serde::{Deserialize, Serialize};

use crate::{
    AchievementType, MediaAssetType, ParticipationType, ProgressState, RewardType, Timestamp,
};

/// One measurable sub-goal of an achievement.
///
/// Progress values are opaque strings. Their numeric meaning is inferred at
/// comparison time by [`crate::should_update_progress`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub id: String,
    pub current_progress_value: String,
    pub target_progress_value: String,
}

impl Requirement {
    pub fn new(
        id: impl Into<String>,
        current_progress_value: impl Into<String>,
        target_progress_value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            current_progress_value: current_progress_value.into(),
            target_progress_value: target_progress_value.into(),
        }
    }

    /// Whether the current value has reached the target (string equality).
    pub fn is_complete(&self) -> bool {
        self.current_progress_value == self.target_progress_value
    }

    /// Case-insensitive id match.
    pub fn matches_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

/// Requirement list plus the unlock time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progression {
    pub requirements: Vec<Requirement>,
    /// `None` until the achievement is unlocked.
    #[serde(default)]
    pub time_unlocked: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleAssociation {
    pub name: String,
    pub title_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub name: String,
    pub media_asset_type: MediaAssetType,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub name: String,
    pub description: String,
    pub value: String,
    pub reward_type: RewardType,
    pub value_type: String,
    #[serde(default)]
    pub media_asset: Option<MediaAsset>,
}

/// Availability window for time-boxed achievements.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    #[serde(default)]
    pub start_date: Option<Timestamp>,
    #[serde(default)]
    pub end_date: Option<Timestamp>,
}

/// One achievement definition plus the user's live progress.
///
/// Display fields are carried through verbatim; the engine only reads
/// `id`, `progress_state` and `progression`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Achievement {
    pub id: String,
    pub service_configuration_id: String,
    pub name: String,
    pub title_associations: Vec<TitleAssociation>,
    pub progress_state: ProgressState,
    pub progression: Progression,
    pub media_assets: Vec<MediaAsset>,
    pub platforms_available_on: Vec<String>,
    pub is_secret: bool,
    pub unlocked_description: String,
    pub locked_description: String,
    pub product_id: String,
    pub achievement_type: AchievementType,
    pub participation_type: ParticipationType,
    pub available: TimeWindow,
    pub rewards: Vec<Reward>,
    /// Estimated seconds to unlock.
    pub estimated_unlock_time: u64,
    pub deep_link: String,
    pub is_revoked: bool,
}

impl Achievement {
    /// Create an achievement with the given identity and no requirements.
    pub fn new(
        id: impl Into<String>,
        service_configuration_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service_configuration_id: service_configuration_id.into(),
            name: name.into(),
            progress_state: ProgressState::NotStarted,
            achievement_type: AchievementType::Persistent,
            participation_type: ParticipationType::Individual,
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: ProgressState) -> Self {
        self.progress_state = state;
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.progression.requirements.push(requirement);
        self
    }

    pub fn with_time_unlocked(mut self, time: Timestamp) -> Self {
        self.progression.time_unlocked = Some(time);
        self
    }

    pub fn with_title_association(mut self, name: impl Into<String>, title_id: u32) -> Self {
        self.title_associations.push(TitleAssociation {
            name: name.into(),
            title_id,
        });
        self
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.progression.requirements
    }

    pub fn time_unlocked(&self) -> Option<Timestamp> {
        self.progression.time_unlocked
    }

    pub fn is_achieved(&self) -> bool {
        self.progress_state == ProgressState::Achieved
    }

    /// Find a requirement by id, ignoring ASCII case.
    pub fn requirement(&self, id: &str) -> Option<&Requirement> {
        self.progression.requirements.iter().find(|r| r.matches_id(id))
    }

    /// Mutable variant of [`Achievement::requirement`].
    pub fn requirement_mut(&mut self, id: &str) -> Option<&mut Requirement> {
        self.progression
            .requirements
            .iter_mut()
            .find(|r| r.matches_id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample() -> Achievement {
        Achievement::new("1", "scid-1", "First Steps")
            .with_state(ProgressState::InProgress)
            .with_requirement(Requirement::new("Req-A", "20", "100"))
            .with_title_association("Sample Title", 1234)
    }

    #[test]
    fn test_requirement_lookup_ignores_case() {
        let achievement = sample();
        assert!(achievement.requirement("req-a").is_some());
        assert!(achievement.requirement("REQ-A").is_some());
        assert!(achievement.requirement("req-b").is_none());
    }

    #[test]
    fn test_requirement_completion_is_string_equality() {
        assert!(Requirement::new("r", "100", "100").is_complete());
        assert!(!Requirement::new("r", "99", "100").is_complete());
    }

    #[test]
    fn test_achievement_serializes_camel_case() {
        let achievement = sample().with_time_unlocked(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        let json = serde_json::to_value(&achievement).unwrap();
        assert_eq!(json["serviceConfigurationId"], "scid-1");
        assert_eq!(json["progressState"], "InProgress");
        assert_eq!(json["progression"]["requirements"][0]["currentProgressValue"], "20");
        assert!(json["progression"]["timeUnlocked"].is_string());
    }

    #[test]
    fn test_achievement_deserializes_with_missing_display_fields() {
        let json = r#"{
            "id": "7",
            "progressState": "NotStarted",
            "progression": { "requirements": [
                { "id": "r1", "currentProgressValue": "0", "targetProgressValue": "100" }
            ] }
        }"#;
        let achievement: Achievement = serde_json::from_str(json).unwrap();
        assert_eq!(achievement.id, "7");
        assert_eq!(achievement.requirements().len(), 1);
        assert_eq!(achievement.time_unlocked(), None);
        assert!(achievement.rewards.is_empty());
    }
}
