//! Laurel Test Utilities
//!
//! Shared test infrastructure for the Laurel workspace:
//! - Fixtures for sample title catalogs and notifications
//! - Proptest generators for achievement types
//! - Assertions on the error taxonomy
//! - Tracing setup and async polling helpers

// Re-export the in-memory collaborators from their source crate
pub use laurel_service::{InMemoryRealTimeActivity, MockAchievementService, SubmittedUpdate};

// Re-export core types for convenience
pub use laurel_core::{
    Achievement, AchievementsManagerEvent, AchievementsManagerEventType, ErrorKind, LaurelError,
    LaurelResult, ManagerConfig, ProgressChangeEntry, ProgressState, Requirement,
    RequirementProgress, Timestamp, Xuid,
};

use std::time::Duration;

// ============================================================================
// TRACING
// ============================================================================

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// ASYNC HELPERS
// ============================================================================

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let step = Duration::from_millis(5);
    let mut waited = Duration::ZERO;
    loop {
        if condition() {
            return true;
        }
        if waited >= timeout {
            return false;
        }
        tokio::time::sleep(step).await;
        waited += step;
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Sample data for common scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};

    pub const SAMPLE_TITLE_ID: u32 = 1_234_567;
    pub const SAMPLE_SCID: &str = "00000000-0000-0000-0000-0000001e240f";

    /// Timestamp at `hour` on a fixed day.
    pub fn at_hour(hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn sample_config() -> ManagerConfig {
        ManagerConfig::new(SAMPLE_TITLE_ID, SAMPLE_SCID)
    }

    /// Single-requirement achievement with a percentage target.
    pub fn percent_achievement(id: &str, current: u32, state: ProgressState) -> Achievement {
        let mut achievement = Achievement::new(id, SAMPLE_SCID, format!("Achievement {}", id))
            .with_state(state)
            .with_title_association("Sample Title", SAMPLE_TITLE_ID)
            .with_requirement(Requirement::new(
                format!("req-{}", id),
                current.to_string(),
                "100",
            ));
        achievement.locked_description = "Keep playing".to_string();
        achievement.unlocked_description = "Well played".to_string();
        achievement
    }

    /// Achievement with one requirement per `(id, current, target)`.
    pub fn multi_requirement_achievement(id: &str, requirements: &[(&str, &str, &str)]) -> Achievement {
        requirements.iter().fold(
            Achievement::new(id, SAMPLE_SCID, format!("Achievement {}", id))
                .with_state(ProgressState::InProgress),
            |a, (rid, current, target)| a.with_requirement(Requirement::new(*rid, *current, *target)),
        )
    }

    /// Five achievements: "1".."3" not started, "4" at 20/100, "5" unlocked.
    pub fn sample_catalog() -> Vec<Achievement> {
        vec![
            percent_achievement("1", 0, ProgressState::NotStarted),
            percent_achievement("2", 0, ProgressState::NotStarted),
            percent_achievement("3", 0, ProgressState::NotStarted),
            percent_achievement("4", 20, ProgressState::InProgress),
            percent_achievement("5", 100, ProgressState::Achieved).with_time_unlocked(at_hour(8)),
        ]
    }

    /// Catalog of `count` not-started percentage achievements with ids "1"..
    pub fn large_catalog(count: usize) -> Vec<Achievement> {
        (1..=count)
            .map(|i| percent_achievement(&i.to_string(), 0, ProgressState::NotStarted))
            .collect()
    }

    /// Progress notification for a single-requirement fixture achievement.
    /// The target is left out, as the service does for non-unlocking updates.
    pub fn percent_notification(id: &str, current: u32, state: ProgressState) -> ProgressChangeEntry {
        ProgressChangeEntry::new(id, state)
            .with_requirement(RequirementProgress::new(format!("req-{}", id), current.to_string()))
    }

    /// Parse a JSON array of achievements in the service's camelCase shape.
    pub fn catalog_from_json(json: &str) -> Result<Vec<Achievement>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse a JSON array of progress notification entries.
    pub fn notifications_from_json(json: &str) -> Result<Vec<ProgressChangeEntry>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Laurel types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_xuid() -> impl Strategy<Value = Xuid> {
        any::<u64>().prop_map(Xuid::new)
    }

    /// A state other than `Unknown`.
    pub fn arb_progress_state() -> impl Strategy<Value = ProgressState> {
        prop_oneof![
            Just(ProgressState::NotStarted),
            Just(ProgressState::InProgress),
            Just(ProgressState::Achieved),
        ]
    }

    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-2030
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(chrono::Utc::now)
        })
    }

    /// Progress value in any of the representations the comparator accepts.
    pub fn arb_progress_value() -> impl Strategy<Value = String> {
        prop_oneof![
            any::<u32>().prop_map(|v| v.to_string()),
            any::<i32>().prop_map(|v| v.to_string()),
            (-1000.0f64..1000.0).prop_map(|v| v.to_string()),
            "[a-z]{1,6}",
        ]
    }

    /// Percentage achievement consistent with its state.
    pub fn arb_percent_achievement(id: String) -> impl Strategy<Value = Achievement> {
        (arb_progress_state(), 0u32..100, arb_timestamp()).prop_map(move |(state, current, time)| {
            let current = match state {
                ProgressState::Achieved => 100,
                ProgressState::NotStarted => 0,
                _ => current.max(1),
            };
            let achievement = fixtures::percent_achievement(&id, current, state);
            if state == ProgressState::Achieved {
                achievement.with_time_unlocked(time)
            } else {
                achievement
            }
        })
    }

    /// Catalog of 1..=max percentage achievements with unique ids.
    pub fn arb_catalog(max: usize) -> impl Strategy<Value = Vec<Achievement>> {
        (1..=max.max(1)).prop_flat_map(|len| {
            (1..=len)
                .map(|i| arb_percent_achievement(i.to_string()))
                .collect::<Vec<_>>()
        })
    }

    /// Progress notification for one of the ids "1"..=max_id.
    pub fn arb_percent_notification(max_id: usize) -> impl Strategy<Value = ProgressChangeEntry> {
        (1..=max_id.max(1), 0u32..=100, arb_progress_state()).prop_map(|(id, current, state)| {
            fixtures::percent_notification(&id.to_string(), current, state)
        })
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on Laurel results and events.

    use super::*;

    /// Assert that a result failed with the given error kind.
    #[track_caller]
    pub fn assert_error_kind<T: std::fmt::Debug>(result: &LaurelResult<T>, kind: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), kind, "Wrong error kind for {:?}", e),
            Ok(value) => panic!("Expected {:?} error, got Ok({:?})", kind, value),
        }
    }

    /// Assert the sequence of `(event type, achievement id)` pairs.
    #[track_caller]
    pub fn assert_event_sequence(
        events: &[AchievementsManagerEvent],
        expected: &[(AchievementsManagerEventType, Option<&str>)],
    ) {
        let actual: Vec<(AchievementsManagerEventType, Option<&str>)> = events
            .iter()
            .map(|e| (e.event_type(), e.achievement_id()))
            .collect();
        assert_eq!(actual, expected, "Unexpected event sequence");
    }
}
