//! Reconciliation of notifications and resync fetches against cached state.
//!
//! Everything here is synchronous and runs under the owning cache's lock.

use std::collections::VecDeque;

use chrono::Utc;
use laurel_core::{
    parse_progress_lenient, should_update_progress, Achievement, AchievementsManagerEvent,
    CacheError, LaurelResult, ProgressChangeEntry, ProgressState, RequirementProgress,
    ValidationError, Xuid,
};
use tracing::{debug, error, warn};

use crate::store::AchievementStore;

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Fill in target values missing from a progress notification.
///
/// Targets come from the cached requirement with the same id. A requirement
/// with no cached counterpart keeps a `None` target.
pub fn backfill_targets(xuid: Xuid, store: &AchievementStore, entry: &mut ProgressChangeEntry) {
    let cached = store.get(&entry.achievement_id);
    for requirement in entry
        .requirements
        .iter_mut()
        .filter(|r| r.target_progress_value.is_none())
    {
        match cached.and_then(|a| a.requirement(&requirement.id)) {
            Some(found) => {
                requirement.target_progress_value = Some(found.target_progress_value.clone());
            }
            None => error!(
                xuid = %xuid,
                achievement_id = %entry.achievement_id,
                requirement_id = %requirement.id,
                "No cached requirement to take the target value from"
            ),
        }
    }
}

// ============================================================================
// MERGE
// ============================================================================

/// Merge queued events into the store and return the events to publish.
///
/// Unlock events synthesized while merging are processed in the same pass
/// and published immediately after the progress event that caused them.
/// Events for achievements the store does not know are dropped.
pub fn merge_events<I>(xuid: Xuid, store: &mut AchievementStore, events: I) -> Vec<AchievementsManagerEvent>
where
    I: IntoIterator<Item = AchievementsManagerEvent>,
{
    let mut work: VecDeque<AchievementsManagerEvent> = events.into_iter().collect();
    let mut published = Vec::with_capacity(work.len());

    while let Some(event) = work.pop_front() {
        match &event {
            AchievementsManagerEvent::AchievementProgressUpdated { progress, .. } => {
                let Some(cached) = store.get_mut(&progress.achievement_id) else {
                    warn!(
                        xuid = %xuid,
                        achievement_id = %progress.achievement_id,
                        "Progress event for unknown achievement dropped"
                    );
                    continue;
                };
                if let Some(unlock) = merge_progress(xuid, cached, progress) {
                    work.push_front(AchievementsManagerEvent::AchievementUnlocked {
                        xuid,
                        progress: unlock,
                    });
                }
            }
            AchievementsManagerEvent::AchievementUnlocked { progress, .. } => {
                let Some(cached) = store.get_mut(&progress.achievement_id) else {
                    warn!(
                        xuid = %xuid,
                        achievement_id = %progress.achievement_id,
                        "Unlock event for unknown achievement dropped"
                    );
                    continue;
                };
                apply_unlock(cached, progress);
            }
            AchievementsManagerEvent::LocalUserInitialStateSynced { .. } => {}
        }
        published.push(event);
    }

    published
}

/// Apply one progress change. Returns the unlock to synthesize, if any.
pub fn merge_progress(
    xuid: Xuid,
    cached: &mut Achievement,
    progress: &ProgressChangeEntry,
) -> Option<ProgressChangeEntry> {
    if progress.requirements.len() != cached.requirements().len() {
        error!(
            xuid = %xuid,
            achievement_id = %cached.id,
            incoming = progress.requirements.len(),
            cached = cached.requirements().len(),
            "Requirement count mismatch"
        );
    }

    if !cached.is_achieved() && progress.progress_state == ProgressState::InProgress {
        cached.progress_state = ProgressState::InProgress;
    }

    let reported_achieved = progress.progress_state == ProgressState::Achieved;
    let should_unlock = if cached.requirements().len() == 1 {
        let requirement = &mut cached.progression.requirements[0];
        let mut updated = false;
        if let Some(incoming) = progress.requirements.first() {
            if !requirement.matches_id(&incoming.id) {
                error!(
                    xuid = %xuid,
                    achievement_id = %progress.achievement_id,
                    cached = %requirement.id,
                    incoming = %incoming.id,
                    "Requirement id mismatch"
                );
            }
            if should_update_progress(
                &incoming.current_progress_value,
                &requirement.current_progress_value,
            ) {
                requirement.current_progress_value = incoming.current_progress_value.clone();
                updated = true;
            }
        }
        (updated && requirement.is_complete()) || reported_achieved
    } else {
        let achievement_id = cached.id.clone();
        for incoming in &progress.requirements {
            match cached.requirement_mut(&incoming.id) {
                Some(requirement) => {
                    if should_update_progress(
                        &incoming.current_progress_value,
                        &requirement.current_progress_value,
                    ) {
                        requirement.current_progress_value = incoming.current_progress_value.clone();
                    }
                }
                None => error!(
                    xuid = %xuid,
                    achievement_id = %achievement_id,
                    requirement_id = %incoming.id,
                    "Progress event names a requirement the cache does not have"
                ),
            }
        }
        let all_complete = !cached.requirements().is_empty()
            && cached.requirements().iter().all(|r| r.is_complete());
        all_complete || reported_achieved
    };

    if should_unlock && !cached.is_achieved() {
        let time_unlocked = progress.time_unlocked.unwrap_or_else(Utc::now);
        debug!(xuid = %xuid, achievement_id = %cached.id, "Synthesizing unlock");
        Some(ProgressChangeEntry::unlocked(cached.id.clone(), Some(time_unlocked)))
    } else {
        None
    }
}

/// Mark an achievement unlocked and drive every requirement to its target.
pub fn apply_unlock(cached: &mut Achievement, unlock: &ProgressChangeEntry) {
    cached.progress_state = ProgressState::Achieved;
    cached.progression.time_unlocked = Some(unlock.time_unlocked.unwrap_or_else(Utc::now));
    for requirement in &mut cached.progression.requirements {
        requirement.current_progress_value = requirement.target_progress_value.clone();
    }
}

// ============================================================================
// RESYNC
// ============================================================================

/// Diff a fresh fetch against the store.
///
/// Yields one progress event per achievement with at least one requirement
/// whose fetched value is greater. Values are read as plain unsigned
/// integers here, not through the typed comparator.
pub fn diff_fetched(
    xuid: Xuid,
    store: &AchievementStore,
    fetched: &[Achievement],
) -> Vec<AchievementsManagerEvent> {
    let mut events = Vec::new();

    for server in fetched {
        let Some(cached) = store.get(&server.id) else {
            warn!(
                xuid = %xuid,
                achievement_id = %server.id,
                "Resync returned an achievement missing from the cache"
            );
            continue;
        };

        let mut progress = ProgressChangeEntry::new(server.id.clone(), server.progress_state);
        progress.time_unlocked = server.time_unlocked();

        for requirement in server.requirements() {
            let Some(local) = cached.requirement(&requirement.id) else {
                error!(
                    xuid = %xuid,
                    achievement_id = %server.id,
                    requirement_id = %requirement.id,
                    "Resync requirement missing from the cache"
                );
                continue;
            };
            if parse_progress_lenient(&local.current_progress_value)
                < parse_progress_lenient(&requirement.current_progress_value)
            {
                progress.requirements.push(
                    RequirementProgress::new(
                        requirement.id.clone(),
                        requirement.current_progress_value.clone(),
                    )
                    .with_target(requirement.target_progress_value.clone()),
                );
            }
        }

        if !progress.requirements.is_empty() {
            events.push(AchievementsManagerEvent::AchievementProgressUpdated { xuid, progress });
        }
    }

    events
}

/// Whether `candidate` already has an equivalent event in `pending`.
///
/// Equivalent means the same event type, achievement, state and unlock
/// time, the same requirements with the same targets, and no requirement
/// of the candidate ahead of the pending one.
pub fn is_duplicate<'a, I>(candidate: &AchievementsManagerEvent, pending: I) -> bool
where
    I: IntoIterator<Item = &'a AchievementsManagerEvent>,
{
    let Some(new) = candidate.progress() else {
        return false;
    };

    pending.into_iter().any(|existing| {
        if existing.event_type() != candidate.event_type() {
            return false;
        }
        let Some(old) = existing.progress() else {
            return false;
        };
        old.achievement_id == new.achievement_id
            && old.progress_state == new.progress_state
            && old.time_unlocked == new.time_unlocked
            && old.requirements.len() == new.requirements.len()
            && new.requirements.iter().zip(&old.requirements).all(|(n, o)| {
                n.id.eq_ignore_ascii_case(&o.id)
                    && n.target_progress_value == o.target_progress_value
                    && !should_update_progress(&n.current_progress_value, &o.current_progress_value)
            })
    })
}

// ============================================================================
// OPTIMISTIC UPDATE
// ============================================================================

/// Check that `percent` may be submitted for `achievement_id`.
///
/// Only unlocked-pending, single-requirement achievements with a target of
/// 100 can be advanced, and only forward.
pub fn validate_update(
    xuid: Xuid,
    store: &AchievementStore,
    achievement_id: &str,
    percent: u32,
) -> LaurelResult<()> {
    let achievement = store
        .get(achievement_id)
        .ok_or_else(|| CacheError::AchievementNotFound {
            xuid,
            achievement_id: achievement_id.to_string(),
        })?;

    if achievement.is_achieved() {
        return Err(ValidationError::AlreadyUnlocked {
            achievement_id: achievement_id.to_string(),
        }
        .into());
    }

    let [requirement] = achievement.requirements() else {
        return Err(ValidationError::UnsupportedAchievement {
            achievement_id: achievement_id.to_string(),
            reason: format!(
                "expected exactly one requirement, found {}",
                achievement.requirements().len()
            ),
        }
        .into());
    };

    if parse_progress_lenient(&requirement.target_progress_value) != 100 {
        return Err(ValidationError::UnsupportedAchievement {
            achievement_id: achievement_id.to_string(),
            reason: format!(
                "target {} is not a percentage",
                requirement.target_progress_value
            ),
        }
        .into());
    }

    let current = parse_progress_lenient(&requirement.current_progress_value);
    if percent <= current {
        return Err(ValidationError::ProgressNotGreater {
            achievement_id: achievement_id.to_string(),
            current,
            requested: percent,
        }
        .into());
    }

    Ok(())
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use laurel_core::Requirement;
    use proptest::prelude::*;

    fn arb_state() -> impl Strategy<Value = ProgressState> {
        prop_oneof![
            Just(ProgressState::NotStarted),
            Just(ProgressState::InProgress),
            Just(ProgressState::Achieved),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_multi_requirement_update_always_unsupported(percent in 0u32..=100) {
            let store = AchievementStore::new(vec![
                Achievement::new("m", "scid", "m")
                    .with_requirement(Requirement::new("a", "0", "100"))
                    .with_requirement(Requirement::new("b", "0", "100")),
            ]);
            let err = validate_update(Xuid::new(1), &store, "m", percent).unwrap_err();
            prop_assert_eq!(err.kind(), laurel_core::ErrorKind::NotSupported);
        }

        #[test]
        fn prop_achieved_update_always_invalid_state(percent in 0u32..=100) {
            let store = AchievementStore::new(vec![
                Achievement::new("a", "scid", "a")
                    .with_state(ProgressState::Achieved)
                    .with_requirement(Requirement::new("r", "100", "100")),
            ]);
            let err = validate_update(Xuid::new(1), &store, "a", percent).unwrap_err();
            prop_assert_eq!(err.kind(), laurel_core::ErrorKind::InvalidState);
        }

        #[test]
        fn prop_merge_never_leaves_achieved(
            steps in proptest::collection::vec((arb_state(), 0u32..=100), 1..20)
        ) {
            let xuid = Xuid::new(1);
            let mut store = AchievementStore::new(vec![
                Achievement::new("x", "scid", "x")
                    .with_requirement(Requirement::new("r", "0", "100")),
            ]);
            let mut was_achieved = false;
            for (state, value) in steps {
                let event = AchievementsManagerEvent::AchievementProgressUpdated {
                    xuid,
                    progress: ProgressChangeEntry::new("x", state)
                        .with_requirement(RequirementProgress::new("r", value.to_string())),
                };
                merge_events(xuid, &mut store, vec![event]);
                let achieved = store.get("x").unwrap().is_achieved();
                prop_assert!(!(was_achieved && !achieved));
                was_achieved = achieved;
            }
        }
    }
}
