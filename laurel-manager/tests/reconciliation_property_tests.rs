//! Property tests for the store queries and the reconciliation rules.

use laurel_core::{
    classify, parse_progress_lenient, should_update_progress, AchievementOrderBy,
    AchievementsManagerEvent, ErrorKind, ProgressState, ProgressValueType, SortFilterSettings,
    SortOrder, StateFilter, Xuid,
};
use laurel_manager::reconcile::{merge_events, validate_update};
use laurel_manager::AchievementStore;
use laurel_test_utils::generators::*;
use proptest::prelude::*;

fn ids(records: &[laurel_core::Achievement]) -> Vec<String> {
    records.iter().map(|a| a.id.clone()).collect()
}

fn arb_state_filter() -> impl Strategy<Value = StateFilter> {
    prop_oneof![
        Just(StateFilter::All),
        Just(StateFilter::Unlocked),
        Just(StateFilter::InProgress),
        Just(StateFilter::NotStarted),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// An unfiltered, unsorted query returns every record in store order.
    #[test]
    fn prop_unfiltered_query_matches_get_all(catalog in arb_catalog(20)) {
        let store = AchievementStore::new(catalog.clone());
        let filtered = store.get_filtered(&SortFilterSettings::default()).unwrap();
        prop_assert_eq!(ids(&filtered), ids(&store.get_all()));
        prop_assert_eq!(ids(&filtered), ids(&catalog));
    }

    /// Sorting by unlock time orders records and keeps every one of them.
    #[test]
    fn prop_unlock_time_sort_is_ordered(
        catalog in arb_catalog(20),
        descending in any::<bool>(),
    ) {
        let store = AchievementStore::new(catalog.clone());
        let direction = if descending { SortOrder::Descending } else { SortOrder::Ascending };
        let settings = SortFilterSettings::new(AchievementOrderBy::UnlockTime, direction, StateFilter::All);
        let sorted = store.get_filtered(&settings).unwrap();

        prop_assert_eq!(sorted.len(), catalog.len());
        for pair in sorted.windows(2) {
            if descending {
                prop_assert!(pair[0].time_unlocked() >= pair[1].time_unlocked());
            } else {
                prop_assert!(pair[0].time_unlocked() <= pair[1].time_unlocked());
            }
        }

        let mut expected = ids(&catalog);
        let mut actual = ids(&sorted);
        expected.sort();
        actual.sort();
        prop_assert_eq!(actual, expected);
    }

    /// A state filter returns exactly the matching records.
    #[test]
    fn prop_state_filter_is_exact(catalog in arb_catalog(20), filter in arb_state_filter()) {
        let store = AchievementStore::new(catalog.clone());
        let settings = SortFilterSettings::new(AchievementOrderBy::DefaultOrder, SortOrder::Unsorted, filter);
        let filtered = store.get_filtered(&settings).unwrap();

        prop_assert!(filtered.iter().all(|a| filter.matches(a.progress_state)));
        let expected = catalog.iter().filter(|a| filter.matches(a.progress_state)).count();
        prop_assert_eq!(filtered.len(), expected);
    }

    /// Merging any notifications never regresses state or progress.
    #[test]
    fn prop_merge_is_monotonic(
        xuid in arb_xuid(),
        catalog in arb_catalog(10),
        notifications in prop::collection::vec(arb_percent_notification(10), 0..20),
    ) {
        let before = AchievementStore::new(catalog.clone());
        let mut store = AchievementStore::new(catalog);
        let events = notifications
            .into_iter()
            .map(|progress| AchievementsManagerEvent::AchievementProgressUpdated { xuid, progress });
        let published = merge_events(xuid, &mut store, events);

        for old in before.iter() {
            let new = store.get(&old.id).unwrap();
            if old.is_achieved() {
                prop_assert!(new.is_achieved());
            }
            if old.progress_state == ProgressState::InProgress {
                prop_assert_ne!(new.progress_state, ProgressState::NotStarted);
            }
            let old_value = parse_progress_lenient(&old.requirements()[0].current_progress_value);
            let new_value = parse_progress_lenient(&new.requirements()[0].current_progress_value);
            prop_assert!(new_value >= old_value);
            if new.is_achieved() {
                prop_assert!(new.time_unlocked().is_some());
            }
        }

        // every unlock follows a progress event for the same achievement
        for (i, event) in published.iter().enumerate() {
            if let AchievementsManagerEvent::AchievementUnlocked { progress, .. } = event {
                prop_assert!(i > 0);
                prop_assert_eq!(published[i - 1].achievement_id(), Some(progress.achievement_id.as_str()));
            }
        }
    }

    /// An update is accepted exactly when it moves an unlocked-pending
    /// achievement forward.
    #[test]
    fn prop_update_gating(catalog in arb_catalog(10), index in any::<prop::sample::Index>(), percent in 0u32..=100) {
        let store = AchievementStore::new(catalog.clone());
        let target = index.get(&catalog);
        let current = parse_progress_lenient(&target.requirements()[0].current_progress_value);
        let result = validate_update(Xuid::new(8), &store, &target.id, percent);

        if target.is_achieved() {
            prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidState);
        } else if percent <= current {
            prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    /// The comparator is a pure function of its inputs and numeric values
    /// never update to themselves.
    #[test]
    fn prop_comparator_is_deterministic(new in arb_progress_value(), current in arb_progress_value()) {
        prop_assert_eq!(
            should_update_progress(&new, &current),
            should_update_progress(&new, &current)
        );
        if classify(&new) != ProgressValueType::NonNumeric {
            prop_assert!(!should_update_progress(&new, &new));
        }
    }

    /// Between unsigned values at most one direction is an update.
    #[test]
    fn prop_comparator_is_antisymmetric_for_unsigned(a in any::<u32>(), b in any::<u32>()) {
        let (a, b) = (a.to_string(), b.to_string());
        prop_assert!(!(should_update_progress(&a, &b) && should_update_progress(&b, &a)));
        prop_assert_eq!(should_update_progress(&a, &b), parse_progress_lenient(&a) > parse_progress_lenient(&b));
    }
}
