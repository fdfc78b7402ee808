//! Owned achievement records for one user.

use std::cmp::Ordering;
use std::collections::HashMap;

use laurel_core::{Achievement, AchievementOrderBy, LaurelResult, SortFilterSettings, SortOrder};
use tracing::warn;

/// Achievement records of one user in server order, indexed by id.
///
/// Reads hand out owned copies, so snapshots stay stable while the store
/// keeps mutating.
#[derive(Debug, Clone, Default)]
pub struct AchievementStore {
    achievements: Vec<Achievement>,
    index: HashMap<String, usize>,
}

impl AchievementStore {
    /// Build a store from fetched records. A repeated id keeps the first record.
    pub fn new(records: Vec<Achievement>) -> Self {
        let mut achievements = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());
        for record in records {
            if index.contains_key(&record.id) {
                warn!(achievement_id = %record.id, "Duplicate achievement id in fetch, keeping first");
                continue;
            }
            index.insert(record.id.clone(), achievements.len());
            achievements.push(record);
        }
        Self {
            achievements,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.achievements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.achievements.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Achievement> {
        self.index.get(id).and_then(|&i| self.achievements.get(i))
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Achievement> {
        match self.index.get(id) {
            Some(&i) => self.achievements.get_mut(i),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Achievement> {
        self.achievements.iter()
    }

    /// Copy of one record.
    pub fn snapshot(&self, id: &str) -> Option<Achievement> {
        self.get(id).cloned()
    }

    /// Copy of every record in server order.
    pub fn get_all(&self) -> Vec<Achievement> {
        self.achievements.clone()
    }

    /// Copy of the records passing `settings.state_filter`, stable-sorted by
    /// unlock time when requested. Records never unlocked sort first when
    /// ascending and last when descending.
    pub fn get_filtered(&self, settings: &SortFilterSettings) -> LaurelResult<Vec<Achievement>> {
        settings.validate()?;

        let mut records: Vec<Achievement> = self
            .achievements
            .iter()
            .filter(|a| settings.state_filter.matches(a.progress_state))
            .cloned()
            .collect();

        if settings.order_by == AchievementOrderBy::UnlockTime {
            let descending = settings.sort_order == SortOrder::Descending;
            records.sort_by(|a, b| {
                let ordering: Ordering = a.time_unlocked().cmp(&b.time_unlocked());
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use laurel_core::{ProgressState, Requirement, StateFilter};

    fn record(id: &str, state: ProgressState, unlocked_hour: Option<u32>) -> Achievement {
        let mut a = Achievement::new(id, "scid", id)
            .with_state(state)
            .with_requirement(Requirement::new("r", "0", "100"));
        if let Some(hour) = unlocked_hour {
            a = a.with_time_unlocked(Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap());
        }
        a
    }

    fn store() -> AchievementStore {
        AchievementStore::new(vec![
            record("1", ProgressState::Achieved, Some(9)),
            record("2", ProgressState::NotStarted, None),
            record("3", ProgressState::Achieved, Some(3)),
            record("4", ProgressState::InProgress, None),
            record("5", ProgressState::Achieved, Some(6)),
        ])
    }

    fn ids(records: &[Achievement]) -> Vec<&str> {
        records.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_lookup_and_snapshot_is_a_copy() {
        let mut store = store();
        let snapshot = store.snapshot("4").unwrap();
        store.get_mut("4").unwrap().progress_state = ProgressState::Achieved;
        assert_eq!(snapshot.progress_state, ProgressState::InProgress);
        assert!(store.get("4").unwrap().is_achieved());
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let store = AchievementStore::new(vec![
            record("1", ProgressState::NotStarted, None),
            record("1", ProgressState::Achieved, Some(1)),
        ]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1").unwrap().progress_state, ProgressState::NotStarted);
    }

    #[test]
    fn test_get_all_keeps_server_order() {
        assert_eq!(ids(&store().get_all()), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_filter_by_state() {
        let store = store();
        let unlocked = store
            .get_filtered(&SortFilterSettings::unsorted(StateFilter::Unlocked))
            .unwrap();
        assert_eq!(ids(&unlocked), vec!["1", "3", "5"]);
        let not_started = store
            .get_filtered(&SortFilterSettings::unsorted(StateFilter::NotStarted))
            .unwrap();
        assert_eq!(ids(&not_started), vec!["2"]);
    }

    #[test]
    fn test_sort_by_unlock_time() {
        let store = store();
        let asc = store
            .get_filtered(&SortFilterSettings::by_unlock_time(SortOrder::Ascending, StateFilter::Unlocked))
            .unwrap();
        assert_eq!(ids(&asc), vec!["3", "5", "1"]);
        let desc = store
            .get_filtered(&SortFilterSettings::by_unlock_time(SortOrder::Descending, StateFilter::All))
            .unwrap();
        assert_eq!(ids(&desc), vec!["1", "5", "3", "2", "4"]);
    }

    #[test]
    fn test_invalid_sort_rejected() {
        let settings = SortFilterSettings::new(
            AchievementOrderBy::DefaultOrder,
            SortOrder::Ascending,
            StateFilter::All,
        );
        assert!(store().get_filtered(&settings).is_err());
    }
}
