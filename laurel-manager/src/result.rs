//! Reference-counted achievement snapshots handed to titles.

use std::ops::Deref;
use std::sync::Arc;

use laurel_core::Achievement;

/// Immutable snapshot of zero or more achievements.
///
/// The records are copies taken under the cache lock; the cache never
/// writes into them. [`AchievementsResult::duplicate`] shares the snapshot
/// and the last handle to be closed or dropped frees it.
#[derive(Debug)]
pub struct AchievementsResult {
    achievements: Arc<[Achievement]>,
}

impl AchievementsResult {
    pub fn new(achievements: Vec<Achievement>) -> Self {
        Self {
            achievements: achievements.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Another handle to the same snapshot.
    pub fn duplicate(&self) -> Self {
        Self {
            achievements: Arc::clone(&self.achievements),
        }
    }

    /// Release this handle.
    pub fn close(self) {}

    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    /// Number of live handles sharing this snapshot.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.achievements)
    }

    pub fn into_vec(self) -> Vec<Achievement> {
        self.achievements.to_vec()
    }
}

impl Deref for AchievementsResult {
    type Target = [Achievement];

    fn deref(&self) -> &Self::Target {
        &self.achievements
    }
}

impl<'a> IntoIterator for &'a AchievementsResult {
    type Item = &'a Achievement;
    type IntoIter = std::slice::Iter<'a, Achievement>;

    fn into_iter(self) -> Self::IntoIter {
        self.achievements.iter()
    }
}
