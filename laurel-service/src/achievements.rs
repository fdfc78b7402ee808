//! Achievement service boundary.

use async_trait::async_trait;
use laurel_core::{Achievement, AchievementOrderBy, AchievementType, LaurelResult, Xuid};

/// Parameters of a paged achievement fetch.
///
/// The cache always asks for every achievement type, locked and unlocked,
/// in the service's default order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementsQuery {
    pub xuid: Xuid,
    pub title_id: u32,
    pub achievement_type: AchievementType,
    pub unlocked_only: bool,
    pub order_by: AchievementOrderBy,
    pub skip_items: u32,
    pub max_items: u32,
}

impl AchievementsQuery {
    /// Query for the full catalog of one user.
    pub fn all_for_user(xuid: Xuid, title_id: u32, max_items: u32) -> Self {
        Self {
            xuid,
            title_id,
            achievement_type: AchievementType::All,
            unlocked_only: false,
            order_by: AchievementOrderBy::DefaultOrder,
            skip_items: 0,
            max_items,
        }
    }
}

/// One page of fetched achievements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AchievementsPage {
    pub achievements: Vec<Achievement>,
    /// Cursor for the next page, `None` on the last page.
    pub continuation_token: Option<String>,
}

impl AchievementsPage {
    pub fn has_next(&self) -> bool {
        self.continuation_token.is_some()
    }
}

/// Remote achievement service.
///
/// Both calls are asynchronous; the cache never awaits them on the title's
/// thread.
#[async_trait]
pub trait AchievementService: Send + Sync {
    /// Fetch one page. `continuation` is `None` for the first page.
    async fn fetch_page(
        &self,
        query: &AchievementsQuery,
        continuation: Option<&str>,
    ) -> LaurelResult<AchievementsPage>;

    /// Submit a percentage update for a single-requirement achievement.
    async fn submit_update(
        &self,
        xuid: Xuid,
        title_id: u32,
        service_configuration_id: &str,
        achievement_id: &str,
        percent: u32,
    ) -> LaurelResult<()>;
}
