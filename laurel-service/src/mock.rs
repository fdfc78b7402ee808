//! In-memory implementations of the service boundaries.
//!
//! `MockAchievementService` serves per-user catalogs with offset paging and
//! optional failure injection. `InMemoryRealTimeActivity` keeps a handler
//! registry and lets callers publish notifications directly.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use laurel_core::{
    parse_progress_lenient, Achievement, CacheError, ConnectionState, LaurelResult,
    ProgressChangeEntry, ProgressState, ServiceError, SubscriptionToken, Xuid,
};
use tracing::{debug, error};

use crate::achievements::{AchievementService, AchievementsPage, AchievementsQuery};
use crate::rta::{ConnectionStateHandler, ProgressHandler, RealTimeActivity, ResyncHandler};

// ============================================================================
// MOCK ACHIEVEMENT SERVICE
// ============================================================================

/// A progress update received by [`MockAchievementService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedUpdate {
    pub xuid: Xuid,
    pub title_id: u32,
    pub service_configuration_id: String,
    pub achievement_id: String,
    pub percent: u32,
}

#[derive(Debug, Default)]
struct MockServiceState {
    catalogs: HashMap<Xuid, Vec<Achievement>>,
    /// Fail every fetch whose page index is at least this value.
    fail_fetch_from_page: Option<usize>,
    fail_updates: bool,
    fetch_delay: Option<Duration>,
    fetch_count: usize,
    submitted: Vec<SubmittedUpdate>,
}

/// Achievement service backed by in-memory catalogs.
///
/// Continuation tokens are decimal offsets into the user's catalog.
#[derive(Debug, Default)]
pub struct MockAchievementService {
    state: Mutex<MockServiceState>,
}

impl MockAchievementService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> LaurelResult<MutexGuard<'_, MockServiceState>> {
        self.state
            .lock()
            .map_err(|_| CacheError::LockPoisoned.into())
    }

    /// Replace the authoritative catalog for a user.
    pub fn set_catalog(&self, xuid: Xuid, achievements: Vec<Achievement>) -> LaurelResult<()> {
        self.state()?.catalogs.insert(xuid, achievements);
        Ok(())
    }

    /// Current authoritative catalog for a user.
    pub fn catalog(&self, xuid: Xuid) -> LaurelResult<Vec<Achievement>> {
        Ok(self.state()?.catalogs.get(&xuid).cloned().unwrap_or_default())
    }

    /// Fail every fetch.
    pub fn fail_fetches(&self) -> LaurelResult<()> {
        self.fail_fetches_from_page(0)
    }

    /// Fail fetches of page `page` and beyond; earlier pages succeed.
    pub fn fail_fetches_from_page(&self, page: usize) -> LaurelResult<()> {
        self.state()?.fail_fetch_from_page = Some(page);
        Ok(())
    }

    pub fn clear_fetch_failure(&self) -> LaurelResult<()> {
        self.state()?.fail_fetch_from_page = None;
        Ok(())
    }

    pub fn fail_updates(&self, fail: bool) -> LaurelResult<()> {
        self.state()?.fail_updates = fail;
        Ok(())
    }

    /// Delay every page fetch by `delay`.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) -> LaurelResult<()> {
        self.state()?.fetch_delay = delay;
        Ok(())
    }

    /// Number of page fetches served or failed so far.
    pub fn fetch_count(&self) -> LaurelResult<usize> {
        Ok(self.state()?.fetch_count)
    }

    pub fn submitted_updates(&self) -> LaurelResult<Vec<SubmittedUpdate>> {
        Ok(self.state()?.submitted.clone())
    }

    /// Apply a change to the authoritative catalog, as the service would
    /// after accepting progress from another source.
    pub fn apply_progress(&self, xuid: Xuid, entry: &ProgressChangeEntry) -> LaurelResult<()> {
        let mut state = self.state()?;
        let achievement = state
            .catalogs
            .get_mut(&xuid)
            .and_then(|catalog| catalog.iter_mut().find(|a| a.id == entry.achievement_id))
            .ok_or_else(|| CacheError::AchievementNotFound {
                xuid,
                achievement_id: entry.achievement_id.clone(),
            })?;

        for change in &entry.requirements {
            if let Some(requirement) = achievement.requirement_mut(&change.id) {
                requirement.current_progress_value = change.current_progress_value.clone();
            }
        }
        if entry.progress_state == ProgressState::Achieved {
            for requirement in &mut achievement.progression.requirements {
                requirement.current_progress_value = requirement.target_progress_value.clone();
            }
            achievement.progression.time_unlocked = Some(entry.time_unlocked.unwrap_or_else(Utc::now));
        }
        achievement.progress_state = entry.progress_state;
        Ok(())
    }
}

#[async_trait]
impl AchievementService for MockAchievementService {
    async fn fetch_page(
        &self,
        query: &AchievementsQuery,
        continuation: Option<&str>,
    ) -> LaurelResult<AchievementsPage> {
        let delay = self.state()?.fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let offset = match continuation {
            Some(token) => token.parse::<usize>().map_err(|_| ServiceError::FetchFailed {
                xuid: query.xuid,
                reason: format!("malformed continuation token: {}", token),
            })?,
            None => query.skip_items as usize,
        };
        let page_size = query.max_items.max(1) as usize;

        let mut state = self.state()?;
        state.fetch_count += 1;

        let page_index = offset / page_size;
        if matches!(state.fail_fetch_from_page, Some(from) if page_index >= from) {
            return Err(ServiceError::FetchFailed {
                xuid: query.xuid,
                reason: format!("injected failure on page {}", page_index),
            }
            .into());
        }

        let catalog = state.catalogs.get(&query.xuid).map(Vec::as_slice).unwrap_or(&[]);
        let end = (offset + page_size).min(catalog.len());
        let achievements = catalog.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();
        let continuation_token = (end < catalog.len()).then(|| end.to_string());

        debug!(
            xuid = %query.xuid,
            page = page_index,
            returned = achievements.len(),
            has_next = continuation_token.is_some(),
            "Served achievements page"
        );

        Ok(AchievementsPage {
            achievements,
            continuation_token,
        })
    }

    async fn submit_update(
        &self,
        xuid: Xuid,
        title_id: u32,
        service_configuration_id: &str,
        achievement_id: &str,
        percent: u32,
    ) -> LaurelResult<()> {
        let mut state = self.state()?;
        if state.fail_updates {
            return Err(ServiceError::UpdateFailed {
                achievement_id: achievement_id.to_string(),
                reason: "injected failure".to_string(),
            }
            .into());
        }

        state.submitted.push(SubmittedUpdate {
            xuid,
            title_id,
            service_configuration_id: service_configuration_id.to_string(),
            achievement_id: achievement_id.to_string(),
            percent,
        });

        let achievement = state
            .catalogs
            .get_mut(&xuid)
            .and_then(|catalog| catalog.iter_mut().find(|a| a.id == achievement_id));
        if let Some(achievement) = achievement {
            if let Some(requirement) = achievement.progression.requirements.first_mut() {
                if percent > parse_progress_lenient(&requirement.current_progress_value) {
                    requirement.current_progress_value = percent.to_string();
                }
                if percent >= parse_progress_lenient(&requirement.target_progress_value) {
                    requirement.current_progress_value = requirement.target_progress_value.clone();
                    achievement.progress_state = ProgressState::Achieved;
                    achievement.progression.time_unlocked = Some(Utc::now());
                } else if achievement.progress_state != ProgressState::Achieved {
                    achievement.progress_state = ProgressState::InProgress;
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY REAL-TIME ACTIVITY
// ============================================================================

#[derive(Default)]
struct UserHandlers {
    progress: BTreeMap<SubscriptionToken, ProgressHandler>,
    resync: BTreeMap<SubscriptionToken, ResyncHandler>,
    connection: BTreeMap<SubscriptionToken, ConnectionStateHandler>,
}

impl UserHandlers {
    fn len(&self) -> usize {
        self.progress.len() + self.resync.len() + self.connection.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&mut self, token: SubscriptionToken) -> bool {
        self.progress.remove(&token).is_some()
            || self.resync.remove(&token).is_some()
            || self.connection.remove(&token).is_some()
    }
}

#[derive(Default)]
struct RtaState {
    next_token: u64,
    users: HashMap<Xuid, UserHandlers>,
    activations: HashMap<Xuid, usize>,
    /// Registrations still allowed before every further one fails.
    subscription_budget: Option<usize>,
}

impl RtaState {
    fn issue_token(&mut self, xuid: Xuid) -> LaurelResult<SubscriptionToken> {
        if let Some(budget) = self.subscription_budget.as_mut() {
            if *budget == 0 {
                return Err(ServiceError::SubscriptionFailed {
                    xuid,
                    reason: "injected subscription failure".to_string(),
                }
                .into());
            }
            *budget -= 1;
        }
        self.next_token += 1;
        Ok(SubscriptionToken::new(self.next_token))
    }
}

/// Real-time activity hub whose notifications are published by the caller.
///
/// Handlers run on the publishing thread after the registry lock has been
/// released, so a handler may add or remove handlers itself.
#[derive(Default)]
pub struct InMemoryRealTimeActivity {
    state: Mutex<RtaState>,
}

impl std::fmt::Debug for InMemoryRealTimeActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRealTimeActivity").finish_non_exhaustive()
    }
}

impl InMemoryRealTimeActivity {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> LaurelResult<MutexGuard<'_, RtaState>> {
        self.state
            .lock()
            .map_err(|_| CacheError::LockPoisoned.into())
    }

    /// Deliver a progress notification to every progress handler of `xuid`.
    /// Returns the number of handlers invoked.
    pub fn publish_progress(&self, xuid: Xuid, entries: &[ProgressChangeEntry]) -> LaurelResult<usize> {
        let handlers: Vec<ProgressHandler> = self
            .state()?
            .users
            .get(&xuid)
            .map(|h| h.progress.values().cloned().collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler(entries);
        }
        Ok(handlers.len())
    }

    /// Ask `xuid`'s handlers to resync.
    pub fn trigger_resync(&self, xuid: Xuid) -> LaurelResult<usize> {
        let handlers: Vec<ResyncHandler> = self
            .state()?
            .users
            .get(&xuid)
            .map(|h| h.resync.values().cloned().collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler();
        }
        Ok(handlers.len())
    }

    /// Ask every registered user to resync.
    pub fn trigger_resync_all(&self) -> LaurelResult<usize> {
        let handlers: Vec<ResyncHandler> = self
            .state()?
            .users
            .values()
            .flat_map(|h| h.resync.values().cloned())
            .collect();
        for handler in &handlers {
            handler();
        }
        Ok(handlers.len())
    }

    pub fn set_connection_state(&self, xuid: Xuid, state: ConnectionState) -> LaurelResult<usize> {
        let handlers: Vec<ConnectionStateHandler> = self
            .state()?
            .users
            .get(&xuid)
            .map(|h| h.connection.values().cloned().collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler(state);
        }
        Ok(handlers.len())
    }

    /// Total handlers registered for `xuid` across all three streams.
    pub fn handler_count(&self, xuid: Xuid) -> LaurelResult<usize> {
        Ok(self.state()?.users.get(&xuid).map(UserHandlers::len).unwrap_or(0))
    }

    pub fn activation_count(&self, xuid: Xuid) -> LaurelResult<usize> {
        Ok(self.state()?.activations.get(&xuid).copied().unwrap_or(0))
    }

    /// Fail handler registrations once `allowed` more have succeeded.
    /// `None` lifts the limit.
    pub fn fail_subscriptions_after(&self, allowed: Option<usize>) -> LaurelResult<()> {
        self.state()?.subscription_budget = allowed;
        Ok(())
    }
}

impl RealTimeActivity for InMemoryRealTimeActivity {
    fn activate(&self, xuid: Xuid) {
        match self.state() {
            Ok(mut state) => *state.activations.entry(xuid).or_insert(0) += 1,
            Err(e) => error!(xuid = %xuid, error = %e, "Failed to activate real-time activity"),
        }
    }

    fn deactivate(&self, xuid: Xuid) {
        match self.state() {
            Ok(mut state) => {
                if let Some(count) = state.activations.get_mut(&xuid) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        state.activations.remove(&xuid);
                    }
                }
            }
            Err(e) => error!(xuid = %xuid, error = %e, "Failed to deactivate real-time activity"),
        }
    }

    fn add_progress_handler(
        &self,
        xuid: Xuid,
        handler: ProgressHandler,
    ) -> LaurelResult<SubscriptionToken> {
        let mut state = self.state()?;
        let token = state.issue_token(xuid)?;
        state.users.entry(xuid).or_default().progress.insert(token, handler);
        Ok(token)
    }

    fn add_resync_handler(
        &self,
        xuid: Xuid,
        handler: ResyncHandler,
    ) -> LaurelResult<SubscriptionToken> {
        let mut state = self.state()?;
        let token = state.issue_token(xuid)?;
        state.users.entry(xuid).or_default().resync.insert(token, handler);
        Ok(token)
    }

    fn add_connection_state_handler(
        &self,
        xuid: Xuid,
        handler: ConnectionStateHandler,
    ) -> LaurelResult<SubscriptionToken> {
        let mut state = self.state()?;
        let token = state.issue_token(xuid)?;
        state.users.entry(xuid).or_default().connection.insert(token, handler);
        Ok(token)
    }

    fn remove_handler(&self, xuid: Xuid, token: SubscriptionToken) -> bool {
        let Ok(mut state) = self.state() else {
            return false;
        };
        let Some(handlers) = state.users.get_mut(&xuid) else {
            return false;
        };
        let removed = handlers.remove(token);
        if handlers.is_empty() {
            state.users.remove(&xuid);
        }
        removed
    }
}
