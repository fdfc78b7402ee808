//! Title-facing achievements manager.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use laurel_core::{
    AchievementOrderBy, AchievementsManagerEvent, CacheError, LaurelResult, ManagerConfig,
    ProgressState, SortFilterSettings, SortOrder, StateFilter, Xuid,
};
use laurel_service::{AchievementService, RealTimeActivity};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::result::AchievementsResult;
use crate::user::UserCache;

#[derive(Debug, Default)]
struct DispatcherState {
    /// Events returned by the last `do_work`.
    published: Vec<AchievementsManagerEvent>,
    users: BTreeMap<Xuid, Arc<UserCache>>,
}

/// Achievement cache for every local user of one title.
///
/// All entry points are synchronous and only touch cached state. Fetches and
/// updates run on the runtime passed to [`AchievementsManager::new`]; their
/// effects surface through [`AchievementsManager::do_work`].
///
/// Lock order is always dispatcher then user cache.
pub struct AchievementsManager {
    config: ManagerConfig,
    service: Arc<dyn AchievementService>,
    rta: Arc<dyn RealTimeActivity>,
    runtime: Handle,
    dispatcher: Mutex<DispatcherState>,
}

impl std::fmt::Debug for AchievementsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AchievementsManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AchievementsManager {
    /// Create a manager after validating `config`.
    pub fn new(
        config: ManagerConfig,
        service: Arc<dyn AchievementService>,
        rta: Arc<dyn RealTimeActivity>,
        runtime: Handle,
    ) -> LaurelResult<Self> {
        config.validate()?;
        info!(
            title_id = config.title_id,
            page_size = config.page_size,
            "Achievements manager created"
        );
        Ok(Self {
            config,
            service,
            rta,
            runtime,
            dispatcher: Mutex::new(DispatcherState::default()),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn lock(&self) -> LaurelResult<MutexGuard<'_, DispatcherState>> {
        self.dispatcher
            .lock()
            .map_err(|_| CacheError::LockPoisoned.into())
    }

    // ========================================================================
    // USERS
    // ========================================================================

    /// Register a local user and start fetching their achievements.
    ///
    /// Completion is observed through [`AchievementsManager::is_user_initialized`]
    /// or a `LocalUserInitialStateSynced` event. A failed fetch leaves the
    /// user registered but uninitialized.
    pub fn add_local_user(&self, xuid: Xuid) -> LaurelResult<()> {
        let mut dispatcher = self.lock()?;
        if dispatcher.users.contains_key(&xuid) {
            return Err(CacheError::UserAlreadyRegistered { xuid }.into());
        }

        let user = Arc::new(UserCache::new(
            xuid,
            &self.config,
            Arc::clone(&self.service),
            Arc::clone(&self.rta),
            self.runtime.clone(),
        ));

        let on_complete = Box::new(move |outcome: LaurelResult<()>| match outcome {
            Ok(()) => debug!(xuid = %xuid, "Initial fetch complete"),
            Err(e) => warn!(xuid = %xuid, error = %e, "User registered but not initialized"),
        });

        if let Err(e) = user.start(on_complete) {
            user.teardown();
            return Err(e);
        }

        dispatcher.users.insert(xuid, user);
        info!(xuid = %xuid, "Local user added");
        Ok(())
    }

    /// Unregister a user, tearing down their subscriptions and dropping any
    /// outstanding work. Removing an unknown user is an error.
    pub fn remove_local_user(&self, xuid: Xuid) -> LaurelResult<()> {
        let mut dispatcher = self.lock()?;
        let user = dispatcher
            .users
            .remove(&xuid)
            .ok_or(CacheError::UserNotFound { xuid })?;
        user.teardown();
        info!(xuid = %xuid, "Local user removed");
        Ok(())
    }

    pub fn has_user(&self, xuid: Xuid) -> LaurelResult<bool> {
        Ok(self.lock()?.users.contains_key(&xuid))
    }

    /// Whether the user's initial fetch has completed. Unknown users are an error.
    pub fn is_user_initialized(&self, xuid: Xuid) -> LaurelResult<bool> {
        self.user(xuid)?.is_initialized()
    }

    pub fn local_users(&self) -> LaurelResult<Vec<Xuid>> {
        Ok(self.lock()?.users.keys().copied().collect())
    }

    fn user(&self, xuid: Xuid) -> LaurelResult<Arc<UserCache>> {
        self.lock()?
            .users
            .get(&xuid)
            .cloned()
            .ok_or_else(|| CacheError::UserNotFound { xuid }.into())
    }

    fn initialized_user(&self, xuid: Xuid) -> LaurelResult<Arc<UserCache>> {
        let user = self.user(xuid)?;
        if !user.is_initialized()? {
            return Err(CacheError::UserNotInitialized { xuid }.into());
        }
        Ok(user)
    }

    // ========================================================================
    // FRAME PUMP
    // ========================================================================

    /// Flush every queued event.
    ///
    /// Replaces the previous frame's events with each user's merged events,
    /// in user id order. A user's `LocalUserInitialStateSynced` event always
    /// precedes its other events.
    pub fn do_work(&self) -> LaurelResult<Vec<AchievementsManagerEvent>> {
        let mut dispatcher = self.lock()?;
        let state = &mut *dispatcher;

        state.published.clear();
        for user in state.users.values() {
            match user.process_events() {
                Ok(events) => state.published.extend(events),
                Err(e) => error!(xuid = %user.xuid(), error = %e, "Failed to process events"),
            }
        }

        if !state.published.is_empty() {
            debug!(events = state.published.len(), "Published achievement events");
        }
        Ok(state.published.clone())
    }

    /// Events returned by the most recent `do_work`.
    pub fn published_events(&self) -> LaurelResult<Vec<AchievementsManagerEvent>> {
        Ok(self.lock()?.published.clone())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn get_achievement(&self, xuid: Xuid, achievement_id: &str) -> LaurelResult<AchievementsResult> {
        self.initialized_user(xuid)?.get_achievement(achievement_id)
    }

    /// All achievements of the user, optionally ordered by unlock time.
    pub fn get_achievements(
        &self,
        xuid: Xuid,
        order_by: AchievementOrderBy,
        sort_order: SortOrder,
    ) -> LaurelResult<AchievementsResult> {
        let user = self.initialized_user(xuid)?;
        let settings = SortFilterSettings::new(order_by, sort_order, StateFilter::All);
        settings.validate()?;
        user.get_achievements(&settings)
    }

    /// Achievements in `state`, optionally ordered by unlock time.
    /// `ProgressState::Unknown` applies no filter.
    pub fn get_achievements_by_state(
        &self,
        xuid: Xuid,
        order_by: AchievementOrderBy,
        sort_order: SortOrder,
        state: ProgressState,
    ) -> LaurelResult<AchievementsResult> {
        let user = self.initialized_user(xuid)?;
        let settings =
            SortFilterSettings::new(order_by, sort_order, StateFilter::from_progress_state(state));
        settings.validate()?;
        user.get_achievements(&settings)
    }

    pub fn user_achievement_count(&self, xuid: Xuid) -> LaurelResult<usize> {
        self.initialized_user(xuid)?.achievement_count()
    }

    /// Events queued for the user that the next `do_work` will merge.
    /// Answers for uninitialized users too.
    pub fn pending_event_count(&self, xuid: Xuid) -> LaurelResult<usize> {
        self.user(xuid)?.pending_event_count()
    }

    // ========================================================================
    // UPDATES
    // ========================================================================

    /// Request progress for a single-requirement, percentage-based achievement.
    ///
    /// `percent` is clamped to 100. Success means the update was accepted
    /// for submission; the new state arrives through `do_work` once the
    /// service confirms it.
    pub fn update_achievement(&self, xuid: Xuid, achievement_id: &str, percent: u32) -> LaurelResult<()> {
        self.initialized_user(xuid)?
            .update_achievement(achievement_id, percent)
    }
}

impl Drop for AchievementsManager {
    fn drop(&mut self) {
        if let Ok(mut dispatcher) = self.dispatcher.lock() {
            for (_, user) in std::mem::take(&mut dispatcher.users) {
                user.teardown();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laurel_core::{Achievement, ErrorKind, Requirement};
    use laurel_service::{InMemoryRealTimeActivity, MockAchievementService};
    use std::time::Duration;

    fn config() -> ManagerConfig {
        ManagerConfig::new(1234, "scid-1234").with_page_size(2)
    }

    fn catalog() -> Vec<Achievement> {
        (1..=3)
            .map(|i| {
                Achievement::new(i.to_string(), "scid-1234", format!("A{}", i))
                    .with_requirement(Requirement::new("p", "0", "100"))
            })
            .collect()
    }

    async fn wait_initialized(manager: &AchievementsManager, xuid: Xuid) {
        for _ in 0..200 {
            if manager.is_user_initialized(xuid).unwrap_or(false) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("user {} never initialized", xuid);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = AchievementsManager::new(
            ManagerConfig::default(),
            Arc::new(MockAchievementService::new()),
            Arc::new(InMemoryRealTimeActivity::new()),
            Handle::current(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_add_initialize_and_publish_sync_event() {
        let service = Arc::new(MockAchievementService::new());
        let rta = Arc::new(InMemoryRealTimeActivity::new());
        let xuid = Xuid::new(1);
        service.set_catalog(xuid, catalog()).unwrap();

        let manager =
            AchievementsManager::new(config(), service.clone(), rta.clone(), Handle::current()).unwrap();
        manager.add_local_user(xuid).unwrap();
        assert_eq!(rta.handler_count(xuid).unwrap(), 3);
        assert_eq!(rta.activation_count(xuid).unwrap(), 1);

        wait_initialized(&manager, xuid).await;
        assert_eq!(manager.user_achievement_count(xuid).unwrap(), 3);
        // 3 achievements at page size 2
        assert_eq!(service.fetch_count().unwrap(), 2);

        let events = manager.do_work().unwrap();
        assert_eq!(
            events,
            vec![AchievementsManagerEvent::LocalUserInitialStateSynced { xuid }]
        );
        assert!(manager.do_work().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_add_and_unknown_remove() {
        let manager = AchievementsManager::new(
            config(),
            Arc::new(MockAchievementService::new()),
            Arc::new(InMemoryRealTimeActivity::new()),
            Handle::current(),
        )
        .unwrap();
        let xuid = Xuid::new(2);
        manager.add_local_user(xuid).unwrap();
        let err = manager.add_local_user(xuid).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = manager.remove_local_user(Xuid::new(3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(manager.is_user_initialized(Xuid::new(3)).is_err());
    }

    #[tokio::test]
    async fn test_remove_tears_down_subscriptions() {
        let service = Arc::new(MockAchievementService::new());
        let rta = Arc::new(InMemoryRealTimeActivity::new());
        let xuid = Xuid::new(4);
        service.set_catalog(xuid, catalog()).unwrap();
        let manager =
            AchievementsManager::new(config(), service, rta.clone(), Handle::current()).unwrap();

        manager.add_local_user(xuid).unwrap();
        wait_initialized(&manager, xuid).await;
        manager.remove_local_user(xuid).unwrap();

        assert_eq!(rta.handler_count(xuid).unwrap(), 0);
        assert_eq!(rta.activation_count(xuid).unwrap(), 0);
        assert!(!manager.has_user(xuid).unwrap());
        assert!(manager.do_work().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_sort_combination() {
        let service = Arc::new(MockAchievementService::new());
        let xuid = Xuid::new(5);
        service.set_catalog(xuid, catalog()).unwrap();
        let manager = AchievementsManager::new(
            config(),
            service,
            Arc::new(InMemoryRealTimeActivity::new()),
            Handle::current(),
        )
        .unwrap();
        manager.add_local_user(xuid).unwrap();
        wait_initialized(&manager, xuid).await;

        let err = manager
            .get_achievements(xuid, AchievementOrderBy::DefaultOrder, SortOrder::Ascending)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = manager
            .get_achievements(xuid, AchievementOrderBy::UnlockTime, SortOrder::Unsorted)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let all = manager
            .get_achievements(xuid, AchievementOrderBy::DefaultOrder, SortOrder::Unsorted)
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_drop_releases_subscriptions() {
        let rta = Arc::new(InMemoryRealTimeActivity::new());
        let xuid = Xuid::new(6);
        {
            let manager = AchievementsManager::new(
                config(),
                Arc::new(MockAchievementService::new()),
                rta.clone(),
                Handle::current(),
            )
            .unwrap();
            manager.add_local_user(xuid).unwrap();
            assert_eq!(rta.handler_count(xuid).unwrap(), 3);
        }
        assert_eq!(rta.handler_count(xuid).unwrap(), 0);
        assert_eq!(rta.activation_count(xuid).unwrap(), 0);
    }
}
