//! Per-user achievement cache.
//!
//! A `UserCache` owns the user's store, the queues of events waiting for the
//! next `do_work`, and the user's real-time subscriptions. Notification
//! handlers and background tasks share the state through `CacheShared` and
//! check the cache's liveness token before touching it.

use std::sync::{Arc, Mutex, MutexGuard};

use laurel_core::{
    Achievement, AchievementsManagerEvent, CacheError, ConnectionState, LaurelResult, ManagerConfig,
    ProgressChangeEntry, SortFilterSettings, SubscriptionToken, ValidationError, Xuid,
};
use laurel_service::{AchievementService, AchievementsQuery, RealTimeActivity};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::lifecycle::TaskTracker;
use crate::reconcile;
use crate::result::AchievementsResult;
use crate::store::AchievementStore;

/// Called once when the initial fetch finishes, with its outcome.
pub type InitCompletion = Box<dyn FnOnce(LaurelResult<()>) + Send + 'static>;

/// Progress of the initial fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum InitPhase {
    #[default]
    Fetching,
    Ready,
    /// The fetch failed. Nothing is buffered until the user is added again.
    Failed,
}

#[derive(Debug, Default)]
struct UserCacheState {
    /// `None` until the first full fetch completes.
    store: Option<AchievementStore>,
    phase: InitPhase,
    /// Events built from progress notifications.
    notification_events: Vec<AchievementsManagerEvent>,
    /// Events derived by diffing a resync fetch.
    generated_events: Vec<AchievementsManagerEvent>,
}

impl UserCacheState {
    fn is_ready(&self) -> bool {
        self.phase == InitPhase::Ready
    }
}

/// State shared with notification handlers and background tasks.
struct CacheShared {
    xuid: Xuid,
    title_id: u32,
    page_size: u32,
    service: Arc<dyn AchievementService>,
    state: Mutex<UserCacheState>,
    tasks: TaskTracker,
}

impl CacheShared {
    fn lock(&self) -> LaurelResult<MutexGuard<'_, UserCacheState>> {
        self.state
            .lock()
            .map_err(|_| CacheError::LockPoisoned.into())
    }

    /// Fetch every page for the user. Any page failure fails the whole fetch
    /// and discards the pages already received.
    async fn fetch_all(&self) -> LaurelResult<Vec<Achievement>> {
        let query = AchievementsQuery::all_for_user(self.xuid, self.title_id, self.page_size);
        let mut buffer = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .service
                .fetch_page(&query, continuation.as_deref())
                .await?;
            buffer.extend(page.achievements);
            match page.continuation_token {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }
        Ok(buffer)
    }

    fn on_progress_notification(&self, entries: &[ProgressChangeEntry]) {
        if !self.tasks.is_alive() {
            return;
        }
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => {
                error!(xuid = %self.xuid, error = %e, "Dropping progress notification");
                return;
            }
        };
        if state.phase == InitPhase::Failed {
            debug!(
                xuid = %self.xuid,
                entries = entries.len(),
                "Ignoring progress notification after failed initialization"
            );
            return;
        }

        for entry in entries {
            let mut progress = entry.clone();
            if let Some(store) = &state.store {
                reconcile::backfill_targets(self.xuid, store, &mut progress);
            }
            debug!(
                xuid = %self.xuid,
                achievement_id = %progress.achievement_id,
                state = %progress.progress_state,
                "Queued progress notification"
            );
            state
                .notification_events
                .push(AchievementsManagerEvent::AchievementProgressUpdated {
                    xuid: self.xuid,
                    progress,
                });
        }
    }

    fn on_connection_state_changed(self: &Arc<Self>, connection: ConnectionState) {
        if connection != ConnectionState::Connected {
            return;
        }
        self.on_resync();
    }

    fn on_resync(self: &Arc<Self>) {
        if !self.tasks.is_alive() {
            return;
        }
        let initialized = self.lock().map(|s| s.is_ready()).unwrap_or(false);
        if !initialized {
            debug!(xuid = %self.xuid, "Ignoring resync before initialization");
            return;
        }

        info!(xuid = %self.xuid, "Resync started");
        let shared = Arc::clone(self);
        let spawned = self.tasks.spawn(async move {
            match shared.fetch_all().await {
                Ok(fetched) => shared.apply_resync(&fetched),
                Err(e) => error!(xuid = %shared.xuid, error = %e, "Resync fetch failed"),
            }
        });
        if let Err(e) = spawned {
            warn!(xuid = %self.xuid, error = %e, "Could not schedule resync");
        }
    }

    fn apply_resync(&self, fetched: &[Achievement]) {
        if !self.tasks.is_alive() {
            return;
        }
        let mut guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!(xuid = %self.xuid, error = %e, "Dropping resync result");
                return;
            }
        };
        let state = &mut *guard;
        let Some(store) = &state.store else {
            return;
        };

        let candidates = reconcile::diff_fetched(self.xuid, store, fetched);
        let mut queued = 0usize;
        for event in candidates {
            let duplicate = reconcile::is_duplicate(
                &event,
                state.notification_events.iter().chain(&state.generated_events),
            );
            if duplicate {
                debug!(
                    xuid = %self.xuid,
                    achievement_id = event.achievement_id().unwrap_or_default(),
                    "Resync change already pending"
                );
                continue;
            }
            state.generated_events.push(event);
            queued += 1;
        }
        info!(xuid = %self.xuid, queued = queued, "Resync complete");
    }

    async fn initialize(self: Arc<Self>, on_complete: InitCompletion) {
        let outcome = match self.fetch_all().await {
            Ok(fetched) => self.install(fetched),
            Err(e) => {
                error!(xuid = %self.xuid, error = %e, "Initial achievement fetch failed");
                self.mark_failed();
                Err(e)
            }
        };
        on_complete(outcome);
    }

    /// Drop notifications buffered for a fetch that will never install.
    fn mark_failed(&self) {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => {
                error!(xuid = %self.xuid, error = %e, "Could not record failed initialization");
                return;
            }
        };
        let dropped = state.notification_events.len();
        state.notification_events.clear();
        state.phase = InitPhase::Failed;
        if dropped > 0 {
            warn!(xuid = %self.xuid, dropped = dropped, "Dropped notifications queued during failed fetch");
        }
    }

    fn install(&self, fetched: Vec<Achievement>) -> LaurelResult<()> {
        let mut state = self.lock()?;
        if !self.tasks.is_alive() {
            return Ok(());
        }
        let count = fetched.len();
        let store = AchievementStore::new(fetched);

        // notifications queued during the fetch still lack targets
        for event in &mut state.notification_events {
            if let AchievementsManagerEvent::AchievementProgressUpdated { progress, .. } = event {
                reconcile::backfill_targets(self.xuid, &store, progress);
            }
        }
        state.store = Some(store);
        state.phase = InitPhase::Ready;
        // published ahead of anything buffered during the fetch
        state
            .notification_events
            .insert(0, AchievementsManagerEvent::LocalUserInitialStateSynced { xuid: self.xuid });
        info!(xuid = %self.xuid, achievements = count, "User initialized");
        Ok(())
    }
}

/// Achievement cache for one local user.
pub struct UserCache {
    shared: Arc<CacheShared>,
    service_configuration_id: String,
    rta: Arc<dyn RealTimeActivity>,
    subscriptions: Mutex<Vec<SubscriptionToken>>,
}

impl std::fmt::Debug for UserCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCache")
            .field("xuid", &self.shared.xuid)
            .field("alive", &self.shared.tasks.is_alive())
            .finish_non_exhaustive()
    }
}

impl UserCache {
    pub fn new(
        xuid: Xuid,
        config: &ManagerConfig,
        service: Arc<dyn AchievementService>,
        rta: Arc<dyn RealTimeActivity>,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                xuid,
                title_id: config.title_id,
                page_size: config.page_size,
                service,
                state: Mutex::new(UserCacheState::default()),
                tasks: TaskTracker::new(runtime),
            }),
            service_configuration_id: config.service_configuration_id.clone(),
            rta,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn xuid(&self) -> Xuid {
        self.shared.xuid
    }

    /// Subscribe to real-time notifications and start the initial fetch.
    ///
    /// Returns an error only if the cache could not be set up; a failed
    /// fetch is reported to `on_complete` instead.
    pub fn start(&self, on_complete: InitCompletion) -> LaurelResult<()> {
        self.subscribe()?;
        let shared = Arc::clone(&self.shared);
        self.shared.tasks.spawn(shared.initialize(on_complete))
    }

    fn subscribe(&self) -> LaurelResult<()> {
        let xuid = self.shared.xuid;
        self.rta.activate(xuid);

        let mut tokens = self
            .subscriptions
            .lock()
            .map_err(|_| CacheError::LockPoisoned)?;

        let progress = Arc::clone(&self.shared);
        tokens.push(self.rta.add_progress_handler(
            xuid,
            Arc::new(move |entries: &[ProgressChangeEntry]| progress.on_progress_notification(entries)),
        )?);

        let resync = Arc::clone(&self.shared);
        tokens.push(self.rta.add_resync_handler(xuid, Arc::new(move || resync.on_resync()))?);

        let connection = Arc::clone(&self.shared);
        tokens.push(self.rta.add_connection_state_handler(
            xuid,
            Arc::new(move |state: ConnectionState| connection.on_connection_state_changed(state)),
        )?);

        debug!(xuid = %xuid, subscriptions = tokens.len(), "Subscribed to real-time activity");
        Ok(())
    }

    /// Abort outstanding work, remove every handler and release all records.
    pub fn teardown(&self) {
        let xuid = self.shared.xuid;
        self.shared.tasks.shutdown();

        match self.subscriptions.lock() {
            Ok(mut tokens) => {
                for token in tokens.drain(..) {
                    if !self.rta.remove_handler(xuid, token) {
                        warn!(xuid = %xuid, token = %token, "Handler was already removed");
                    }
                }
            }
            Err(_) => error!(xuid = %xuid, "Subscription list lock poisoned during teardown"),
        }
        self.rta.deactivate(xuid);

        if let Ok(mut state) = self.shared.lock() {
            *state = UserCacheState::default();
        }
        info!(xuid = %xuid, "User cache torn down");
    }

    pub fn is_initialized(&self) -> LaurelResult<bool> {
        Ok(self.shared.lock()?.is_ready())
    }

    fn with_store<T>(&self, f: impl FnOnce(&AchievementStore) -> LaurelResult<T>) -> LaurelResult<T> {
        let state = self.shared.lock()?;
        match &state.store {
            Some(store) if state.is_ready() => f(store),
            _ => Err(CacheError::UserNotInitialized {
                xuid: self.shared.xuid,
            }
            .into()),
        }
    }

    pub fn achievement_count(&self) -> LaurelResult<usize> {
        self.with_store(|store| Ok(store.len()))
    }

    pub fn get_achievement(&self, achievement_id: &str) -> LaurelResult<AchievementsResult> {
        self.with_store(|store| {
            let achievement = store.snapshot(achievement_id).ok_or_else(|| {
                CacheError::AchievementNotFound {
                    xuid: self.shared.xuid,
                    achievement_id: achievement_id.to_string(),
                }
            })?;
            Ok(AchievementsResult::new(vec![achievement]))
        })
    }

    pub fn get_achievements(&self, settings: &SortFilterSettings) -> LaurelResult<AchievementsResult> {
        self.with_store(|store| {
            let records = if *settings == SortFilterSettings::default() {
                store.get_all()
            } else {
                store.get_filtered(settings)?
            };
            Ok(AchievementsResult::new(records))
        })
    }

    /// Validate a percentage update and submit it in the background.
    ///
    /// Success means the request was accepted for submission. The cache
    /// only changes once the service's progress notification arrives.
    pub fn update_achievement(&self, achievement_id: &str, percent: u32) -> LaurelResult<()> {
        if achievement_id.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "achievement_id".to_string(),
            }
            .into());
        }
        let percent = percent.min(100);
        let xuid = self.shared.xuid;

        self.with_store(|store| reconcile::validate_update(xuid, store, achievement_id, percent))?;

        let service = Arc::clone(&self.shared.service);
        let title_id = self.shared.title_id;
        let scid = self.service_configuration_id.clone();
        let id = achievement_id.to_string();
        debug!(xuid = %xuid, achievement_id = %id, percent = percent, "Submitting progress update");
        self.shared.tasks.spawn(async move {
            if let Err(e) = service.submit_update(xuid, title_id, &scid, &id, percent).await {
                error!(xuid = %xuid, achievement_id = %id, error = %e, "Progress update failed");
            }
        })
    }

    /// Merge queued events into the store and return the events to publish.
    ///
    /// Returns nothing while the user is uninitialized; queued events wait
    /// for the store to exist.
    pub fn process_events(&self) -> LaurelResult<Vec<AchievementsManagerEvent>> {
        let mut state = self.shared.lock()?;
        if !state.is_ready() {
            return Ok(Vec::new());
        }
        let mut queued = std::mem::take(&mut state.notification_events);
        queued.append(&mut state.generated_events);
        if queued.is_empty() {
            return Ok(Vec::new());
        }
        let Some(store) = state.store.as_mut() else {
            return Ok(Vec::new());
        };
        Ok(reconcile::merge_events(self.shared.xuid, store, queued))
    }

    /// Number of events waiting for the next `process_events`.
    pub fn pending_event_count(&self) -> LaurelResult<usize> {
        let state = self.shared.lock()?;
        Ok(state.notification_events.len() + state.generated_events.len())
    }

    /// Number of background tasks still running for this user.
    pub fn active_task_count(&self) -> usize {
        self.shared.tasks.active_count()
    }
}
