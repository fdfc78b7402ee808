//! Real-time activity boundary.
//!
//! The cache consumes three per-user notification streams: progress changes,
//! resync requests, and connection state changes. It never manages the
//! underlying connection; it only registers and removes handlers.

use std::sync::Arc;

use laurel_core::{ConnectionState, LaurelResult, ProgressChangeEntry, SubscriptionToken, Xuid};

/// Handler for a batch of progress changes pushed by the service.
pub type ProgressHandler = Arc<dyn Fn(&[ProgressChangeEntry]) + Send + Sync>;

/// Handler for a resync request.
pub type ResyncHandler = Arc<dyn Fn() + Send + Sync>;

/// Handler for a connection state transition.
pub type ConnectionStateHandler = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Real-time notification transport.
///
/// Handlers may be invoked from any thread, concurrently with the title.
pub trait RealTimeActivity: Send + Sync {
    /// Take a reference on the user's connection.
    fn activate(&self, xuid: Xuid);

    /// Release a reference taken by [`RealTimeActivity::activate`].
    fn deactivate(&self, xuid: Xuid);

    fn add_progress_handler(
        &self,
        xuid: Xuid,
        handler: ProgressHandler,
    ) -> LaurelResult<SubscriptionToken>;

    fn add_resync_handler(&self, xuid: Xuid, handler: ResyncHandler)
        -> LaurelResult<SubscriptionToken>;

    fn add_connection_state_handler(
        &self,
        xuid: Xuid,
        handler: ConnectionStateHandler,
    ) -> LaurelResult<SubscriptionToken>;

    /// Remove a handler. Returns false if the token was not registered.
    fn remove_handler(&self, xuid: Xuid, token: SubscriptionToken) -> bool;
}
