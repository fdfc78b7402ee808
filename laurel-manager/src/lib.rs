//! Laurel Manager - Achievement Cache and Reconciliation
//!
//! Keeps one in-memory achievement cache per local user of a title, kept
//! current by real-time progress notifications with a resync fallback, and
//! flushes the resulting change events once per frame through
//! [`AchievementsManager::do_work`].
//!
//! # Example
//!
//! ```ignore
//! let manager = AchievementsManager::new(config, service, rta, Handle::current())?;
//! manager.add_local_user(xuid)?;
//!
//! // every frame
//! for event in manager.do_work()? {
//!     handle(event);
//! }
//! ```

pub mod lifecycle;
pub mod manager;
pub mod reconcile;
pub mod result;
pub mod store;
pub mod user;

pub use lifecycle::{LivenessToken, TaskTracker};
pub use manager::AchievementsManager;
pub use result::AchievementsResult;
pub use store::AchievementStore;
pub use user::{InitCompletion, UserCache};
