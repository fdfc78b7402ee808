//! Laurel Service - Collaborator Boundaries
//!
//! Traits for the remote achievement service and the real-time activity
//! transport consumed by the achievement cache, plus in-memory
//! implementations used by tests and offline titles.

pub mod achievements;
pub mod mock;
pub mod rta;

pub use achievements::{AchievementService, AchievementsPage, AchievementsQuery};
pub use mock::{InMemoryRealTimeActivity, MockAchievementService, SubmittedUpdate};
pub use rta::{ConnectionStateHandler, ProgressHandler, RealTimeActivity, ResyncHandler};
