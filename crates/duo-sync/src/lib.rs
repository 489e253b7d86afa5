//! Client-side sync for the shared room: optimistic local state, echo
//! suppression, transactional composite writes, and the room lifecycle
//! (create / join / resume / legacy migration).

pub mod cache;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod ops;

pub use cache::LocalCache;
pub use engine::{SyncEngine, SyncState};
pub use error::{SyncError, SyncResult};
pub use lifecycle::Client;
pub use ops::HomeView;
