mod state;
mod store;

pub use state::{FileSessionState, InMemorySessionState, SessionState, SessionStateError};
pub use store::{PendingActionStore, StoreError, PENDING_ACTIONS_KEY, SNAPSHOT_FORMAT_VERSION};
