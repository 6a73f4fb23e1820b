pub mod store;
pub mod workspace;

pub use store::{SessionError, SessionStore, SESSION_FILE_SUFFIX};
pub use workspace::Workspace;
