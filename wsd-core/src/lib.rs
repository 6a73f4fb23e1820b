//! Foundation types shared by every wsd crate.
//!
//! Nothing in here touches the disk: this crate only describes who a
//! workspace is ([`Owi`]), where it is in its lifecycle ([`WorkspaceState`]),
//! and how long an operation on it may run ([`OpContext`]).

pub mod context;
pub mod owi;
pub mod state;
pub mod trace;

pub use context::{CancelReason, OpContext};
pub use owi::Owi;
pub use state::{ParseStateError, WorkspaceState};
