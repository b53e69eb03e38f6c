//! # session_registry
//!
//! In-memory registry binding externally visible session ids to a bearer
//! credential and a conversation's protocol state. Entries are created
//! lazily on first use and never evicted; each entry's state is guarded by
//! a per-entry lock that serializes turns on the same conversation.

pub mod error;
pub mod registry;

pub use error::{RegistryError, Result};
pub use registry::{SessionEntry, SessionRegistry};
