//! Session registry and entries.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use nebula_client::ConversationState;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{RegistryError, Result};

/// One session's binding of a credential to protocol state.
///
/// The mutex doubles as the per-session execution token: a turn holds the
/// guard for its full duration, so turns on one session never overlap and
/// the parent chain cannot fork. Dropping the guard without writing leaves
/// the state exactly as the turn found it.
#[derive(Debug)]
pub struct SessionEntry {
    credential: String,
    state: Mutex<ConversationState>,
}

impl SessionEntry {
    fn new(credential: String) -> Self {
        Self {
            credential,
            state: Mutex::new(ConversationState::new()),
        }
    }

    /// Bearer token bound when the entry was created. Immutable thereafter.
    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn state(&self) -> &Mutex<ConversationState> {
        &self.state
    }

    /// Start the conversation over: fresh state, new session identifier.
    /// Key and credential are untouched.
    pub async fn reset(&self) {
        self.state.lock().await.reset();
    }
}

/// Mapping from external session id to [`SessionEntry`].
///
/// The map is the only shared mutable structure in the core; everything
/// behind it is owned by whichever turn holds the entry's state lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: DashMap<String, Arc<SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or create the entry for `session_id`, returning it together
    /// with the (possibly newly generated) id.
    ///
    /// A missing or empty id gets a fresh random one. A known id returns the
    /// existing entry and its bound credential; the credential supplied here
    /// is ignored. An unknown id creates an entry with `credential_if_creating`,
    /// failing with [`RegistryError::MissingCredential`] when none is
    /// available. Creation is atomic: concurrent resolves of the same unseen
    /// id all land on one entry.
    pub fn resolve(
        &self,
        session_id: Option<&str>,
        credential_if_creating: Option<&str>,
    ) -> Result<(Arc<SessionEntry>, String)> {
        let session_id = match session_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        if let Some(existing) = self.entries.get(&session_id) {
            return Ok((Arc::clone(&existing), session_id));
        }

        match self.entries.entry(session_id.clone()) {
            Entry::Occupied(occupied) => Ok((Arc::clone(occupied.get()), session_id)),
            Entry::Vacant(vacant) => {
                let credential = credential_if_creating
                    .filter(|credential| !credential.is_empty())
                    .ok_or(RegistryError::MissingCredential)?
                    .to_string();
                debug!("creating session entry {session_id}");
                let entry = Arc::new(SessionEntry::new(credential));
                vacant.insert(Arc::clone(&entry));
                Ok((entry, session_id))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
