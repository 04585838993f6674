//! Session context: who is calling and what they may touch, as a typed
//! principal behind an opaque bearer token.
//!
//! Tokens live in process memory; a supplier principal is re-checked
//! against its project on every use, so deleting a project invalidates
//! its suppliers without explicit revocation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ledger::ProjectId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Admin,
    Supplier {
        project_id: ProjectId,
        supplier: String,
    },
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Principal>>,
}

pub type SharedSessionStore = Arc<SessionStore>;

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> SharedSessionStore {
        Arc::new(Self::new())
    }

    pub fn issue(&self, principal: Principal) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.write().insert(token.clone(), principal);
        token
    }

    pub fn resolve(&self, token: &str) -> Option<Principal> {
        self.sessions.read().get(token).cloned()
    }

    pub fn revoke(&self, token: &str) {
        self.sessions.write().remove(token);
    }
}
