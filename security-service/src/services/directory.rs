use std::collections::HashMap;

use crate::models::Identity;

/// Read-only view of the identity store.
pub trait IdentityDirectory: Send + Sync {
    fn lookup(&self, username: &str) -> Option<Identity>;
}

/// Directory backed by a fixed map, keyed by username.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    identities: HashMap<String, Identity>,
}

impl InMemoryDirectory {
    pub fn new(identities: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            identities: identities
                .into_iter()
                .map(|identity| (identity.username.clone(), identity))
                .collect(),
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities.insert(identity.username.clone(), identity);
        self
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl IdentityDirectory for InMemoryDirectory {
    fn lookup(&self, username: &str) -> Option<Identity> {
        self.identities.get(username).cloned()
    }
}
