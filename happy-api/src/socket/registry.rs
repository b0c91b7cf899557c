use dashmap::DashMap;
use uuid::Uuid;

/// Maps an account to the socket id of its live connection. One connection
/// per account; a newer connection replaces the older entry.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the socket id this one replaced, if any.
    pub fn register(&self, user_id: Uuid, socket_id: impl Into<String>) -> Option<String> {
        self.connections.insert(user_id, socket_id.into())
    }

    /// Removes the entry only while it still points at `socket_id`, so a
    /// stale disconnect cannot evict a newer connection.
    pub fn unregister(&self, user_id: Uuid, socket_id: &str) -> bool {
        self.connections
            .remove_if(&user_id, |_, current| current == socket_id)
            .is_some()
    }

    pub fn socket_of(&self, user_id: Uuid) -> Option<String> {
        self.connections.get(&user_id).map(|sid| sid.value().clone())
    }

    pub fn is_connected(&self, user_id: Uuid) -> bool {
        self.connections.contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
