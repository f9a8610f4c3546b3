use std::{collections::HashMap, sync::Arc, time::Instant};

use tokio::sync::Mutex;

use crate::connection::Connection;

/// A registered connection and the identity it was given on join.
#[derive(Clone)]
pub struct Member {
    pub identity: u64,
    pub conn: Arc<dyn Connection>,
    pub joined_at: Instant,
}

impl Member {
    pub fn conn_id(&self) -> &str {
        self.conn.conn_id()
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("identity", &self.identity)
            .field("conn_id", &self.conn_id())
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    /// Last identity handed out; 0 means none yet.
    last_id: u64,
    /// conn_id → member
    members: HashMap<String, Member>,
}

/// Live connections of the room and the identity counter.
///
/// Every read and write goes through one exclusive lock, and nothing holds it
/// across I/O: callers take a [`snapshot`](Self::snapshot) and send outside.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next identity to `conn` and add it to the membership.
    ///
    /// Identities start at 1 and are never reused.
    pub async fn register(&self, conn: Arc<dyn Connection>) -> u64 {
        let mut inner = self.inner.lock().await;
        inner.last_id += 1;
        let identity = inner.last_id;
        let conn_id = conn.conn_id().to_string();
        inner.members.insert(conn_id, Member {
            identity,
            conn,
            joined_at: Instant::now(),
        });
        identity
    }

    /// Remove a connection. Absent connections are not an error.
    pub async fn unregister(&self, conn_id: &str) -> Option<Member> {
        self.inner.lock().await.members.remove(conn_id)
    }

    pub async fn identity_of(&self, conn_id: &str) -> Option<u64> {
        self.inner
            .lock()
            .await
            .members
            .get(conn_id)
            .map(|m| m.identity)
    }

    /// Point-in-time copy of the membership, ordered by identity.
    pub async fn snapshot(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self.inner.lock().await.members.values().cloned().collect();
        members.sort_by_key(|m| m.identity);
        members
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Highest identity assigned so far (0 before the first join).
    pub async fn last_identity(&self) -> u64 {
        self.inner.lock().await.last_id
    }
}
