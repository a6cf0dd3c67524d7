use crate::connection::ConnectionState;
use crate::metrics::ConnectionSource;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use log::warn;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Read-only view of one live connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSummary {
    pub id: String,
    pub peer: Option<String>,
    pub state: ConnectionState,
    /// Chunk streams the peer has opened so far
    pub chunk_streams: usize,
    pub created_at: DateTime<Utc>,
}

/// Live connections, written by connection tasks and read by collectors.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, ConnectionSummary>>,
}

impl ConnectionRegistry {
    /// Create new registry
    pub fn new() -> Self {
        ConnectionRegistry::default()
    }

    // A panic while holding the lock leaves the map itself intact
    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ConnectionSummary>> {
        self.connections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ConnectionSummary>> {
        self.connections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a connection in the handshake state
    pub fn register(&self, id: impl Into<String>, peer: Option<String>) {
        let id = id.into();
        let summary = ConnectionSummary {
            id: id.clone(),
            peer,
            state: ConnectionState::Handshaking,
            chunk_streams: 0,
            created_at: Utc::now(),
        };
        self.write().insert(id, summary);
    }

    /// Move a connection to `state`.
    ///
    /// Illegal transitions are logged and ignored; returns whether the
    /// connection is now in `state`.
    pub fn set_state(&self, id: &str, state: ConnectionState) -> bool {
        let mut connections = self.write();
        let Some(summary) = connections.get_mut(id) else {
            return false;
        };
        if summary.state == state {
            return true;
        }
        if !summary.state.can_transition_to(state) {
            warn!("[{}] rejected state change {} -> {}", id, summary.state, state);
            return false;
        }
        summary.state = state;
        true
    }

    pub fn set_chunk_streams(&self, id: &str, count: usize) {
        if let Some(summary) = self.write().get_mut(id) {
            summary.chunk_streams = count;
        }
    }

    pub fn remove(&self, id: &str) -> Option<ConnectionSummary> {
        self.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<ConnectionSummary> {
        self.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl ConnectionSource for ConnectionRegistry {
    fn list_connections(&self) -> Result<Vec<ConnectionSummary>> {
        let connections = self
            .connections
            .read()
            .map_err(|_| Error::collector("connection registry lock poisoned"))?;
        let mut list: Vec<ConnectionSummary> = connections.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }
}
