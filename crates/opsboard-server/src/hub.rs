use std::collections::{BTreeSet, HashMap};

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use opsboard_core::net::messages::MONITORING_GROUP;

/// Identifier of one connected dashboard session.
pub type SessionId = u64;

/// Per-session sender for outbound text frames.
/// Bounded so a slow client cannot grow server memory without limit.
/// `Utf8Bytes` clones are reference-counted, so a broadcast encodes once.
pub type SessionSender = mpsc::Sender<Utf8Bytes>;

const MAX_GROUP_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("invalid group name")]
    InvalidGroupName,
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}

/// Result of handing one frame to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// Outbound buffer was full; this frame was dropped for this session only.
    Dropped,
    /// The session's writer is gone.
    Closed,
}

/// Registry of connected sessions and the groups they belong to.
pub struct Hub {
    sessions: HashMap<SessionId, SessionSender>,
    groups: HashMap<String, BTreeSet<SessionId>>,
    next_session_id: SessionId,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_group_name(name: &str) -> Result<(), HubError> {
    if name.is_empty() || name.len() > MAX_GROUP_NAME_LEN || name.chars().any(char::is_control) {
        return Err(HubError::InvalidGroupName);
    }
    Ok(())
}

impl Hub {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            groups: HashMap::new(),
            next_session_id: 1,
        }
    }

    /// Add a session and place it in the monitoring group.
    pub fn register(&mut self, sender: SessionSender) -> SessionId {
        let id = self.next_session_id;
        self.next_session_id += 1;
        self.sessions.insert(id, sender);
        self.groups
            .entry(MONITORING_GROUP.to_string())
            .or_default()
            .insert(id);
        id
    }

    /// Remove a session from the hub and from every group.
    /// Returns false if it was already gone.
    pub fn deregister(&mut self, id: SessionId) -> bool {
        if self.sessions.remove(&id).is_none() {
            return false;
        }
        self.groups.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
        true
    }

    pub fn join_group(&mut self, id: SessionId, group: &str) -> Result<(), HubError> {
        validate_group_name(group)?;
        if !self.sessions.contains_key(&id) {
            return Err(HubError::UnknownSession(id));
        }
        self.groups.entry(group.to_string()).or_default().insert(id);
        Ok(())
    }

    pub fn leave_group(&mut self, id: SessionId, group: &str) -> Result<(), HubError> {
        validate_group_name(group)?;
        if !self.sessions.contains_key(&id) {
            return Err(HubError::UnknownSession(id));
        }
        if let Some(members) = self.groups.get_mut(group) {
            members.remove(&id);
            if members.is_empty() {
                self.groups.remove(group);
            }
        }
        Ok(())
    }

    /// Queue a frame for a single session.
    pub fn send_to(&self, id: SessionId, frame: &Utf8Bytes) -> SendOutcome {
        let Some(sender) = self.sessions.get(&id) else {
            return SendOutcome::Closed;
        };
        match sender.try_send(frame.clone()) {
            Ok(()) => SendOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session_id = id, "Outbound buffer full, dropping frame");
                SendOutcome::Dropped
            },
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Queue a frame for every member of `group`. Sessions whose writer has
    /// gone away are deregistered. Returns how many sessions accepted it.
    pub fn broadcast_to_group(&mut self, group: &str, frame: &Utf8Bytes) -> usize {
        let Some(members) = self.groups.get(group) else {
            return 0;
        };
        let mut delivered = 0;
        let mut closed = Vec::new();
        for &id in members {
            match self.send_to(id, frame) {
                SendOutcome::Queued => delivered += 1,
                SendOutcome::Dropped => {},
                SendOutcome::Closed => closed.push(id),
            }
        }
        for id in closed {
            tracing::debug!(session_id = id, "Removing session with closed channel");
            self.deregister(id);
        }
        delivered
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_member(&self, id: SessionId, group: &str) -> bool {
        self.groups.get(group).is_some_and(|m| m.contains(&id))
    }

    pub fn group_size(&self, group: &str) -> usize {
        self.groups.get(group).map_or(0, BTreeSet::len)
    }
}
