use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::{RosterEntry, RosterStatus, SnapshotKey, UserId, UserType};

/// An atomic change reported by an update source.
///
/// Numeric fields carry the raw producer values; range checks happen in the
/// aggregator so every source gets the same treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub timestamp: DateTime<Utc>,
    pub kind: FactKind,
}

impl Fact {
    pub fn new(kind: FactKind, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, kind }
    }

    /// Stamp a fact with the current time.
    pub fn now(kind: FactKind) -> Self {
        Self::new(kind, crate::time::now())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fact", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FactKind {
    UserStatusChanged {
        user_id: UserId,
        user_type: UserType,
        user_name: Option<String>,
        status: RosterStatus,
    },
    MonitoringStatChanged {
        status_name: String,
        count: i64,
    },
    SlaHourChanged {
        hour: i64,
        completed: i64,
        percentage: f64,
    },
    PerformanceChanged {
        user_id: UserId,
        user_type: UserType,
        completed: i64,
        estimated_hours: f64,
        actual_hours: f64,
    },
}

impl FactKind {
    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UserStatusChanged { .. } => "user_status",
            Self::MonitoringStatChanged { .. } => "monitoring_stat",
            Self::SlaHourChanged { .. } => "sla_hour",
            Self::PerformanceChanged { .. } => "performance",
        }
    }
}

/// Broadcast payload for a roster status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusDelta {
    pub user_id: UserId,
    pub user_type: UserType,
    pub status: RosterStatus,
    pub timestamp: DateTime<Utc>,
}

/// Broadcast payload for a monitoring stat change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStatDelta {
    #[serde(rename = "status")]
    pub status_name: String,
    pub count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Broadcast payload for one SLA hour slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaDelta {
    pub hour: u8,
    pub completed: u32,
    pub percentage: f64,
    pub timestamp: DateTime<Utc>,
}

/// Broadcast payload for updated performance counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceDelta {
    pub user_type: UserType,
    pub entry: RosterEntry,
    pub timestamp: DateTime<Utc>,
}

/// Minimal projection of an accepted fact plus its resulting value.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaEvent {
    UserStatus(UserStatusDelta),
    MonitoringStat(MonitoringStatDelta),
    SlaHour(SlaDelta),
    Performance(PerformanceDelta),
}

/// Why a source asked for a whole-snapshot broadcast.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshReason {
    DashboardRefresh,
    /// Performance records from the change feed are announced by a full
    /// refresh rather than a scoped delta.
    PerformanceUpdate {
        user_id: UserId,
        user_type: UserType,
        completed: i64,
    },
}

/// Work submitted by an update source to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Fold `fact` into the snapshot for `key` and broadcast the delta.
    Fact { key: SnapshotKey, fact: Fact },
    /// Broadcast the whole current snapshot for `key`.
    Refresh {
        key: SnapshotKey,
        reason: RefreshReason,
    },
}

impl Update {
    pub fn fact_for_today(kind: FactKind, timestamp: DateTime<Utc>) -> Self {
        Self::Fact {
            key: SnapshotKey::today(),
            fact: Fact::new(kind, timestamp),
        }
    }

    pub fn refresh_today(reason: RefreshReason) -> Self {
        Self::Refresh {
            key: SnapshotKey::today(),
            reason,
        }
    }

    pub fn key(&self) -> SnapshotKey {
        match self {
            Self::Fact { key, .. } | Self::Refresh { key, .. } => *key,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Fact { fact, .. } => fact.kind.label(),
            Self::Refresh { .. } => "refresh",
        }
    }
}
