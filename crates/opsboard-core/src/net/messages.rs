use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::facts::{DeltaEvent, MonitoringStatDelta, PerformanceDelta, SlaDelta, UserStatusDelta};
use crate::snapshot::DashboardSnapshot;

/// Channel every dashboard session joins on connect.
pub const MONITORING_GROUP: &str = "MonitoringGroup";

/// Client → hub: ask for the snapshot of a specific date and mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDashboardDataMsg {
    #[serde(with = "crate::time::flexible_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub is_backlog: bool,
}

/// Messages sent by a dashboard session to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    RequestDashboardData(RequestDashboardDataMsg),
    JoinMonitoringGroup(String),
    LeaveMonitoringGroup(String),
}

/// Messages pushed by the hub to dashboard sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    DashboardDataUpdate(Box<DashboardSnapshot>),
    UserStatusUpdate(UserStatusDelta),
    MonitoringStatsUpdate(MonitoringStatDelta),
    #[serde(rename = "SLAUpdate")]
    SlaUpdate(SlaDelta),
    PerformanceUpdate(PerformanceDelta),
    Error(String),
}

impl From<DeltaEvent> for ServerMessage {
    fn from(delta: DeltaEvent) -> Self {
        match delta {
            DeltaEvent::UserStatus(d) => Self::UserStatusUpdate(d),
            DeltaEvent::MonitoringStat(d) => Self::MonitoringStatsUpdate(d),
            DeltaEvent::SlaHour(d) => Self::SlaUpdate(d),
            DeltaEvent::Performance(d) => Self::PerformanceUpdate(d),
        }
    }
}

impl From<DashboardSnapshot> for ServerMessage {
    fn from(snapshot: DashboardSnapshot) -> Self {
        Self::DashboardDataUpdate(Box::new(snapshot))
    }
}
