use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use opsboard_core::facts::{FactKind, RefreshReason, Update};
use opsboard_core::snapshot::{UnknownVariant, UserId, UserType};

/// One row handed out by the change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub message_type: String,
    /// JSON document; its shape depends on `message_type`.
    pub message_body: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed {message_type} body: {source}")]
    Body {
        message_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Vocabulary(#[from] UnknownVariant),
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatsBody {
    status: String,
    count: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SlaBody {
    hour: i64,
    completed: i64,
    percentage: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PerformanceBody {
    user_id: UserId,
    user_type: String,
    completed: i64,
}

fn body<T: DeserializeOwned>(message_type: &'static str, raw: &str) -> Result<T, RecordError> {
    serde_json::from_str(raw).map_err(|source| RecordError::Body {
        message_type,
        source,
    })
}

/// Translate a record into the update it asks for. `Ok(None)` means the
/// message type is not one the dashboard knows.
pub fn process_record(record: &ChangeRecord) -> Result<Option<Update>, RecordError> {
    let update = match record.message_type.trim().to_ascii_uppercase().as_str() {
        "MONITORING_STATS_UPDATE" => {
            let b: StatsBody = body("MONITORING_STATS_UPDATE", &record.message_body)?;
            Update::fact_for_today(
                FactKind::MonitoringStatChanged {
                    status_name: b.status,
                    count: b.count,
                },
                record.timestamp,
            )
        },
        "SLA_DATA_UPDATE" => {
            let b: SlaBody = body("SLA_DATA_UPDATE", &record.message_body)?;
            Update::fact_for_today(
                FactKind::SlaHourChanged {
                    hour: b.hour,
                    completed: b.completed,
                    percentage: b.percentage,
                },
                record.timestamp,
            )
        },
        "DASHBOARD_REFRESH" => Update::refresh_today(RefreshReason::DashboardRefresh),
        // Performance counters are not carried by the record; the dashboard
        // re-reads the whole snapshot instead.
        "USER_PERFORMANCE_UPDATE" => {
            let b: PerformanceBody = body("USER_PERFORMANCE_UPDATE", &record.message_body)?;
            Update::refresh_today(RefreshReason::PerformanceUpdate {
                user_id: b.user_id,
                user_type: b.user_type.parse()?,
                completed: b.completed,
            })
        },
        _ => return Ok(None),
    };
    Ok(Some(update))
}
