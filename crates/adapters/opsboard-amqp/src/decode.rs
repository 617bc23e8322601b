//! Turns raw queue bodies into dashboard updates.
//!
//! Producers write PascalCase JSON; camelCase field names are accepted too.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use opsboard_core::facts::{FactKind, Update};
use opsboard_core::snapshot::{RosterStatus, UnknownVariant, UserId, UserType};

/// Which queue a body arrived on; each has its own shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    UserStatus,
    Monitoring,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed body: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Vocabulary(#[from] UnknownVariant),
}

/// What a body turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Update(Update),
    /// Well-formed but not something the dashboard tracks.
    Ignored(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserStatusMessage {
    #[serde(alias = "userId")]
    user_id: UserId,
    #[serde(alias = "userType")]
    user_type: String,
    #[serde(alias = "userName", default)]
    user_name: Option<String>,
    #[serde(alias = "status")]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope {
    #[serde(alias = "messageType")]
    message_type: String,
    #[serde(alias = "data", default)]
    data: serde_json::Value,
    #[serde(
        alias = "timestamp",
        default,
        deserialize_with = "opsboard_core::time::lenient_timestamp::deserialize"
    )]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MonitoringData {
    #[serde(alias = "status")]
    status: String,
    #[serde(alias = "count")]
    count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SlaData {
    #[serde(alias = "hour")]
    hour: i64,
    #[serde(alias = "completed")]
    completed: i64,
    #[serde(alias = "percentage")]
    percentage: f64,
}

fn data<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, DecodeError> {
    Ok(serde_json::from_value(value)?)
}

/// Decode one queue body. `received_at` stamps facts whose producer did not
/// send a usable timestamp.
pub fn decode(
    kind: QueueKind,
    body: &[u8],
    received_at: DateTime<Utc>,
) -> Result<Decoded, DecodeError> {
    match kind {
        QueueKind::UserStatus => {
            let msg: UserStatusMessage = serde_json::from_slice(body)?;
            let fact = FactKind::UserStatusChanged {
                user_id: msg.user_id,
                user_type: msg.user_type.parse::<UserType>()?,
                user_name: msg.user_name,
                status: msg.status.parse::<RosterStatus>()?,
            };
            Ok(Decoded::Update(Update::fact_for_today(fact, received_at)))
        },
        QueueKind::Monitoring => {
            let envelope: Envelope = serde_json::from_slice(body)?;
            let timestamp = envelope.timestamp.unwrap_or(received_at);
            let fact = match envelope.message_type.trim().to_ascii_lowercase().as_str() {
                "monitoring_update" => {
                    let d: MonitoringData = data(envelope.data)?;
                    FactKind::MonitoringStatChanged {
                        status_name: d.status,
                        count: d.count,
                    }
                },
                "sla_update" => {
                    let d: SlaData = data(envelope.data)?;
                    FactKind::SlaHourChanged {
                        hour: d.hour,
                        completed: d.completed,
                        percentage: d.percentage,
                    }
                },
                _ => return Ok(Decoded::Ignored(envelope.message_type)),
            };
            Ok(Decoded::Update(Update::fact_for_today(fact, timestamp)))
        },
    }
}
