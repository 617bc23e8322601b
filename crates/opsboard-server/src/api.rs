use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::response::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use opsboard_core::snapshot::{DashboardSnapshot, HourSlot, SnapshotKey, StatItem};
use opsboard_core::time;

use crate::error::AppError;
use crate::state::AppState;

/// Envelope shared by every dashboard REST response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data: Some(data),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    pub date: Option<String>,
    #[serde(default)]
    pub is_backlog: bool,
}

impl DashboardQuery {
    /// Missing date means today.
    fn date(&self) -> Result<NaiveDate, AppError> {
        match self.date.as_deref().map(str::trim) {
            None | Some("") => Ok(time::today()),
            Some(raw) => time::parse_date(raw)
                .ok_or_else(|| AppError::BadRequest(format!("invalid date: {raw}"))),
        }
    }

    fn key(&self) -> Result<SnapshotKey, AppError> {
        Ok(SnapshotKey::new(self.date()?, self.is_backlog))
    }
}

/// GET /api/dashboard/summary
pub async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ApiResponse<DashboardSnapshot>>, AppError> {
    let snapshot = state.store.get(query.key()?).await;
    Ok(ApiResponse::ok(snapshot))
}

/// GET /api/dashboard/monitoring-stats
pub async fn get_monitoring_stats(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ApiResponse<BTreeMap<String, StatItem>>>, AppError> {
    let snapshot = state.store.get(query.key()?).await;
    Ok(ApiResponse::ok(snapshot.monitoring_stats))
}

/// GET /api/dashboard/sla-data
///
/// SLA series are only tracked for the live view.
pub async fn get_sla_data(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ApiResponse<Vec<HourSlot>>>, AppError> {
    let key = SnapshotKey::new(query.date()?, false);
    let snapshot = state.store.get(key).await;
    Ok(ApiResponse::ok(snapshot.hourly_series.to_vec()))
}
