pub mod aggregate;
pub mod facts;
pub mod ingest;
pub mod net;
pub mod snapshot;
pub mod status_table;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::facts::{Fact, FactKind};
    use crate::snapshot::{RosterStatus, SnapshotKey, UserId, UserType};

    /// A fixed, non-today key so tests do not depend on the wall clock.
    pub fn fixed_key() -> SnapshotKey {
        SnapshotKey::new(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap_or_default(), false)
    }

    fn stamp(kind: FactKind) -> Fact {
        let ts = Utc
            .with_ymd_and_hms(2026, 1, 15, 12, 0, 0)
            .single()
            .unwrap_or_default();
        Fact::new(kind, ts)
    }

    pub fn status_fact(user_id: UserId, user_type: UserType, status: RosterStatus) -> Fact {
        stamp(FactKind::UserStatusChanged {
            user_id,
            user_type,
            user_name: None,
            status,
        })
    }

    pub fn stat_fact(status_name: &str, count: i64) -> Fact {
        stamp(FactKind::MonitoringStatChanged {
            status_name: status_name.to_string(),
            count,
        })
    }

    pub fn sla_fact(hour: i64, completed: i64, percentage: f64) -> Fact {
        stamp(FactKind::SlaHourChanged {
            hour,
            completed,
            percentage,
        })
    }

    pub fn performance_fact(
        user_id: UserId,
        user_type: UserType,
        completed: i64,
        estimated_hours: f64,
        actual_hours: f64,
    ) -> Fact {
        stamp(FactKind::PerformanceChanged {
            user_id,
            user_type,
            completed,
            estimated_hours,
            actual_hours,
        })
    }
}
