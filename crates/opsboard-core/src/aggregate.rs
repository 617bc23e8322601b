use std::sync::Arc;

use crate::facts::{
    DeltaEvent, Fact, FactKind, MonitoringStatDelta, PerformanceDelta, SlaDelta, UserStatusDelta,
};
use crate::snapshot::{DashboardSnapshot, HOURS_PER_DAY, RosterEntry, StatItem};
use crate::status_table::StatusTable;

/// Reasons a fact is refused. A refused fact leaves the snapshot untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregateError {
    #[error("SLA hour {0} is outside 0..=23")]
    HourOutOfRange(i64),
    #[error("{field} value {value} is not a valid count")]
    InvalidCount { field: &'static str, value: i64 },
    #[error("{field} must be a finite, non-negative number")]
    InvalidQuantity { field: &'static str },
}

/// Folds facts into snapshots. All domain rules for how a fact changes the
/// dashboard live here.
#[derive(Debug, Clone)]
pub struct Aggregator {
    table: Arc<StatusTable>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(Arc::new(StatusTable::default()))
    }
}

impl Aggregator {
    pub fn new(table: Arc<StatusTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &StatusTable {
        &self.table
    }

    /// Apply `fact` to `snapshot` and return the delta to broadcast.
    ///
    /// Every input is validated before the first write, so an `Err` always
    /// means the snapshot is unchanged.
    pub fn apply(
        &self,
        snapshot: &mut DashboardSnapshot,
        fact: &Fact,
    ) -> Result<DeltaEvent, AggregateError> {
        let timestamp = fact.timestamp;
        match &fact.kind {
            FactKind::UserStatusChanged {
                user_id,
                user_type,
                user_name,
                status,
            } => {
                let entry = snapshot
                    .roster_mut(*user_type)
                    .entry(*user_id)
                    .or_insert_with(|| RosterEntry::placeholder(*user_id));
                entry.status = *status;
                if let Some(name) = user_name.as_deref().map(str::trim)
                    && !name.is_empty()
                {
                    entry.name = name.to_string();
                }
                snapshot.recount(*user_type);

                Ok(DeltaEvent::UserStatus(UserStatusDelta {
                    user_id: *user_id,
                    user_type: *user_type,
                    status: *status,
                    timestamp,
                }))
            },

            FactKind::MonitoringStatChanged { status_name, count } => {
                let count = to_count("count", *count)?;
                let item = snapshot
                    .monitoring_stats
                    .entry(status_name.clone())
                    .or_insert_with(|| {
                        if !self.table.contains(status_name) {
                            tracing::debug!(
                                status = %status_name,
                                "Unlisted monitoring status, using neutral style"
                            );
                        }
                        let style = self.table.style(status_name);
                        StatItem {
                            count: 0,
                            color: style.color,
                            mandatory: style.mandatory,
                        }
                    });
                item.count = count;

                Ok(DeltaEvent::MonitoringStat(MonitoringStatDelta {
                    status_name: status_name.clone(),
                    count,
                    timestamp,
                }))
            },

            FactKind::SlaHourChanged {
                hour,
                completed,
                percentage,
            } => {
                let index = usize::try_from(*hour)
                    .ok()
                    .filter(|h| *h < HOURS_PER_DAY)
                    .ok_or(AggregateError::HourOutOfRange(*hour))?;
                let completed = to_count("completed", *completed)?;
                let percentage = to_quantity("percentage", *percentage)?;

                let slot = &mut snapshot.hourly_series[index];
                slot.completed = completed;
                slot.percentage = percentage;

                Ok(DeltaEvent::SlaHour(SlaDelta {
                    hour: slot.hour,
                    completed,
                    percentage,
                    timestamp,
                }))
            },

            FactKind::PerformanceChanged {
                user_id,
                user_type,
                completed,
                estimated_hours,
                actual_hours,
            } => {
                let completed = to_count("completed", *completed)?;
                let estimated_hours = to_quantity("estimatedHours", *estimated_hours)?;
                let actual_hours = to_quantity("actualHours", *actual_hours)?;

                let entry = snapshot
                    .roster_mut(*user_type)
                    .entry(*user_id)
                    .or_insert_with(|| RosterEntry::placeholder(*user_id));
                entry.completed_count = completed;
                entry.estimated_hours = estimated_hours;
                entry.actual_hours = actual_hours;
                let entry = entry.clone();
                // A lazily created entry changes the roster total.
                snapshot.recount(*user_type);

                Ok(DeltaEvent::Performance(PerformanceDelta {
                    user_type: *user_type,
                    entry,
                    timestamp,
                }))
            },
        }
    }
}

fn to_count(field: &'static str, value: i64) -> Result<u32, AggregateError> {
    u32::try_from(value).map_err(|_| AggregateError::InvalidCount { field, value })
}

fn to_quantity(field: &'static str, value: f64) -> Result<f64, AggregateError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AggregateError::InvalidQuantity { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{RosterStatus, RosterStats, SnapshotKey, UserId, UserType};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn fresh() -> DashboardSnapshot {
        DashboardSnapshot::empty(SnapshotKey::new(
            NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            false,
        ))
    }

    fn status(user_id: UserId, user_type: UserType, status: RosterStatus) -> Fact {
        Fact::now(FactKind::UserStatusChanged {
            user_id,
            user_type,
            user_name: None,
            status,
        })
    }

    fn stat(name: &str, count: i64) -> Fact {
        Fact::now(FactKind::MonitoringStatChanged {
            status_name: name.to_string(),
            count,
        })
    }

    fn sla(hour: i64, completed: i64, percentage: f64) -> Fact {
        Fact::now(FactKind::SlaHourChanged {
            hour,
            completed,
            percentage,
        })
    }

    #[test]
    fn idle_then_online_nets_one_online() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        let baseline = snap.agent_stats;

        agg.apply(&mut snap, &status(5, UserType::Agent, RosterStatus::Idle))
            .unwrap();
        assert_eq!(snap.agent_stats.idle, baseline.idle + 1);

        let delta = agg
            .apply(&mut snap, &status(5, UserType::Agent, RosterStatus::Online))
            .unwrap();

        assert_eq!(snap.agents[&5].status, RosterStatus::Online);
        assert_eq!(snap.agent_stats.online, baseline.online + 1);
        assert_eq!(snap.agent_stats.idle, baseline.idle);
        assert_eq!(snap.agent_stats.total, 1);
        match delta {
            DeltaEvent::UserStatus(d) => {
                assert_eq!(d.user_id, 5);
                assert_eq!(d.user_type, UserType::Agent);
                assert_eq!(d.status, RosterStatus::Online);
            },
            other => panic!("Expected UserStatus delta, got: {other:?}"),
        }
    }

    #[test]
    fn status_update_creates_unknown_user() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        let fact = Fact::now(FactKind::UserStatusChanged {
            user_id: 42,
            user_type: UserType::Reviewer,
            user_name: Some("Jennifer Lee".to_string()),
            status: RosterStatus::Online,
        });
        agg.apply(&mut snap, &fact).unwrap();

        let entry = &snap.reviewers[&42];
        assert_eq!(entry.name, "Jennifer Lee");
        assert_eq!(entry.completed_count, 0);
        assert!(snap.agents.is_empty());
        assert_eq!(
            snap.reviewer_stats,
            RosterStats {
                total: 1,
                online: 1,
                idle: 0,
                offline: 0
            }
        );
    }

    #[test]
    fn blank_name_keeps_existing_name() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        let mut entry = RosterEntry::placeholder(1);
        entry.name = "Mike Chen".to_string();
        snap.agents.insert(1, entry);

        let fact = Fact::now(FactKind::UserStatusChanged {
            user_id: 1,
            user_type: UserType::Agent,
            user_name: Some("  ".to_string()),
            status: RosterStatus::Idle,
        });
        agg.apply(&mut snap, &fact).unwrap();
        assert_eq!(snap.agents[&1].name, "Mike Chen");
    }

    #[test]
    fn live_stat_picks_up_configured_style() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        agg.apply(&mut snap, &stat("Live", 200)).unwrap();

        let item = &snap.monitoring_stats["Live"];
        assert_eq!(item.count, 200);
        assert!(item.mandatory);
        assert_eq!(item.color, "from-emerald-100 to-green-200");
    }

    #[test]
    fn unknown_stat_gets_neutral_style() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        agg.apply(&mut snap, &stat("Escalated", 3)).unwrap();

        let item = &snap.monitoring_stats["Escalated"];
        assert!(!item.mandatory);
        assert_eq!(item.color, crate::status_table::NEUTRAL_COLOR);
    }

    #[test]
    fn each_distinct_status_name_keeps_an_entry() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        agg.apply(&mut snap, &stat("Live", 1)).unwrap();
        agg.apply(&mut snap, &stat("Escalated", 2)).unwrap();
        agg.apply(&mut snap, &stat("Escalated", 0)).unwrap();
        agg.apply(&mut snap, &stat("Paused", 0)).unwrap();

        let names: Vec<&str> = snap.monitoring_stats.keys().map(String::as_str).collect();
        assert_eq!(names, ["Escalated", "Live", "Paused"]);
        assert_eq!(snap.monitoring_stats["Escalated"].count, 0);
    }

    #[test]
    fn stat_overwrite_preserves_style() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        snap.monitoring_stats.insert(
            "WFR".to_string(),
            StatItem {
                count: 1,
                color: "custom".to_string(),
                mandatory: false,
            },
        );
        agg.apply(&mut snap, &stat("WFR", 9)).unwrap();
        let item = &snap.monitoring_stats["WFR"];
        assert_eq!(item.count, 9);
        assert_eq!(item.color, "custom");
        assert!(!item.mandatory);
    }

    #[test]
    fn negative_stat_count_is_rejected() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        let before = snap.clone();
        let err = agg.apply(&mut snap, &stat("Live", -1)).unwrap_err();
        assert_eq!(
            err,
            AggregateError::InvalidCount {
                field: "count",
                value: -1
            }
        );
        assert_eq!(snap, before);
    }

    #[test]
    fn sla_hour_overwrites_slot() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        let delta = agg.apply(&mut snap, &sla(13, 40, 87.5)).unwrap();
        assert_eq!(snap.hourly_series[13].completed, 40);
        assert_eq!(snap.hourly_series[13].percentage, 87.5);
        assert!(matches!(delta, DeltaEvent::SlaHour(ref d) if d.hour == 13 && d.completed == 40));

        agg.apply(&mut snap, &sla(13, 45, 90.0)).unwrap();
        assert_eq!(snap.hourly_series[13].completed, 45);
    }

    #[test]
    fn sla_hour_out_of_range_is_rejected() {
        let agg = Aggregator::default();
        for hour in [-1, 24, 100] {
            let mut snap = fresh();
            let before = snap.clone();
            let err = agg.apply(&mut snap, &sla(hour, 5, 50.0)).unwrap_err();
            assert_eq!(err, AggregateError::HourOutOfRange(hour));
            assert_eq!(snap, before);
        }
    }

    #[test]
    fn sla_non_finite_percentage_is_rejected() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        let before = snap.clone();
        assert!(agg.apply(&mut snap, &sla(3, 5, f64::NAN)).is_err());
        assert_eq!(snap, before);
    }

    #[test]
    fn performance_upsert_carries_entry() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        agg.apply(&mut snap, &status(7, UserType::Agent, RosterStatus::Online))
            .unwrap();

        let fact = Fact::now(FactKind::PerformanceChanged {
            user_id: 7,
            user_type: UserType::Agent,
            completed: 45,
            estimated_hours: 8.5,
            actual_hours: 7.2,
        });
        let delta = agg.apply(&mut snap, &fact).unwrap();

        let entry = &snap.agents[&7];
        assert_eq!(entry.completed_count, 45);
        assert_eq!(entry.status, RosterStatus::Online);
        match delta {
            DeltaEvent::Performance(d) => assert_eq!(&d.entry, entry),
            other => panic!("Expected Performance delta, got: {other:?}"),
        }
        assert_eq!(snap.agent_stats.online, 1);
    }

    #[test]
    fn performance_negative_hours_rejected() {
        let agg = Aggregator::default();
        let mut snap = fresh();
        let fact = Fact::now(FactKind::PerformanceChanged {
            user_id: 7,
            user_type: UserType::Agent,
            completed: 1,
            estimated_hours: -2.0,
            actual_hours: 1.0,
        });
        assert_eq!(
            agg.apply(&mut snap, &fact).unwrap_err(),
            AggregateError::InvalidQuantity {
                field: "estimatedHours"
            }
        );
        assert!(snap.agents.is_empty());
    }

    fn arb_status() -> impl Strategy<Value = RosterStatus> {
        prop_oneof![
            Just(RosterStatus::Online),
            Just(RosterStatus::Idle),
            Just(RosterStatus::Offline),
        ]
    }

    proptest! {
        #[test]
        fn out_of_range_hours_never_touch_series(
            hour in prop_oneof![i64::MIN..0i64, 24i64..i64::MAX],
            completed in 0i64..1000,
        ) {
            let agg = Aggregator::default();
            let mut snap = fresh();
            agg.apply(&mut snap, &sla(3, 7, 70.0)).unwrap();
            let before = snap.hourly_series;
            prop_assert!(agg.apply(&mut snap, &sla(hour, completed, 10.0)).is_err());
            prop_assert_eq!(snap.hourly_series, before);
        }

        #[test]
        fn last_status_wins_across_interleavings(
            a in proptest::collection::vec(arb_status(), 1..12),
            b in proptest::collection::vec(arb_status(), 1..12),
            picks in proptest::collection::vec(any::<bool>(), 0..24),
        ) {
            let agg = Aggregator::default();

            // Reference: all of user 1, then all of user 2.
            let mut sequential = fresh();
            for s in &a {
                agg.apply(&mut sequential, &status(1, UserType::Agent, *s)).unwrap();
            }
            for s in &b {
                agg.apply(&mut sequential, &status(2, UserType::Agent, *s)).unwrap();
            }

            // Same per-user order, arbitrary cross-user interleaving.
            let mut interleaved = fresh();
            let (mut ia, mut ib) = (a.iter(), b.iter());
            let mut picks = picks.into_iter();
            loop {
                let take_a = picks.next().unwrap_or(true);
                let next = if take_a {
                    ia.next().map(|s| (1, *s)).or_else(|| ib.next().map(|s| (2, *s)))
                } else {
                    ib.next().map(|s| (2, *s)).or_else(|| ia.next().map(|s| (1, *s)))
                };
                let Some((id, s)) = next else { break };
                agg.apply(&mut interleaved, &status(id, UserType::Agent, s)).unwrap();
            }

            prop_assert_eq!(interleaved.agents[&1].status, *a.last().unwrap());
            prop_assert_eq!(interleaved.agents[&2].status, *b.last().unwrap());
            prop_assert_eq!(&interleaved, &sequential);
        }

        #[test]
        fn repeated_stat_fact_is_idempotent(
            name in prop_oneof![Just("Live".to_string()), "[A-Za-z ]{1,16}"],
            count in 0i64..100_000,
        ) {
            let agg = Aggregator::default();
            let fact = stat(&name, count);

            let mut once = fresh();
            agg.apply(&mut once, &fact).unwrap();

            let mut twice = fresh();
            agg.apply(&mut twice, &fact).unwrap();
            agg.apply(&mut twice, &fact).unwrap();

            prop_assert_eq!(once, twice);
        }
    }
}
