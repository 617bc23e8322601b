use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of hourly SLA slots in a snapshot.
pub const HOURS_PER_DAY: usize = 24;

/// Identifier of an agent or reviewer.
pub type UserId = i32;

/// Identifies one dashboard view: a calendar date in live or backlog mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotKey {
    pub date: NaiveDate,
    pub is_backlog: bool,
}

impl SnapshotKey {
    pub fn new(date: NaiveDate, is_backlog: bool) -> Self {
        Self { date, is_backlog }
    }

    /// Today's live (non-backlog) view, the default scope for pushes.
    pub fn today() -> Self {
        Self::new(crate::time::today(), false)
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.is_backlog { "backlog" } else { "live" };
        write!(f, "{}/{mode}", self.date)
    }
}

/// Returned when a roster field arrives with a value outside its vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Which roster a user belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserType {
    Agent,
    Reviewer,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => write!(f, "Agent"),
            Self::Reviewer => write!(f, "Reviewer"),
        }
    }
}

impl FromStr for UserType {
    type Err = UnknownVariant;

    /// Case-insensitive, since producers are not consistent about casing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "reviewer" => Ok(Self::Reviewer),
            _ => Err(UnknownVariant {
                kind: "user type",
                value: s.to_string(),
            }),
        }
    }
}

/// Live presence of an agent or reviewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterStatus {
    Online,
    Idle,
    #[default]
    Offline,
}

impl fmt::Display for RosterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Idle => write!(f, "idle"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for RosterStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "idle" => Ok(Self::Idle),
            "offline" => Ok(Self::Offline),
            _ => Err(UnknownVariant {
                kind: "roster status",
                value: s.to_string(),
            }),
        }
    }
}

/// Performance tier shown next to each roster entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

/// One agent or reviewer as displayed on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: UserId,
    pub name: String,
    pub status: RosterStatus,
    pub completed_count: u32,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub rank: Rank,
}

impl RosterEntry {
    /// Entry created for a user we have no metadata for yet.
    pub fn placeholder(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            status: RosterStatus::default(),
            completed_count: 0,
            estimated_hours: 0.0,
            actual_hours: 0.0,
            rank: Rank::default(),
        }
    }
}

/// Online/idle/offline tally for one roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    pub total: u32,
    pub online: u32,
    pub idle: u32,
    pub offline: u32,
}

impl RosterStats {
    pub fn tally<'a>(entries: impl IntoIterator<Item = &'a RosterEntry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.total += 1;
            match entry.status {
                RosterStatus::Online => stats.online += 1,
                RosterStatus::Idle => stats.idle += 1,
                RosterStatus::Offline => stats.offline += 1,
            }
        }
        stats
    }
}

/// Count for one monitoring status, with its display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatItem {
    pub count: u32,
    pub color: String,
    pub mandatory: bool,
}

/// Completed work and SLA percentage for one hour of the day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourSlot {
    pub hour: u8,
    pub completed: u32,
    pub percentage: f64,
}

impl HourSlot {
    pub fn empty(hour: u8) -> Self {
        Self {
            hour,
            ..Self::default()
        }
    }
}

/// Complete aggregated dashboard state for one [`SnapshotKey`].
///
/// The hourly series is a fixed-size array, so a snapshot always has exactly
/// one slot per hour of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub monitoring_stats: BTreeMap<String, StatItem>,
    pub hourly_series: [HourSlot; HOURS_PER_DAY],
    pub agents: BTreeMap<UserId, RosterEntry>,
    pub reviewers: BTreeMap<UserId, RosterEntry>,
    pub agent_stats: RosterStats,
    pub reviewer_stats: RosterStats,
    pub as_of_date: NaiveDate,
    pub is_backlog: bool,
}

impl DashboardSnapshot {
    /// Empty snapshot: zeroed hours, no rosters, no monitoring stats.
    pub fn empty(key: SnapshotKey) -> Self {
        Self {
            monitoring_stats: BTreeMap::new(),
            hourly_series: std::array::from_fn(|h| HourSlot::empty(h as u8)),
            agents: BTreeMap::new(),
            reviewers: BTreeMap::new(),
            agent_stats: RosterStats::default(),
            reviewer_stats: RosterStats::default(),
            as_of_date: key.date,
            is_backlog: key.is_backlog,
        }
    }

    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::new(self.as_of_date, self.is_backlog)
    }

    pub fn roster(&self, user_type: UserType) -> &BTreeMap<UserId, RosterEntry> {
        match user_type {
            UserType::Agent => &self.agents,
            UserType::Reviewer => &self.reviewers,
        }
    }

    pub fn roster_mut(&mut self, user_type: UserType) -> &mut BTreeMap<UserId, RosterEntry> {
        match user_type {
            UserType::Agent => &mut self.agents,
            UserType::Reviewer => &mut self.reviewers,
        }
    }

    pub fn roster_stats(&self, user_type: UserType) -> RosterStats {
        match user_type {
            UserType::Agent => self.agent_stats,
            UserType::Reviewer => self.reviewer_stats,
        }
    }

    /// Recompute the online/idle/offline tally for one roster.
    pub fn recount(&mut self, user_type: UserType) {
        let stats = RosterStats::tally(self.roster(user_type).values());
        match user_type {
            UserType::Agent => self.agent_stats = stats,
            UserType::Reviewer => self.reviewer_stats = stats,
        }
    }
}
