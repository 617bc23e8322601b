use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Display color used for monitoring statuses missing from the table.
pub const NEUTRAL_COLOR: &str = "from-gray-100 to-gray-200";

/// Fixed display metadata for one monitoring status name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusStyle {
    pub color: String,
    pub mandatory: bool,
}

impl StatusStyle {
    pub fn new(color: impl Into<String>, mandatory: bool) -> Self {
        Self {
            color: color.into(),
            mandatory,
        }
    }

    pub fn neutral() -> Self {
        Self::new(NEUTRAL_COLOR, false)
    }
}

/// Immutable status name → style table, handed to the aggregator at
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTable {
    entries: HashMap<String, StatusStyle>,
}

const BUILTIN: &[(&str, &str, bool)] = &[
    ("Un-Monitored", "from-red-100 to-red-200", true),
    ("Monitoring In Process", "from-amber-100 to-yellow-200", true),
    ("Not Ready", "from-gray-100 to-gray-200", true),
    ("WFR", "from-orange-100 to-orange-200", true),
    ("Live", "from-emerald-100 to-green-200", true),
    ("Review In Process", "from-blue-100 to-blue-200", true),
    ("Rejected", "from-red-200 to-red-300", true),
    ("Tickets Opened", "from-cyan-100 to-teal-200", true),
    ("DVR Down", "from-purple-100 to-purple-200", false),
    ("Archive Datalost", "from-pink-100 to-rose-200", false),
    ("On-Holiday", "from-indigo-100 to-indigo-200", false),
];

impl Default for StatusTable {
    fn default() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(name, color, mandatory)| (name.to_string(), StatusStyle::new(*color, *mandatory)))
            .collect();
        Self { entries }
    }
}

impl StatusTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Layer `overrides` on top of this table. Overrides win on name clashes.
    pub fn with_overrides(mut self, overrides: HashMap<String, StatusStyle>) -> Self {
        self.entries.extend(overrides);
        self
    }

    /// Style for `status`, falling back to the neutral style.
    pub fn style(&self, status: &str) -> StatusStyle {
        self.entries
            .get(status)
            .cloned()
            .unwrap_or_else(StatusStyle::neutral)
    }

    pub fn contains(&self, status: &str) -> bool {
        self.entries.contains_key(status)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_covers_known_statuses() {
        let table = StatusTable::default();
        assert_eq!(table.len(), 11);
        let live = table.style("Live");
        assert!(live.mandatory);
        assert_eq!(live.color, "from-emerald-100 to-green-200");
        assert!(!table.style("DVR Down").mandatory);
    }

    #[test]
    fn unknown_status_gets_neutral_style() {
        let table = StatusTable::default();
        assert!(!table.contains("Escalated"));
        assert_eq!(table.style("Escalated"), StatusStyle::neutral());
    }

    #[test]
    fn overrides_replace_and_extend() {
        let mut overrides = HashMap::new();
        overrides.insert("Live".to_string(), StatusStyle::new("green", false));
        overrides.insert("Escalated".to_string(), StatusStyle::new("red", true));
        let table = StatusTable::default().with_overrides(overrides);
        assert_eq!(table.len(), 12);
        assert_eq!(table.style("Live"), StatusStyle::new("green", false));
        assert!(table.style("Escalated").mandatory);
    }
}
