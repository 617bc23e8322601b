use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};

/// Current local calendar date, the "today" of the dashboard.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Current instant in UTC.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a date that may arrive as `2026-01-01`, an RFC 3339 timestamp, or a
/// naive `2026-01-01T00:00:00` datetime. Time-of-day is discarded.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    parse_timestamp(s).map(|ts| ts.date_naive())
}

/// Parse a timestamp with or without an offset. Naive values are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serde adapter for dates sent in any of the shapes [`parse_date`] accepts.
pub mod flexible_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(date)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_date(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw:?}")))
    }
}

/// Serde adapter for optional producer timestamps. Missing, null, or
/// unparseable values become `None` so the receiver can stamp its own time.
pub mod lenient_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().and_then(super::parse_timestamp))
    }
}
