use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection, Row};

use crate::feed::{ChangeFeed, FeedError};
use crate::record::ChangeRecord;

/// Change feed backed by a Postgres set-returning function.
///
/// The function must return `(message_type text, message_body text,
/// created_at timestamptz)` and mark the rows it returns as consumed.
pub struct PgChangeFeed {
    database_url: String,
    query: String,
}

/// Plain or schema-qualified SQL identifier.
fn is_valid_function_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').count() <= 2
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

impl PgChangeFeed {
    pub fn new(database_url: &str, function: &str) -> Result<Self, FeedError> {
        if !is_valid_function_name(function) {
            return Err(FeedError::InvalidFunction(function.to_string()));
        }
        Ok(Self {
            database_url: database_url.to_string(),
            query: format!("SELECT message_type, message_body, created_at FROM {function}()"),
        })
    }
}

impl ChangeFeed for PgChangeFeed {
    /// Opens a fresh connection per cycle; a dropped database recovers on the
    /// next poll without pool bookkeeping.
    async fn fetch_pending(&self) -> Result<Vec<ChangeRecord>, FeedError> {
        let mut conn = PgConnection::connect(&self.database_url).await?;
        let rows = sqlx::query(&self.query).fetch_all(&mut conn).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let message_type: Option<String> = row.try_get("message_type")?;
            let message_body: Option<String> = row.try_get("message_body")?;
            let timestamp: DateTime<Utc> = row.try_get("created_at")?;
            records.push(ChangeRecord {
                message_type: message_type.unwrap_or_default(),
                message_body: message_body.unwrap_or_default(),
                timestamp,
            });
        }
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Error closing change-feed connection");
        }
        Ok(records)
    }
}
