pub mod config;
pub mod feed;
pub mod poller;
pub mod postgres;
pub mod record;

pub use config::PollerConfig;
pub use feed::{ChangeFeed, FeedError};
pub use poller::ChangeFeedPoller;
pub use postgres::PgChangeFeed;
pub use record::{ChangeRecord, RecordError, process_record};
