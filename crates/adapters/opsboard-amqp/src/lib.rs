pub mod config;
pub mod consumer;
pub mod decode;

pub use config::AmqpConfig;
pub use consumer::{ConsumerError, Disposition, QueueConsumer, handle_delivery};
pub use decode::{Decoded, DecodeError, QueueKind};
