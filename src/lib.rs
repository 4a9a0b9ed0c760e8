//! Receives Freshdesk webhook callbacks, tags each with a request id and
//! receipt timestamp, and persists it as a JSON record.

pub mod config;
pub mod error;
pub mod ids;
pub mod receiver;
pub mod store;
pub mod telemetry;
pub mod time;
pub mod types;

pub use config::Config;
pub use error::{ReceiverError, StorageError};
pub use receiver::Receiver;
pub use store::{FsSink, StorageSink};
