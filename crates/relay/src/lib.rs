pub mod config;
pub mod consumer;
pub mod logging;
pub mod producer;

pub use config::{RelayConfig, Role};
pub use consumer::{Consumer, ConsumerSummary};
pub use producer::{MSG_TYPE_ID, Producer};
