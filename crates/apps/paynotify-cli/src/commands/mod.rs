//! CLI command implementations.

pub mod config;
pub mod enqueue;
pub mod notify;
pub mod poll;
pub mod serve;
pub mod stats;
pub mod subscribe;
pub mod worker;

// Re-export command handlers
pub use config::config;
pub use enqueue::enqueue;
pub use notify::notify;
pub use poll::poll;
pub use serve::serve;
pub use stats::stats;
pub use subscribe::{subscribe, unsubscribe, users};
pub use worker::worker;
