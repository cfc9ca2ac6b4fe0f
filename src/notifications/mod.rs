//! Rollup change notifications for read-only collaborators.

mod models;
mod service;

pub use models::RollupEvent;
pub use service::{RollupNotifier, DEFAULT_EVENT_CHANNEL_CAPACITY};
