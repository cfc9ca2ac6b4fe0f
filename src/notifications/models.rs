//! Notification data models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Emitted after the accumulated rollup was durably replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RollupEvent {
    /// A statement batch was merged in.
    AccumulatedRollupChanged {
        revision: i64,
        batch_id: String,
        total_revenue: Decimal,
        total_streams: u64,
        changed_at: i64,
    },
    /// The accumulated rollup was recomputed from the batch log.
    AccumulatedRollupRebuilt {
        revision: i64,
        batch_count: usize,
        total_revenue: Decimal,
        changed_at: i64,
    },
}

impl RollupEvent {
    pub fn revision(&self) -> i64 {
        match self {
            RollupEvent::AccumulatedRollupChanged { revision, .. }
            | RollupEvent::AccumulatedRollupRebuilt { revision, .. } => *revision,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RollupEvent::AccumulatedRollupChanged { .. } => "accumulated_rollup_changed",
            RollupEvent::AccumulatedRollupRebuilt { .. } => "accumulated_rollup_rebuilt",
        }
    }
}
