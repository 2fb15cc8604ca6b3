//! Partition keys for the processed store.
//!
//! The layout is consumed by an external federated SQL engine, which
//! discovers partitions from the `name=value` path segments.

use chrono::{DateTime, FixedOffset};
use std::fmt;

/// Partition coordinates derived from a record's target table and arrival
/// timestamp. Derivation is deterministic: one (table, arrival) pair always
/// yields the same key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionKey {
    table: String,
    time_path: String,
}

impl PartitionKey {
    pub fn new(table: &str, arrived_at: &DateTime<FixedOffset>) -> Self {
        PartitionKey {
            table: table.to_string(),
            time_path: arrived_at
                .format("year=%Y/month=%m/day=%d/hour=%H/minute=%M/second=%S")
                .to_string(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Relative path of this partition, e.g.
    /// `table=myTable/year=2026/month=01/day=02/hour=15/minute=04/second=05`.
    pub fn path(&self) -> String {
        format!("table={}/{}", self.table, self.time_path)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
