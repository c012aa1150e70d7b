use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A numbered storage directory and its usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct FolderShard {
    pub id: i32,
    /// Default images routed into this shard
    pub image_count: i32,
    /// Bytes of default renditions stored here
    pub total_size: i64,
    pub created_at: DateTime<Utc>,
}

impl FolderShard {
    /// Whether another default image may still be routed here.
    pub fn has_room(&self, capacity: i32) -> bool {
        self.image_count < capacity
    }
}
