//! Database entity models returned by repositories.
//!
//! Keep these structs focused on the data returned by queries. Pipeline logic
//! lives in the ingestion and router modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: i64,
    pub title: String,
    pub is_ready: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoRecord {
    pub id: i64,
    pub path: String,
    pub duration: String,
    pub session_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassPaperRecord {
    pub id: i64,
    pub title: String,
    pub path: String,
    pub session_id: i64,
    pub created_at: DateTime<Utc>,
}
