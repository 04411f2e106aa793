//! Database module: entity models and SQL repositories.
//!
//! - `model`: rows read back from `sessions`, `videos` and `class_papers`.
//! - `repo`: SQL-only functions that write and map those rows.
//!
//! The repository API is re-exported at `session_ingest::db::*`.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{ClassPaperRecord, SessionRecord, VideoRecord};
