pub mod config;
pub mod db;
pub mod duration;
pub mod error;
pub mod ingest;
pub mod model;
pub mod naming;
pub mod publish;
pub mod router;
pub mod transcode;
pub mod workspace;
