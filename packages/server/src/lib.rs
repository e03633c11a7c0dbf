//! `TagBridge` server — bus ingestion, identifier resolution, real-time
//! channel fan-out, and reader device control.

pub mod bus;
pub mod config;
pub mod device;
pub mod ingest;
pub mod network;
pub mod publisher;
pub mod readers;
