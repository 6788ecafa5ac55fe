//! prospector - lead discovery and outreach orchestration
//!
//! This crate provides:
//! - Directory-based lead discovery with deduplication and scoring
//! - Website technical analysis driving lead re-qualification
//! - A fixed 4-step email sequence with quota, retry, and suppression
//! - Reconciliation of provider delivery events back onto the send log

pub mod analyze;
pub mod commands;
pub mod config;
pub mod db;
pub mod directory;
pub mod discovery;
pub mod dispatch;
pub mod enrich;
pub mod error;
pub mod quota;
pub mod reconcile;
pub mod scoring;
pub mod sequence;
pub mod templates;

pub use config::Config;
pub use error::{Error, Result};
