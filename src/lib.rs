//! tgstat - Telegram chat statistics backfiller
//!
//! Reads Telegram chat exports, turns every message into counter increments
//! and renders them as an evenly sampled history that time-series databases
//! can bulk import. The resampling engine lives in [`backfill`] and has no
//! knowledge of chats, files or HTTP.

pub mod analysis;
pub mod backfill;
pub mod cli;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod tgexport;
pub mod victoria;
