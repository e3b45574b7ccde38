//! Lodestar engagement core
//!
//! Query and update layer for the Engagement documents behind the Lodestar
//! backend:
//! - Search expressions compiled to typed predicates
//! - Paging, projection, unwind and group-by compiled to aggregation pipelines
//! - Compare-and-swap updates guarded by the `lastUpdate` version token
//! - An in-memory document store implementing the full stage vocabulary

#![allow(
    clippy::large_enum_variant,      // Stage variants are plain data
)]

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{Error, Result};
