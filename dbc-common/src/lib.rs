//! # DBC Common Library
//!
//! Shared code for the DBC (daily-based challenges) services including:
//! - Error and result types
//! - Configuration loading (CLI / ENV / TOML / defaults)
//! - Day-granularity date handling and the injectable clock
//! - Database bootstrap (pool, pragmas, table creation)

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, FixedClock, SystemClock};
