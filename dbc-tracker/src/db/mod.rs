//! Repositories
//!
//! Free async functions over any SQLite executor, so the same call runs on the
//! pool or inside a transaction (`&mut *tx`).

pub mod categories;
pub mod challenges;
pub mod news;
pub mod tracks;
pub mod users;
