//! In-memory stores

pub mod stats;

pub use stats::{PlayerStats, StatsStore};
