//! Utility functions and helpers
//!
//! Identifier normalization and the store-safe timestamp encoding.

pub mod ids;
pub mod time;

pub use ids::normalize;
pub use time::{is_unbounded, truncate_to_ticks, DateTimeJson, TimestampError};
