//! Utility functions for display formatting.

pub mod formatting;

pub use formatting::{format_coarse_duration, format_remaining, truncate_id};
