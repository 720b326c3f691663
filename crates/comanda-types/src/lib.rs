//! Common types module for the Comanda ordering core.
//!
//! This module defines the data types shared by every Comanda crate: orders and
//! their status vocabulary, temporary guest identities, accounts, storage
//! namespaces, the clock abstraction and configuration validation. Keeping them
//! in one crate guarantees that the tracking view and the admin surface read
//! the same definitions.

/// Account types produced by the authentication collaborator.
pub mod account;
/// Time source abstraction used for every expiry and timestamp decision.
pub mod clock;
/// Temporary guest profile and session types.
pub mod guest;
/// Order types including the canonical status set and its alias map.
pub mod order;
/// Self-registration trait for pluggable implementations.
pub mod registry;
/// Secure string wrapper for passwords.
pub mod secret_string;
/// Storage namespaces for persisted data.
pub mod storage;
/// Display formatting helpers.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use account::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use guest::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use storage::*;
pub use utils::{format_coarse_duration, format_remaining, truncate_id};
pub use validation::*;
