//! Core services for Comanda.
//!
//! Order lifecycle tracking, temporary guest sessions and checkout, wired
//! together by [`ComandaBuilder`] into a [`ComandaEngine`].

pub mod builder;
pub mod checkout;
pub mod engine;
pub mod guest;
pub mod lifecycle;

pub use builder::{BuilderError, ComandaBuilder, ComandaFactories};
pub use checkout::{CheckoutError, CheckoutIdentity, CheckoutService};
pub use engine::{ComandaEngine, EngineError};
pub use guest::{GuestDirectory, GuestSessionError, GuestSessionManager, GuestSettings};
pub use lifecycle::{
	elapsed_time, next_action_label, next_status, normalize_status, plan_transition,
	status_color, status_label, OrderLifecycle, OrderLifecycleError, StatusPresentation,
	StatusView,
};
