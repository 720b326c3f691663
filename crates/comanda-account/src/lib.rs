//! Authentication collaborator for Comanda.
//!
//! The guest migration flow hands a resolved registration to an
//! [`AuthInterface`] implementation and only cleans up the temporary identity
//! when registration succeeds. Implementations are pluggable through the same
//! factory/registry pattern as storage.

use async_trait::async_trait;
use comanda_types::{Account, AccountRegistration, ConfigSchema, ImplementationRegistry};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AuthError {
	/// Another account already uses this email address.
	#[error("An account with email {0} already exists")]
	DuplicateEmail(String),
	/// Registration fields failed validation.
	#[error("Invalid registration: {0}")]
	InvalidRegistration(String),
	/// Error that occurs when interacting with the implementation.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Trait defining the interface for authentication implementations.
#[async_trait]
pub trait AuthInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Creates a permanent account.
	async fn register(&self, registration: AccountRegistration) -> Result<Account, AuthError>;

	/// Looks up an account by id.
	async fn find_account(&self, id: &str) -> Result<Option<Account>, AuthError>;
}

/// Type alias for authentication factory functions.
pub type AuthFactory = fn(&toml::Value) -> Result<Box<dyn AuthInterface>, AuthError>;

/// Registry trait for authentication implementations.
pub trait AuthRegistry: ImplementationRegistry<Factory = AuthFactory> {}

/// Get all registered authentication implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, AuthFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Service that manages account operations.
pub struct AuthService {
	implementation: Box<dyn AuthInterface>,
}

impl AuthService {
	pub fn new(implementation: Box<dyn AuthInterface>) -> Self {
		Self { implementation }
	}

	/// Registers a new permanent account.
	pub async fn register(&self, registration: AccountRegistration) -> Result<Account, AuthError> {
		self.implementation.register(registration).await
	}

	/// Looks up an account by id.
	pub async fn find_account(&self, id: &str) -> Result<Option<Account>, AuthError> {
		self.implementation.find_account(id).await
	}
}
