//! Builder pattern for constructing Comanda engines.
//!
//! Composes a [`ComandaEngine`] from the configured storage backend and
//! authentication collaborator, each created through a factory function
//! looked up by implementation name.

use crate::engine::ComandaEngine;
use crate::guest::GuestSettings;
use comanda_account::{AuthError, AuthInterface, AuthService};
use comanda_config::Config;
use comanda_storage::{StorageError, StorageInterface, StorageService};
use comanda_types::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Factory functions for every pluggable component, keyed by implementation name.
pub struct ComandaFactories<SF, AF> {
	pub storage_factories: HashMap<String, SF>,
	pub auth_factories: HashMap<String, AF>,
}

/// Builder for constructing a ComandaEngine with pluggable implementations.
pub struct ComandaBuilder {
	config: Config,
	clock: Arc<dyn Clock>,
}

impl ComandaBuilder {
	/// Creates a new ComandaBuilder on wall-clock time.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the clock used by the lifecycle and guest components.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Builds the ComandaEngine using the primary implementation of each component.
	pub fn build<SF, AF>(
		self,
		factories: ComandaFactories<SF, AF>,
	) -> Result<ComandaEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		AF: Fn(&toml::Value) -> Result<Box<dyn AuthInterface>, AuthError>,
	{
		let (storage_name, storage_config) = self.config.primary_storage().ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' has no configuration",
				self.config.storage.primary
			))
		})?;
		let storage_factory = factories.storage_factories.get(storage_name).ok_or_else(|| {
			BuilderError::Config(format!("Unknown storage implementation '{}'", storage_name))
		})?;
		let storage_backend = storage_factory(storage_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %storage_name,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				storage_name, e
			))
		})?;
		tracing::info!(component = "storage", implementation = %storage_name, "Loaded");

		let (auth_name, auth_config) = self.config.primary_account().ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary account implementation '{}' has no configuration",
				self.config.account.primary
			))
		})?;
		let auth_factory = factories.auth_factories.get(auth_name).ok_or_else(|| {
			BuilderError::Config(format!("Unknown account implementation '{}'", auth_name))
		})?;
		let auth_backend = auth_factory(auth_config).map_err(|e| {
			tracing::error!(
				component = "account",
				implementation = %auth_name,
				error = %e,
				"Failed to create account implementation"
			);
			BuilderError::Config(format!(
				"Failed to create account implementation '{}': {}",
				auth_name, e
			))
		})?;
		tracing::info!(component = "account", implementation = %auth_name, "Loaded");

		let guest_settings = GuestSettings {
			ttl: Duration::from_secs(self.config.guest.ttl_seconds),
			id_prefix: self.config.guest.id_prefix.clone(),
		};

		Ok(ComandaEngine::new(
			self.config,
			Arc::new(StorageService::new(storage_backend)),
			Arc::new(AuthService::new(auth_backend)),
			self.clock,
			guest_settings,
		))
	}
}
