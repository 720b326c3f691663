//! Runtime container for the lifecycle, guest and checkout services.
//!
//! The engine owns the shared storage and authentication services and runs the
//! background sweep that drops expired storage entries.

use crate::checkout::CheckoutService;
use crate::guest::{GuestDirectory, GuestSessionManager, GuestSettings};
use crate::lifecycle::OrderLifecycle;
use comanda_account::AuthService;
use comanda_config::Config;
use comanda_storage::StorageService;
use comanda_types::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while the engine is running.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

pub struct ComandaEngine {
	config: Config,
	storage: Arc<StorageService>,
	auth: Arc<AuthService>,
	clock: Arc<dyn Clock>,
	lifecycle: Arc<OrderLifecycle>,
	guests: Arc<GuestDirectory>,
	checkout: Arc<CheckoutService>,
}

impl ComandaEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		auth: Arc<AuthService>,
		clock: Arc<dyn Clock>,
		guest_settings: GuestSettings,
	) -> Self {
		let lifecycle = Arc::new(OrderLifecycle::new(storage.clone(), clock.clone()));
		let guests = Arc::new(GuestDirectory::new(
			storage.clone(),
			auth.clone(),
			clock.clone(),
			guest_settings,
		));
		let checkout = Arc::new(CheckoutService::new(
			lifecycle.clone(),
			guests.clone(),
			clock.clone(),
		));

		Self {
			config,
			storage,
			auth,
			clock,
			lifecycle,
			guests,
			checkout,
		}
	}

	/// Runs the expiry sweep until ctrl-c.
	pub async fn run(&self) -> Result<(), EngineError> {
		let interval_secs = self.config.storage.cleanup_interval_seconds;
		if interval_secs == 0 {
			return Err(EngineError::Config(
				"cleanup_interval_seconds must be positive".into(),
			));
		}

		let storage = self.storage.clone();
		let cleanup_handle = tokio::spawn(async move {
			let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
			loop {
				interval.tick().await;
				sweep_expired(&storage).await;
			}
		});

		tracing::info!(
			service_id = %self.config.service.id,
			cleanup_interval_seconds = interval_secs,
			"Engine running"
		);

		let shutdown = tokio::signal::ctrl_c().await;
		cleanup_handle.abort();
		shutdown.map_err(|e| EngineError::Service(format!("Failed to wait for shutdown signal: {}", e)))?;

		tracing::info!("Engine stopped");
		Ok(())
	}

	/// Drops expired storage entries once.
	pub async fn cleanup_expired(&self) -> usize {
		sweep_expired(&self.storage).await
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn auth(&self) -> &Arc<AuthService> {
		&self.auth
	}

	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	pub fn lifecycle(&self) -> &Arc<OrderLifecycle> {
		&self.lifecycle
	}

	pub fn checkout(&self) -> &Arc<CheckoutService> {
		&self.checkout
	}

	/// Guest operations for one device scope.
	pub fn guest(&self, scope: impl Into<String>) -> GuestSessionManager {
		self.guests.for_scope(scope)
	}
}

async fn sweep_expired(storage: &StorageService) -> usize {
	match storage.cleanup_expired().await {
		Ok(count) => {
			if count > 0 {
				tracing::debug!("Storage cleanup: removed {} expired entries", count);
			}
			count
		},
		Err(e) => {
			tracing::warn!("Storage cleanup failed: {}", e);
			0
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use comanda_account::implementations::local::LocalAuth;
	use comanda_storage::implementations::memory::MemoryStorage;
	use comanda_types::{GuestPrefill, ManualClock, StorageKey};

	#[tokio::test]
	async fn test_sweep_drops_expired_guest_records() {
		let config: Config = r#"
[service]
id = "sweep"
[storage]
primary = "memory"
[storage.implementations.memory]
[account]
primary = "local"
[account.implementations.local]
"#
		.parse()
		.unwrap();
		let clock = Arc::new(ManualClock::new(0));
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::with_clock(
			clock.clone(),
		))));
		let engine = ComandaEngine::new(
			config,
			storage.clone(),
			Arc::new(AuthService::new(Box::new(LocalAuth::default()))),
			clock.clone(),
			GuestSettings::default(),
		);

		engine
			.guest("device-1")
			.create_temp_profile(GuestPrefill::with_name("Ana"))
			.await
			.unwrap();
		assert_eq!(engine.cleanup_expired().await, 0);

		clock.advance(Duration::from_secs(7200));
		assert_eq!(engine.cleanup_expired().await, 2);
		assert!(!storage
			.exists(StorageKey::GuestProfiles, "device-1")
			.await
			.unwrap());
	}
}
