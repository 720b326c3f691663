//! Temporary guest identities.
//!
//! A guest who checks out without registering receives a [`TempProfile`] and a
//! paired [`GuestSession`], both stored under the guest's device scope with the
//! configured time-to-live. Expiry is enforced in two places: the storage
//! backend drops the records on its cleanup sweep, and every read here checks
//! `expires_at` itself. Only the read-side check is relied upon.

use comanda_account::AuthService;
use comanda_storage::{StorageError, StorageService};
use comanda_types::{
	format_remaining, truncate_id, Account, AccountRegistration, Clock, GuestPrefill,
	GuestSession, RegistrationData, ResumedGuest, StorageKey, TempProfile,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// One lock per device scope, held while a profile is looked up and minted.
type ScopeLocks = Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>;

/// Errors returned by guest session operations.
///
/// Reads never fail: missing, expired or unreadable records all read as `None`.
#[derive(Debug, Error)]
pub enum GuestSessionError {
	#[error("Guest storage unavailable: {0}")]
	StorageUnavailable(String),
	#[error("Could not convert guest into an account: {0}")]
	MigrationFailed(String),
}

/// Lifetime and id format of temporary profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestSettings {
	pub ttl: Duration,
	pub id_prefix: String,
}

impl Default for GuestSettings {
	fn default() -> Self {
		Self {
			ttl: Duration::from_secs(2 * 60 * 60),
			id_prefix: "temp_".to_string(),
		}
	}
}

/// Shared dependencies from which per-scope managers are created.
pub struct GuestDirectory {
	storage: Arc<StorageService>,
	auth: Arc<AuthService>,
	clock: Arc<dyn Clock>,
	settings: GuestSettings,
	scope_locks: ScopeLocks,
}

impl GuestDirectory {
	pub fn new(
		storage: Arc<StorageService>,
		auth: Arc<AuthService>,
		clock: Arc<dyn Clock>,
		settings: GuestSettings,
	) -> Self {
		Self {
			storage,
			auth,
			clock,
			settings,
			scope_locks: ScopeLocks::default(),
		}
	}

	/// Returns the manager for one device scope.
	pub fn for_scope(&self, scope: impl Into<String>) -> GuestSessionManager {
		GuestSessionManager {
			storage: self.storage.clone(),
			auth: self.auth.clone(),
			clock: self.clock.clone(),
			settings: self.settings.clone(),
			scope: scope.into(),
			scope_locks: self.scope_locks.clone(),
		}
	}

	pub fn settings(&self) -> &GuestSettings {
		&self.settings
	}
}

/// Guest profile and session operations for a single device scope.
///
/// A scope holds at most one profile and one session; creating a new profile
/// replaces whatever was there.
pub struct GuestSessionManager {
	storage: Arc<StorageService>,
	auth: Arc<AuthService>,
	clock: Arc<dyn Clock>,
	settings: GuestSettings,
	scope: String,
	scope_locks: ScopeLocks,
}

impl GuestSessionManager {
	pub fn scope(&self) -> &str {
		&self.scope
	}

	/// Mints a new temporary profile and its session.
	pub async fn create_temp_profile(
		&self,
		prefill: GuestPrefill,
	) -> Result<TempProfile, GuestSessionError> {
		let now = self.clock.now();
		let id = format!("{}{}", self.settings.id_prefix, uuid::Uuid::new_v4().simple());
		let profile = TempProfile::from_prefill(id, prefill, now, self.settings.ttl.as_secs());
		let session = GuestSession::for_profile(&profile);

		self.storage
			.store_with_ttl(
				StorageKey::GuestProfiles,
				&self.scope,
				&profile,
				Some(self.settings.ttl),
			)
			.await
			.map_err(|e| GuestSessionError::StorageUnavailable(e.to_string()))?;

		if let Err(e) = self
			.storage
			.store_with_ttl(
				StorageKey::GuestSessions,
				&self.scope,
				&session,
				Some(self.settings.ttl),
			)
			.await
		{
			// A profile without a session can never be resumed
			if let Err(cleanup) = self.storage.remove(StorageKey::GuestProfiles, &self.scope).await {
				tracing::warn!(scope = %self.scope, error = %cleanup, "Failed to roll back guest profile");
			}
			return Err(GuestSessionError::StorageUnavailable(e.to_string()));
		}

		tracing::info!(
			guest_id = %truncate_id(&profile.id),
			scope = %self.scope,
			expires_at = profile.expires_at,
			"Created temporary guest profile"
		);
		Ok(profile)
	}

	/// Returns the live temporary profile, deleting it if it has expired.
	pub async fn get_temp_profile(&self) -> Option<TempProfile> {
		let profile: TempProfile = self.read(StorageKey::GuestProfiles).await?;
		if profile.is_expired_at(self.clock.now()) {
			tracing::debug!(
				guest_id = %truncate_id(&profile.id),
				scope = %self.scope,
				"Guest profile expired, removing"
			);
			if let Err(e) = self.remove_records().await {
				tracing::warn!(scope = %self.scope, error = %e, "Failed to remove expired guest records");
			}
			return None;
		}
		Some(profile)
	}

	/// Returns the live profile together with its session.
	///
	/// Both records must exist, be unexpired and refer to the same profile id.
	pub async fn reactivate_temp_session(&self) -> Option<ResumedGuest> {
		let profile = self.get_temp_profile().await?;
		let session: GuestSession = self.read(StorageKey::GuestSessions).await?;

		if session.user_id != profile.id {
			tracing::warn!(
				scope = %self.scope,
				profile_id = %truncate_id(&profile.id),
				session_user = %truncate_id(&session.user_id),
				"Guest session does not match profile"
			);
			return None;
		}
		if !session.is_live_at(self.clock.now()) {
			return None;
		}
		Some(ResumedGuest { profile, session })
	}

	/// Stamps the session's last access time. Does nothing without a live session.
	pub async fn update_session_access(&self) -> Result<(), GuestSessionError> {
		let Some(ResumedGuest {
			profile,
			mut session,
		}) = self.reactivate_temp_session().await
		else {
			return Ok(());
		};

		let now = self.clock.now();
		session.last_access = now;
		let remaining = Duration::from_secs(profile.remaining_at(now));
		self.storage
			.store_with_ttl(StorageKey::GuestSessions, &self.scope, &session, Some(remaining))
			.await
			.map_err(|e| GuestSessionError::StorageUnavailable(e.to_string()))
	}

	/// Returns the live profile or mints a new one from `prefill`.
	///
	/// Concurrent calls for the same scope are serialized so they all end up
	/// with the same profile.
	pub async fn get_or_create_temp_profile(
		&self,
		prefill: GuestPrefill,
	) -> Result<TempProfile, GuestSessionError> {
		let scope_lock = self.scope_lock().await;
		let _guard = scope_lock.lock().await;
		match self.get_temp_profile().await {
			Some(profile) => Ok(profile),
			None => self.create_temp_profile(prefill).await,
		}
	}

	/// Turns the live guest into a registered account.
	///
	/// Fields given in `registration` take precedence over the profile's. The
	/// guest records are deleted only after registration succeeds.
	pub async fn migrate_to_permanent_account(
		&self,
		registration: RegistrationData,
	) -> Result<Account, GuestSessionError> {
		let Some(profile) = self.get_temp_profile().await else {
			return Err(GuestSessionError::MigrationFailed(
				"no active temporary profile".into(),
			));
		};

		let request = merge_registration(&profile, registration);
		let account = self.auth.register(request).await.map_err(|e| {
			tracing::warn!(
				guest_id = %truncate_id(&profile.id),
				error = %e,
				"Guest migration rejected"
			);
			GuestSessionError::MigrationFailed(e.to_string())
		})?;

		if let Err(e) = self.remove_records().await {
			tracing::warn!(scope = %self.scope, error = %e, "Failed to remove migrated guest records");
		}

		tracing::info!(
			guest_id = %truncate_id(&profile.id),
			account_id = %truncate_id(&account.id),
			"Migrated guest to permanent account"
		);
		Ok(account)
	}

	async fn scope_lock(&self) -> Arc<Mutex<()>> {
		let mut locks = self.scope_locks.lock().await;
		// Drop locks nobody is holding or waiting on
		locks.retain(|_, lock| Arc::strong_count(lock) > 1);
		locks.entry(self.scope.clone()).or_default().clone()
	}

	/// Time left on the live profile, zero when there is none.
	pub async fn time_remaining(&self) -> Duration {
		match self.get_temp_profile().await {
			Some(profile) => Duration::from_secs(profile.remaining_at(self.clock.now())),
			None => Duration::ZERO,
		}
	}

	/// [`time_remaining`](Self::time_remaining) as `"1h 30m"`, `"45m"` or `"Expirado"`.
	pub async fn formatted_time_remaining(&self) -> String {
		format_remaining(self.time_remaining().await.as_secs())
	}

	/// Deletes the profile and session for this scope.
	pub async fn clear_temp_session(&self) -> Result<(), GuestSessionError> {
		self.remove_records()
			.await
			.map_err(|e| GuestSessionError::StorageUnavailable(e.to_string()))
	}

	async fn read<T: DeserializeOwned>(&self, namespace: StorageKey) -> Option<T> {
		match self.storage.retrieve_optional(namespace, &self.scope).await {
			Ok(value) => value,
			Err(e) => {
				tracing::warn!(
					scope = %self.scope,
					namespace = namespace.as_str(),
					error = %e,
					"Unreadable guest record, treating as absent"
				);
				None
			},
		}
	}

	async fn remove_records(&self) -> Result<(), StorageError> {
		self.storage
			.remove(StorageKey::GuestProfiles, &self.scope)
			.await?;
		self.storage
			.remove(StorageKey::GuestSessions, &self.scope)
			.await
	}
}

fn merge_registration(profile: &TempProfile, registration: RegistrationData) -> AccountRegistration {
	fn pick(explicit: Option<String>, fallback: &str) -> String {
		explicit
			.filter(|value| !value.trim().is_empty())
			.unwrap_or_else(|| fallback.to_string())
	}

	AccountRegistration {
		name: pick(registration.name, &profile.name),
		email: pick(registration.email, &profile.email),
		phone: pick(registration.phone, &profile.phone),
		address: pick(registration.address, &profile.address),
		password: registration.password,
	}
}
