//! Local in-process account registry.
//!
//! Keeps accounts in memory, indexed by id and by lowercase email. Passwords
//! are stored as salted SHA3-256 digests and never leave this module.

use crate::{AuthError, AuthFactory, AuthInterface, AuthRegistry};
use async_trait::async_trait;
use comanda_types::{
	Account, AccountRegistration, Clock, ConfigSchema, Field, FieldType, ImplementationRegistry,
	Schema, SystemClock, ValidationError,
};
use sha3::{Digest, Sha3_256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

struct StoredAccount {
	account: Account,
	salt: String,
	password_hash: String,
}

#[derive(Default)]
struct Accounts {
	by_id: HashMap<String, StoredAccount>,
	/// lowercase email -> account id
	by_email: HashMap<String, String>,
}

/// In-memory authentication implementation.
pub struct LocalAuth {
	accounts: RwLock<Accounts>,
	min_password_length: usize,
	clock: Arc<dyn Clock>,
}

impl LocalAuth {
	pub fn new(min_password_length: usize) -> Self {
		Self::with_clock(min_password_length, Arc::new(SystemClock))
	}

	pub fn with_clock(min_password_length: usize, clock: Arc<dyn Clock>) -> Self {
		Self {
			accounts: RwLock::new(Accounts::default()),
			min_password_length,
			clock,
		}
	}

	fn validate(&self, registration: &AccountRegistration) -> Result<(), AuthError> {
		if registration.name.trim().is_empty() {
			return Err(AuthError::InvalidRegistration("name is required".into()));
		}
		let email = registration.email.trim();
		if email.is_empty() || !email.contains('@') {
			return Err(AuthError::InvalidRegistration(format!(
				"'{}' is not a valid email address",
				email
			)));
		}
		if registration.password.len() < self.min_password_length {
			return Err(AuthError::InvalidRegistration(format!(
				"password must be at least {} characters",
				self.min_password_length
			)));
		}
		Ok(())
	}

	/// Checks a password against the stored digest.
	pub async fn verify_password(&self, email: &str, password: &str) -> bool {
		let accounts = self.accounts.read().await;
		accounts
			.by_email
			.get(&email.trim().to_lowercase())
			.and_then(|id| accounts.by_id.get(id))
			.is_some_and(|stored| hash_password(&stored.salt, password) == stored.password_hash)
	}
}

impl Default for LocalAuth {
	fn default() -> Self {
		Self::new(DEFAULT_MIN_PASSWORD_LENGTH)
	}
}

fn hash_password(salt: &str, password: &str) -> String {
	let mut hasher = Sha3_256::new();
	hasher.update(salt.as_bytes());
	hasher.update(password.as_bytes());
	hex::encode(hasher.finalize())
}

#[async_trait]
impl AuthInterface for LocalAuth {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalAuthSchema)
	}

	async fn register(&self, registration: AccountRegistration) -> Result<Account, AuthError> {
		self.validate(&registration)?;

		let email_key = registration.email.trim().to_lowercase();
		let mut accounts = self.accounts.write().await;
		if accounts.by_email.contains_key(&email_key) {
			return Err(AuthError::DuplicateEmail(registration.email.trim().to_string()));
		}

		let account = Account {
			id: uuid::Uuid::new_v4().to_string(),
			name: registration.name.trim().to_string(),
			email: registration.email.trim().to_string(),
			phone: registration.phone,
			address: registration.address,
			created_at: self.clock.now(),
		};
		let salt = uuid::Uuid::new_v4().simple().to_string();
		let password_hash = registration
			.password
			.with_exposed(|password| hash_password(&salt, password));

		accounts.by_email.insert(email_key, account.id.clone());
		accounts.by_id.insert(
			account.id.clone(),
			StoredAccount {
				account: account.clone(),
				salt,
				password_hash,
			},
		);

		tracing::info!(account_id = %account.id, "Registered account");
		Ok(account)
	}

	async fn find_account(&self, id: &str) -> Result<Option<Account>, AuthError> {
		let accounts = self.accounts.read().await;
		Ok(accounts.by_id.get(id).map(|stored| stored.account.clone()))
	}
}

/// Configuration schema for LocalAuth.
pub struct LocalAuthSchema;

impl ConfigSchema for LocalAuthSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"min_password_length",
				FieldType::Integer {
					min: Some(1),
					max: Some(128),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create the local authentication backend.
///
/// Configuration parameters:
/// - `min_password_length`: minimum accepted password length (default: 6)
pub fn create_auth(config: &toml::Value) -> Result<Box<dyn AuthInterface>, AuthError> {
	LocalAuthSchema
		.validate(config)
		.map_err(|e| AuthError::Implementation(format!("Invalid configuration: {}", e)))?;

	let min_password_length = config
		.get("min_password_length")
		.and_then(|v| v.as_integer())
		.and_then(|v| usize::try_from(v).ok())
		.unwrap_or(DEFAULT_MIN_PASSWORD_LENGTH);

	Ok(Box::new(LocalAuth::new(min_password_length)))
}

/// Registry for the local authentication implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AuthFactory;

	fn factory() -> Self::Factory {
		create_auth
	}
}

impl AuthRegistry for Registry {}
