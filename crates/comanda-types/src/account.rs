//! Account types exchanged with the authentication collaborator.

use serde::{Deserialize, Serialize};

use crate::SecretString;

/// A permanent, registered customer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
	pub id: String,
	pub name: String,
	pub email: String,
	#[serde(default)]
	pub phone: String,
	#[serde(default)]
	pub address: String,
	pub created_at: u64,
}

/// Registration fields as submitted by the customer.
///
/// Any field left empty falls back to the matching field of the temporary
/// guest profile when migrating.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationData {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub phone: Option<String>,
	#[serde(default)]
	pub address: Option<String>,
	pub password: SecretString,
}

/// Fully resolved request handed to the authentication collaborator.
#[derive(Debug, Clone)]
pub struct AccountRegistration {
	pub name: String,
	pub email: String,
	pub phone: String,
	pub address: String,
	pub password: SecretString,
}
