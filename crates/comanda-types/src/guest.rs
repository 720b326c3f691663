//! Temporary guest identity types.
//!
//! A guest who checks out without registering gets a [`TempProfile`] paired with
//! a [`GuestSession`]. Both carry the same expiry window and are only valid
//! together.

use serde::{Deserialize, Serialize};

/// Contact details captured from an in-progress checkout form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestPrefill {
	pub name: Option<String>,
	pub phone: Option<String>,
	pub email: Option<String>,
	pub address: Option<String>,
	pub notes: Option<String>,
}

impl GuestPrefill {
	pub fn with_name(name: impl Into<String>) -> Self {
		Self {
			name: Some(name.into()),
			..Self::default()
		}
	}
}

/// Time-boxed stand-in identity for checkout without registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempProfile {
	/// Prefixed synthetic identifier, unique per session.
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub phone: String,
	#[serde(default)]
	pub email: String,
	#[serde(default)]
	pub address: String,
	#[serde(default)]
	pub notes: String,
	/// Timestamp when the profile was minted.
	pub created_at: u64,
	/// The profile is valid strictly before this timestamp.
	pub expires_at: u64,
	/// Always true; lets consumers tell a guest apart from an account.
	#[serde(default = "always_temporary")]
	pub is_temporary: bool,
}

fn always_temporary() -> bool {
	true
}

impl TempProfile {
	/// Builds a profile from checkout prefill data.
	pub fn from_prefill(id: String, prefill: GuestPrefill, created_at: u64, ttl_secs: u64) -> Self {
		Self {
			id,
			name: prefill.name.unwrap_or_default(),
			phone: prefill.phone.unwrap_or_default(),
			email: prefill.email.unwrap_or_default(),
			address: prefill.address.unwrap_or_default(),
			notes: prefill.notes.unwrap_or_default(),
			created_at,
			expires_at: created_at.saturating_add(ttl_secs),
			is_temporary: true,
		}
	}

	pub fn is_expired_at(&self, now: u64) -> bool {
		now >= self.expires_at
	}

	/// Seconds left before expiry, floored at zero.
	pub fn remaining_at(&self, now: u64) -> u64 {
		self.expires_at.saturating_sub(now)
	}
}

/// Liveness and usage record paired with a [`TempProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestSession {
	/// Id of the paired temporary profile.
	pub user_id: String,
	pub created_at: u64,
	pub expires_at: u64,
	/// Last time the guest came back to the tracking view.
	pub last_access: u64,
	#[serde(default)]
	pub is_active: bool,
}

impl GuestSession {
	/// Opens a session mirroring the profile's window.
	pub fn for_profile(profile: &TempProfile) -> Self {
		Self {
			user_id: profile.id.clone(),
			created_at: profile.created_at,
			expires_at: profile.expires_at,
			last_access: profile.created_at,
			is_active: true,
		}
	}

	pub fn is_live_at(&self, now: u64) -> bool {
		self.is_active && now < self.expires_at
	}
}

/// A profile and session pair that passed reactivation checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumedGuest {
	pub profile: TempProfile,
	pub session: GuestSession,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_profile_window() {
		let profile = TempProfile::from_prefill(
			"temp_1".into(),
			GuestPrefill::with_name("Ana"),
			1_000,
			7_200,
		);
		assert_eq!(profile.name, "Ana");
		assert_eq!(profile.expires_at - profile.created_at, 7_200);
		assert!(!profile.is_expired_at(8_199));
		assert!(profile.is_expired_at(8_200));
		assert_eq!(profile.remaining_at(9_000), 0);
	}

	#[test]
	fn test_session_mirrors_profile() {
		let profile = TempProfile::from_prefill("temp_2".into(), GuestPrefill::default(), 50, 100);
		let session = GuestSession::for_profile(&profile);
		assert_eq!(session.user_id, profile.id);
		assert_eq!(session.expires_at, 150);
		assert!(session.is_live_at(149));
		assert!(!session.is_live_at(150));
	}

	#[test]
	fn test_profile_missing_flag_defaults_to_temporary() {
		let json = r#"{"id":"temp_3","created_at":1,"expires_at":2}"#;
		let profile: TempProfile = serde_json::from_str(json).unwrap();
		assert!(profile.is_temporary);
		assert!(profile.name.is_empty());
	}
}
