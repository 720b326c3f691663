//! Storage namespaces used throughout Comanda.

use std::str::FromStr;

/// Storage keys for different data collections.
///
/// Every value is stored under `"<namespace>:<id>"`; this enum names the
/// namespaces so no call site spells them by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Order records keyed by order id.
	Orders,
	/// Order id lists keyed by customer id.
	OrdersByCustomer,
	/// Temporary guest profiles keyed by device scope.
	GuestProfiles,
	/// Guest sessions keyed by device scope.
	GuestSessions,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::OrdersByCustomer => "orders_by_customer",
			StorageKey::GuestProfiles => "guest_profiles",
			StorageKey::GuestSessions => "guest_sessions",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::OrdersByCustomer,
			Self::GuestProfiles,
			Self::GuestSessions,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_namespace_names_parse_back() {
		for key in StorageKey::all() {
			assert_eq!(key.as_str().parse::<StorageKey>(), Ok(key));
		}
		assert!("sessions".parse::<StorageKey>().is_err());
	}
}
