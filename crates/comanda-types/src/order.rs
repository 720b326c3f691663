//! Order types and the canonical status vocabulary.
//!
//! Every status string that enters the system, whether it comes from storage,
//! an HTTP request or a legacy record, goes through [`normalize_status`] so that
//! historical and localized synonyms collapse onto the five canonical values.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Status of an order in its delivery lifecycle.
///
/// The five named variants are the canonical statuses. Values that are not in
/// the alias map are carried verbatim in [`OrderStatus::Unrecognized`] so that
/// reading and re-saving an order never rewrites data we do not understand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
	/// Order received, kitchen has not started.
	Pending,
	/// Kitchen is preparing the order.
	Preparing,
	/// Order left the restaurant.
	OnTheWay,
	/// Customer received the order. Terminal.
	Delivered,
	/// Order was cancelled. Terminal.
	Cancelled,
	/// A status outside the alias map, kept as it was read.
	Unrecognized(String),
}

impl OrderStatus {
	/// Returns the wire representation of the status.
	pub fn as_str(&self) -> &str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Preparing => "preparing",
			OrderStatus::OnTheWay => "on_the_way",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
			OrderStatus::Unrecognized(raw) => raw,
		}
	}

	/// Returns an iterator over the canonical statuses in lifecycle order.
	pub fn canonical() -> impl Iterator<Item = Self> {
		[
			Self::Pending,
			Self::Preparing,
			Self::OnTheWay,
			Self::Delivered,
			Self::Cancelled,
		]
		.into_iter()
	}

	/// True for `delivered` and `cancelled`.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
	}

	pub fn is_recognized(&self) -> bool {
		!matches!(self, OrderStatus::Unrecognized(_))
	}

	/// Successor on the forward chain `pending -> preparing -> on_the_way -> delivered`.
	///
	/// Terminal and unrecognized statuses have no successor.
	pub fn next(&self) -> Option<OrderStatus> {
		match self {
			OrderStatus::Pending => Some(OrderStatus::Preparing),
			OrderStatus::Preparing => Some(OrderStatus::OnTheWay),
			OrderStatus::OnTheWay => Some(OrderStatus::Delivered),
			OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Unrecognized(_) => None,
		}
	}

	/// Checks whether `to` is reachable from `self` in a single step.
	///
	/// A step is either the forward successor or the cancel escape, which is
	/// available from any non-terminal status. Unrecognized statuses have no
	/// successor, so cancelling is the only way out of them.
	pub fn can_transition_to(&self, to: &OrderStatus) -> bool {
		if self.next().as_ref() == Some(to) {
			return true;
		}
		*to == OrderStatus::Cancelled && !self.is_terminal()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl From<String> for OrderStatus {
	fn from(raw: String) -> Self {
		match lookup_alias(&raw) {
			Some(status) => status,
			None => OrderStatus::Unrecognized(raw),
		}
	}
}

impl From<&str> for OrderStatus {
	fn from(raw: &str) -> Self {
		normalize_status(raw)
	}
}

impl From<OrderStatus> for String {
	fn from(status: OrderStatus) -> Self {
		match status {
			OrderStatus::Unrecognized(raw) => raw,
			other => other.as_str().to_string(),
		}
	}
}

/// Alias table keyed by the folded spelling. Canonical names map to themselves.
static STATUS_ALIASES: Lazy<HashMap<&'static str, OrderStatus>> = Lazy::new(|| {
	let groups: [(OrderStatus, &[&'static str]); 5] = [
		(
			OrderStatus::Pending,
			&["pending", "pendiente", "nuevo", "new", "received", "recibido"],
		),
		(
			OrderStatus::Preparing,
			&[
				"preparing",
				"preparando",
				"en_preparacion",
				"in_progress",
				"cooking",
				"confirmed",
				"confirmado",
			],
		),
		(
			OrderStatus::OnTheWay,
			&[
				"on_the_way",
				"en_camino",
				"ready",
				"listo",
				"dispatched",
				"shipped",
				"out_for_delivery",
				"enviado",
			],
		),
		(
			OrderStatus::Delivered,
			&["delivered", "entregado", "completed", "completado", "done"],
		),
		(
			OrderStatus::Cancelled,
			&[
				"cancelled",
				"cancelado",
				"canceled",
				"cancelada",
				"rejected",
				"rechazado",
			],
		),
	];

	let mut m = HashMap::new();
	for (status, aliases) in groups {
		for alias in aliases {
			m.insert(*alias, status.clone());
		}
	}
	m
});

/// Folds case, surrounding whitespace, dashes and inner spaces.
fn fold_status(raw: &str) -> String {
	raw.trim().to_lowercase().replace(['-', ' '], "_")
}

fn lookup_alias(raw: &str) -> Option<OrderStatus> {
	STATUS_ALIASES.get(fold_status(raw).as_str()).cloned()
}

/// Maps a raw status string onto its canonical status.
///
/// Never fails: strings missing from the alias map come back unchanged as
/// [`OrderStatus::Unrecognized`]. Normalizing an already canonical value is a
/// no-op.
pub fn normalize_status(raw: &str) -> OrderStatus {
	lookup_alias(raw).unwrap_or_else(|| OrderStatus::Unrecognized(raw.to_string()))
}

/// Returns the forward successor of `current`, if it has one.
pub fn next_status(current: &OrderStatus) -> Option<OrderStatus> {
	current.next()
}

/// Identity attached to an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
	/// Account id or temporary guest profile id.
	pub id: String,
	/// True when `id` refers to a temporary guest profile.
	#[serde(default)]
	pub temporary: bool,
}

/// A restaurant order as persisted in the `orders` namespace.
///
/// The lifecycle core only reads and writes `status`, the timestamps and the
/// delivery confirmation fields. `data` belongs to the outer application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// Current status of the order.
	pub status: OrderStatus,
	/// Timestamp when this order was created.
	pub created_at: u64,
	/// Timestamp of the last status change.
	pub updated_at: u64,
	/// Who placed the order.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub customer: Option<CustomerRef>,
	/// Name of the person who received the order.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub received_by: Option<String>,
	/// Timestamp when delivery was confirmed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub delivered_at: Option<u64>,
	/// Order contents in JSON format.
	#[serde(default)]
	pub data: serde_json::Value,
}

impl Order {
	/// Creates a new order in the initial `pending` status.
	pub fn new(
		id: impl Into<String>,
		customer: Option<CustomerRef>,
		data: serde_json::Value,
		now: u64,
	) -> Self {
		Self {
			id: id.into(),
			status: OrderStatus::Pending,
			created_at: now,
			updated_at: now,
			customer,
			received_by: None,
			delivered_at: None,
			data,
		}
	}
}

/// Extra fields merged into an order during a status transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionExtra {
	/// Required when moving to `delivered`.
	#[serde(default)]
	pub received_by: Option<String>,
	/// Defaults to the transition time when omitted.
	#[serde(default)]
	pub delivered_at: Option<u64>,
}

impl TransitionExtra {
	pub fn received_by(name: impl Into<String>) -> Self {
		Self {
			received_by: Some(name.into()),
			delivered_at: None,
		}
	}
}
