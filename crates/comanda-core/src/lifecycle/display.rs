//! Presentation helpers shared by the tracking view and the admin dashboard.
//!
//! Both surfaces render an order through [`StatusView`] so that labels, colors
//! and the suggested next action never drift apart.

use comanda_types::{format_coarse_duration, Order, OrderStatus};
use serde::Serialize;

/// Display attributes for an [`OrderStatus`].
pub trait StatusPresentation {
	/// Human-readable Spanish label. Unrecognized statuses echo their raw value.
	fn label(&self) -> &str;
	/// Badge color as a hex string.
	fn color(&self) -> &'static str;
	/// Button text for advancing to the next status, if there is one.
	fn action_label(&self) -> Option<&'static str>;
}

impl StatusPresentation for OrderStatus {
	fn label(&self) -> &str {
		match self {
			OrderStatus::Pending => "Pendiente",
			OrderStatus::Preparing => "Preparando",
			OrderStatus::OnTheWay => "En camino",
			OrderStatus::Delivered => "Entregado",
			OrderStatus::Cancelled => "Cancelado",
			OrderStatus::Unrecognized(raw) => raw,
		}
	}

	fn color(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "#f59e0b",
			OrderStatus::Preparing => "#3b82f6",
			OrderStatus::OnTheWay => "#8b5cf6",
			OrderStatus::Delivered => "#10b981",
			OrderStatus::Cancelled => "#ef4444",
			OrderStatus::Unrecognized(_) => "#6b7280",
		}
	}

	fn action_label(&self) -> Option<&'static str> {
		match self {
			OrderStatus::Pending => Some("Empezar a preparar"),
			OrderStatus::Preparing => Some("Enviar"),
			OrderStatus::OnTheWay => Some("Confirmar entrega"),
			_ => None,
		}
	}
}

pub fn status_label(status: &OrderStatus) -> String {
	status.label().to_string()
}

pub fn status_color(status: &OrderStatus) -> &'static str {
	status.color()
}

pub fn next_action_label(status: &OrderStatus) -> Option<&'static str> {
	status.action_label()
}

/// Coarse age of `timestamp` relative to `now`: `"Xm"`, `"Xh"` or `"Xd"`.
///
/// Timestamps in the future render as `"0m"`.
pub fn elapsed_time(timestamp: u64, now: u64) -> String {
	format_coarse_duration(now.saturating_sub(timestamp))
}

/// Read-only projection of an order's status for display surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
	pub status: OrderStatus,
	pub label: String,
	pub color: &'static str,
	pub next_status: Option<OrderStatus>,
	pub next_action: Option<&'static str>,
	pub can_cancel: bool,
	pub is_terminal: bool,
	/// Time since the order was placed.
	pub elapsed: String,
}

impl StatusView {
	pub fn for_order(order: &Order, now: u64) -> Self {
		let status = &order.status;
		Self {
			status: status.clone(),
			label: status_label(status),
			color: status.color(),
			next_status: status.next(),
			next_action: status.action_label(),
			can_cancel: status.can_transition_to(&OrderStatus::Cancelled),
			is_terminal: status.is_terminal(),
			elapsed: elapsed_time(order.created_at, now),
		}
	}
}
