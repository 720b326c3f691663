//! Order lifecycle tracking.
//!
//! Moves orders along `pending -> preparing -> on_the_way -> delivered`, with
//! `cancelled` reachable from any non-terminal status, including statuses
//! this version does not recognize. The validation lives in
//! [`plan_transition`], which works on an in-memory [`Order`]; [`OrderLifecycle`]
//! wraps it with persistence.

use comanda_storage::{StorageError, StorageService};
use comanda_types::{truncate_id, Clock, Order, OrderStatus, StorageKey, TransitionExtra};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

pub mod display;

pub use comanda_types::{next_status, normalize_status};
pub use display::{
	elapsed_time, next_action_label, status_color, status_label, StatusPresentation, StatusView,
};

/// Errors that can occur while reading or advancing orders.
#[derive(Debug, Error)]
pub enum OrderLifecycleError {
	#[error("Cannot move order from {} to {}", .from.label(), .to.label())]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Cannot mark order as Entregado without the name of who received it")]
	MissingDeliveryConfirmation,
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Validates a status change and returns the order as it should be persisted.
///
/// `updated_at` is stamped with `now`. Moving to `delivered` requires a
/// non-blank `received_by`; `delivered_at` falls back to `now`. Extra fields
/// are ignored for every other target status.
pub fn plan_transition(
	order: &Order,
	new_status: &OrderStatus,
	extra: TransitionExtra,
	now: u64,
) -> Result<Order, OrderLifecycleError> {
	if !order.status.can_transition_to(new_status) {
		return Err(OrderLifecycleError::InvalidTransition {
			from: order.status.clone(),
			to: new_status.clone(),
		});
	}

	let mut updated = order.clone();
	if *new_status == OrderStatus::Delivered {
		let received_by = extra
			.received_by
			.as_deref()
			.map(str::trim)
			.filter(|name| !name.is_empty())
			.ok_or(OrderLifecycleError::MissingDeliveryConfirmation)?;
		updated.received_by = Some(received_by.to_string());
		updated.delivered_at = Some(extra.delivered_at.unwrap_or(now));
	}
	updated.status = new_status.clone();
	updated.updated_at = now;
	Ok(updated)
}

/// Manages order status transitions and persistence.
pub struct OrderLifecycle {
	storage: Arc<StorageService>,
	clock: Arc<dyn Clock>,
	/// Serializes read-modify-write of the per-customer order index.
	index_lock: Mutex<()>,
}

impl OrderLifecycle {
	pub fn new(storage: Arc<StorageService>, clock: Arc<dyn Clock>) -> Self {
		Self {
			storage,
			clock,
			index_lock: Mutex::new(()),
		}
	}

	/// Gets an order by ID
	pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderLifecycleError> {
		self.storage
			.retrieve(StorageKey::Orders, order_id)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => OrderLifecycleError::OrderNotFound(order_id.to_string()),
				other => OrderLifecycleError::Storage(other.to_string()),
			})
	}

	/// Stores an order and records it under its customer.
	pub async fn store_order(&self, order: &Order) -> Result<(), OrderLifecycleError> {
		self.storage
			.store(StorageKey::Orders, &order.id, order)
			.await
			.map_err(|e| OrderLifecycleError::Storage(e.to_string()))?;

		if let Some(customer) = &order.customer {
			let _guard = self.index_lock.lock().await;
			let mut order_ids: Vec<String> = self
				.storage
				.retrieve_optional(StorageKey::OrdersByCustomer, &customer.id)
				.await
				.map_err(|e| OrderLifecycleError::Storage(e.to_string()))?
				.unwrap_or_default();
			if !order_ids.contains(&order.id) {
				order_ids.push(order.id.clone());
				self.storage
					.store(StorageKey::OrdersByCustomer, &customer.id, &order_ids)
					.await
					.map_err(|e| OrderLifecycleError::Storage(e.to_string()))?;
			}
		}
		Ok(())
	}

	/// Returns a customer's orders, newest first.
	pub async fn orders_for_customer(
		&self,
		customer_id: &str,
	) -> Result<Vec<Order>, OrderLifecycleError> {
		let order_ids: Vec<String> = self
			.storage
			.retrieve_optional(StorageKey::OrdersByCustomer, customer_id)
			.await
			.map_err(|e| OrderLifecycleError::Storage(e.to_string()))?
			.unwrap_or_default();

		let mut orders = Vec::with_capacity(order_ids.len());
		for order_id in &order_ids {
			match self.get_order(order_id).await {
				Ok(order) => orders.push(order),
				Err(OrderLifecycleError::OrderNotFound(_)) => {
					tracing::debug!(
						order_id = %truncate_id(order_id),
						"Indexed order is gone, skipping"
					);
				},
				Err(e) => return Err(e),
			}
		}
		orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(orders)
	}

	/// Transitions an order to a new status with validation
	pub async fn transition(
		&self,
		order_id: &str,
		new_status: OrderStatus,
		extra: TransitionExtra,
	) -> Result<Order, OrderLifecycleError> {
		let order = self.get_order(order_id).await?;
		let updated = plan_transition(&order, &new_status, extra, self.clock.now())?;

		self.storage
			.update(StorageKey::Orders, order_id, &updated)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => OrderLifecycleError::OrderNotFound(order_id.to_string()),
				other => OrderLifecycleError::Storage(other.to_string()),
			})?;

		tracing::info!(
			order_id = %truncate_id(order_id),
			from = %order.status,
			to = %updated.status,
			"Order status changed"
		);
		Ok(updated)
	}

	/// Cancels an order that has not reached a terminal status.
	pub async fn cancel(&self, order_id: &str) -> Result<Order, OrderLifecycleError> {
		self.transition(order_id, OrderStatus::Cancelled, TransitionExtra::default())
			.await
	}

	/// Builds the display projection of `order` at the current time.
	pub fn view(&self, order: &Order) -> StatusView {
		StatusView::for_order(order, self.clock.now())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use comanda_storage::implementations::memory::MemoryStorage;
	use comanda_types::{CustomerRef, ManualClock};
	use std::time::Duration;

	fn order_in(status: OrderStatus) -> Order {
		let mut order = Order::new("o-1", None, serde_json::json!({"items": 2}), 100);
		order.status = status;
		order
	}

	fn lifecycle(clock: Arc<ManualClock>) -> OrderLifecycle {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::with_clock(
			clock.clone(),
		))));
		OrderLifecycle::new(storage, clock)
	}

	#[test]
	fn test_forward_steps_are_allowed() {
		let planned = plan_transition(
			&order_in(OrderStatus::Pending),
			&OrderStatus::Preparing,
			TransitionExtra::default(),
			200,
		)
		.unwrap();
		assert_eq!(planned.status, OrderStatus::Preparing);
		assert_eq!(planned.updated_at, 200);
		assert_eq!(planned.created_at, 100);
	}

	#[test]
	fn test_skipping_a_step_is_rejected() {
		let err = plan_transition(
			&order_in(OrderStatus::Pending),
			&OrderStatus::OnTheWay,
			TransitionExtra::default(),
			200,
		)
		.unwrap_err();
		assert!(matches!(
			err,
			OrderLifecycleError::InvalidTransition {
				from: OrderStatus::Pending,
				to: OrderStatus::OnTheWay
			}
		));
		assert_eq!(err.to_string(), "Cannot move order from Pendiente to En camino");
	}

	#[test]
	fn test_cancel_reachability() {
		for status in [
			OrderStatus::Pending,
			OrderStatus::Preparing,
			OrderStatus::OnTheWay,
		] {
			let planned = plan_transition(
				&order_in(status),
				&OrderStatus::Cancelled,
				TransitionExtra::default(),
				200,
			)
			.unwrap();
			assert_eq!(planned.status, OrderStatus::Cancelled);
		}

		for status in [OrderStatus::Delivered, OrderStatus::Cancelled] {
			let result = plan_transition(
				&order_in(status),
				&OrderStatus::Cancelled,
				TransitionExtra::default(),
				200,
			);
			assert!(matches!(
				result,
				Err(OrderLifecycleError::InvalidTransition { .. })
			));
		}
	}

	#[test]
	fn test_unrecognized_status_can_only_be_cancelled() {
		let order = order_in(normalize_status("on_hold"));
		for target in OrderStatus::canonical() {
			let result = plan_transition(&order, &target, TransitionExtra::default(), 200);
			if target == OrderStatus::Cancelled {
				assert_eq!(result.unwrap().status, OrderStatus::Cancelled);
			} else {
				assert!(matches!(
					result,
					Err(OrderLifecycleError::InvalidTransition { .. })
				));
			}
		}
	}

	#[test]
	fn test_delivery_requires_receiver() {
		let order = order_in(OrderStatus::OnTheWay);
		let err = plan_transition(
			&order,
			&OrderStatus::Delivered,
			TransitionExtra::default(),
			200,
		)
		.unwrap_err();
		assert!(matches!(
			err,
			OrderLifecycleError::MissingDeliveryConfirmation
		));

		let blank = plan_transition(
			&order,
			&OrderStatus::Delivered,
			TransitionExtra::received_by("   "),
			200,
		);
		assert!(matches!(
			blank,
			Err(OrderLifecycleError::MissingDeliveryConfirmation)
		));

		let delivered = plan_transition(
			&order,
			&OrderStatus::Delivered,
			TransitionExtra::received_by(" Luis "),
			200,
		)
		.unwrap();
		assert_eq!(delivered.received_by.as_deref(), Some("Luis"));
		assert_eq!(delivered.delivered_at, Some(200));
	}

	#[test]
	fn test_explicit_delivered_at_is_kept() {
		let extra = TransitionExtra {
			received_by: Some("Luis".into()),
			delivered_at: Some(150),
		};
		let delivered = plan_transition(
			&order_in(OrderStatus::OnTheWay),
			&OrderStatus::Delivered,
			extra,
			200,
		)
		.unwrap();
		assert_eq!(delivered.delivered_at, Some(150));
		assert_eq!(delivered.updated_at, 200);
	}

	#[tokio::test]
	async fn test_transition_persists_and_stamps_time() {
		let clock = Arc::new(ManualClock::new(1_000));
		let lifecycle = lifecycle(clock.clone());
		let order = Order::new("o-42", None, serde_json::Value::Null, clock.now());
		lifecycle.store_order(&order).await.unwrap();

		clock.advance(Duration::from_secs(90));
		let updated = lifecycle
			.transition("o-42", OrderStatus::Preparing, TransitionExtra::default())
			.await
			.unwrap();
		assert_eq!(updated.updated_at, 1_090);

		let stored = lifecycle.get_order("o-42").await.unwrap();
		assert_eq!(stored, updated);
	}

	#[tokio::test]
	async fn test_full_walk_to_delivered() {
		let clock = Arc::new(ManualClock::new(0));
		let lifecycle = lifecycle(clock.clone());
		lifecycle
			.store_order(&Order::new("o-7", None, serde_json::Value::Null, 0))
			.await
			.unwrap();

		let mut status = OrderStatus::Pending;
		while let Some(next) = next_status(&status) {
			clock.advance(Duration::from_secs(60));
			let extra = if next == OrderStatus::Delivered {
				TransitionExtra::received_by("Marta")
			} else {
				TransitionExtra::default()
			};
			status = lifecycle.transition("o-7", next, extra).await.unwrap().status;
		}

		let order = lifecycle.get_order("o-7").await.unwrap();
		assert_eq!(order.status, OrderStatus::Delivered);
		assert_eq!(order.delivered_at, Some(180));
		assert!(matches!(
			lifecycle.cancel("o-7").await,
			Err(OrderLifecycleError::InvalidTransition { .. })
		));
	}

	#[tokio::test]
	async fn test_missing_order_is_not_found() {
		let lifecycle = lifecycle(Arc::new(ManualClock::new(0)));
		assert!(matches!(
			lifecycle.cancel("ghost").await,
			Err(OrderLifecycleError::OrderNotFound(id)) if id == "ghost"
		));
	}

	#[tokio::test]
	async fn test_legacy_status_is_normalized_on_read() {
		let clock = Arc::new(ManualClock::new(0));
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::with_clock(
			clock.clone(),
		))));
		let raw = serde_json::json!({
			"id": "legacy",
			"status": "En Camino",
			"created_at": 0,
			"updated_at": 0,
		});
		storage.store(StorageKey::Orders, "legacy", &raw).await.unwrap();

		let lifecycle = OrderLifecycle::new(storage, clock);
		let order = lifecycle.get_order("legacy").await.unwrap();
		assert_eq!(order.status, OrderStatus::OnTheWay);
		let delivered = lifecycle
			.transition(
				"legacy",
				OrderStatus::Delivered,
				TransitionExtra::received_by("Pepe"),
			)
			.await
			.unwrap();
		assert_eq!(delivered.status.as_str(), "delivered");
	}

	#[tokio::test]
	async fn test_orders_for_customer_newest_first() {
		let clock = Arc::new(ManualClock::new(10));
		let lifecycle = lifecycle(clock.clone());
		let customer = CustomerRef {
			id: "acc-1".into(),
			temporary: false,
		};

		for (id, at) in [("a", 10), ("b", 30), ("c", 20)] {
			let order = Order::new(id, Some(customer.clone()), serde_json::Value::Null, at);
			lifecycle.store_order(&order).await.unwrap();
		}
		// Storing again does not duplicate the index entry
		let again = lifecycle.get_order("a").await.unwrap();
		lifecycle.store_order(&again).await.unwrap();

		let orders = lifecycle.orders_for_customer("acc-1").await.unwrap();
		let ids: Vec<_> = orders.iter().map(|o| o.id.as_str()).collect();
		assert_eq!(ids, vec!["b", "c", "a"]);
		assert!(lifecycle
			.orders_for_customer("nobody")
			.await
			.unwrap()
			.is_empty());
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_orders_are_all_indexed() {
		let lifecycle = Arc::new(lifecycle(Arc::new(ManualClock::new(0))));
		let customer = CustomerRef {
			id: "acc".into(),
			temporary: false,
		};

		let handles: Vec<_> = (0..50)
			.map(|i| {
				let lifecycle = Arc::clone(&lifecycle);
				let order = Order::new(
					format!("o-{}", i),
					Some(customer.clone()),
					serde_json::Value::Null,
					i,
				);
				tokio::spawn(async move { lifecycle.store_order(&order).await })
			})
			.collect();
		for handle in handles {
			handle.await.unwrap().unwrap();
		}

		let orders = lifecycle.orders_for_customer("acc").await.unwrap();
		assert_eq!(orders.len(), 50);
		assert_eq!(orders[0].id, "o-49");
	}

	#[tokio::test]
	async fn test_unrecognized_order_can_be_cancelled() {
		let clock = Arc::new(ManualClock::new(0));
		let lifecycle = lifecycle(clock.clone());
		let mut order = Order::new("odd", None, serde_json::Value::Null, 0);
		order.status = normalize_status("on_hold");
		lifecycle.store_order(&order).await.unwrap();

		assert!(lifecycle.view(&order).can_cancel);
		let cancelled = lifecycle.cancel("odd").await.unwrap();
		assert_eq!(cancelled.status, OrderStatus::Cancelled);
	}
}
