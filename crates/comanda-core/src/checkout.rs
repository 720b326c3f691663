//! Order placement.
//!
//! Attaches the buyer's identity to a new order. Registered customers are
//! referenced by account id; guests get the live temporary profile of their
//! device scope, minted on demand.

use crate::guest::{GuestDirectory, GuestSessionError};
use crate::lifecycle::{OrderLifecycle, OrderLifecycleError};
use comanda_types::{truncate_id, Account, Clock, CustomerRef, GuestPrefill, Order};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckoutError {
	#[error(transparent)]
	Guest(#[from] GuestSessionError),
	#[error(transparent)]
	Order(#[from] OrderLifecycleError),
}

/// Who is placing the order.
#[derive(Debug, Clone)]
pub enum CheckoutIdentity {
	Account(Account),
	Guest { scope: String, prefill: GuestPrefill },
}

pub struct CheckoutService {
	lifecycle: Arc<OrderLifecycle>,
	guests: Arc<GuestDirectory>,
	clock: Arc<dyn Clock>,
}

impl CheckoutService {
	pub fn new(
		lifecycle: Arc<OrderLifecycle>,
		guests: Arc<GuestDirectory>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			lifecycle,
			guests,
			clock,
		}
	}

	/// Creates a `pending` order for `identity` and stores it.
	pub async fn place_order(
		&self,
		identity: CheckoutIdentity,
		data: serde_json::Value,
	) -> Result<Order, CheckoutError> {
		let customer = match identity {
			CheckoutIdentity::Account(account) => CustomerRef {
				id: account.id,
				temporary: false,
			},
			CheckoutIdentity::Guest { scope, prefill } => {
				// Serialized per scope, so parallel checkouts share one profile
				let guest = self.guests.for_scope(scope);
				let profile = guest.get_or_create_temp_profile(prefill).await?;
				guest.update_session_access().await?;
				CustomerRef {
					id: profile.id,
					temporary: true,
				}
			},
		};

		let order_id = uuid::Uuid::new_v4().to_string();
		let order = Order::new(order_id, Some(customer), data, self.clock.now());
		self.lifecycle.store_order(&order).await?;

		tracing::info!(
			order_id = %truncate_id(&order.id),
			guest = order.customer.as_ref().is_some_and(|c| c.temporary),
			"Order placed"
		);
		Ok(order)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::guest::GuestSettings;
	use comanda_account::implementations::local::LocalAuth;
	use comanda_account::AuthService;
	use comanda_storage::implementations::memory::MemoryStorage;
	use comanda_storage::StorageService;
	use comanda_types::{ManualClock, OrderStatus};
	use std::time::Duration;

	fn checkout() -> (CheckoutService, Arc<OrderLifecycle>, Arc<GuestDirectory>, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::new(5_000));
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::with_clock(
			clock.clone(),
		))));
		let lifecycle = Arc::new(OrderLifecycle::new(storage.clone(), clock.clone()));
		let guests = Arc::new(GuestDirectory::new(
			storage,
			Arc::new(AuthService::new(Box::new(LocalAuth::default()))),
			clock.clone(),
			GuestSettings::default(),
		));
		let service = CheckoutService::new(lifecycle.clone(), guests.clone(), clock.clone());
		(service, lifecycle, guests, clock)
	}

	#[tokio::test]
	async fn test_account_checkout() {
		let (checkout, lifecycle, _, _) = checkout();
		let account = Account {
			id: "acc-9".into(),
			name: "Ana".into(),
			email: "ana@example.com".into(),
			phone: String::new(),
			address: String::new(),
			created_at: 0,
		};

		let order = checkout
			.place_order(
				CheckoutIdentity::Account(account),
				serde_json::json!({"items": ["tortilla"]}),
			)
			.await
			.unwrap();
		assert_eq!(order.status, OrderStatus::Pending);
		assert_eq!(order.created_at, 5_000);

		let orders = lifecycle.orders_for_customer("acc-9").await.unwrap();
		assert_eq!(orders, vec![order]);
	}

	#[tokio::test]
	async fn test_guest_checkout_reuses_profile_and_touches_session() {
		let (checkout, lifecycle, guests, clock) = checkout();
		let identity = CheckoutIdentity::Guest {
			scope: "device-1".into(),
			prefill: GuestPrefill::with_name("Ana"),
		};

		let first = checkout
			.place_order(identity.clone(), serde_json::Value::Null)
			.await
			.unwrap();
		clock.advance(Duration::from_secs(300));
		let second = checkout
			.place_order(identity, serde_json::Value::Null)
			.await
			.unwrap();

		let first_customer = first.customer.unwrap();
		assert!(first_customer.temporary);
		assert!(first_customer.id.starts_with("temp_"));
		assert_eq!(second.customer.unwrap().id, first_customer.id);

		let orders = lifecycle
			.orders_for_customer(&first_customer.id)
			.await
			.unwrap();
		assert_eq!(orders.len(), 2);

		let resumed = guests
			.for_scope("device-1")
			.reactivate_temp_session()
			.await
			.unwrap();
		assert_eq!(resumed.session.last_access, 5_300);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_parallel_guest_checkouts_share_profile() {
		let (checkout, lifecycle, guests, _) = checkout();
		let checkout = Arc::new(checkout);

		let handles: Vec<_> = (0..2)
			.map(|_| {
				let checkout = Arc::clone(&checkout);
				tokio::spawn(async move {
					checkout
						.place_order(
							CheckoutIdentity::Guest {
								scope: "new-device".into(),
								prefill: GuestPrefill::default(),
							},
							serde_json::Value::Null,
						)
						.await
				})
			})
			.collect();

		let mut customer_ids = Vec::new();
		for handle in handles {
			customer_ids.push(handle.await.unwrap().unwrap().customer.unwrap().id);
		}
		assert_eq!(customer_ids[0], customer_ids[1]);

		let profile = guests
			.for_scope("new-device")
			.get_temp_profile()
			.await
			.unwrap();
		assert_eq!(profile.id, customer_ids[0]);
		let orders = lifecycle.orders_for_customer(&profile.id).await.unwrap();
		assert_eq!(orders.len(), 2);
	}
}
