//! Order placement, tracking and status endpoints.

use super::ApiError;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
};
use comanda_core::{normalize_status, CheckoutIdentity, StatusView};
use comanda_types::{GuestPrefill, Order, TransitionExtra};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/orders`. Exactly one of `account_id` and `guest_scope`.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
	pub account_id: Option<String>,
	pub guest_scope: Option<String>,
	#[serde(default)]
	pub prefill: GuestPrefill,
	#[serde(default)]
	pub data: serde_json::Value,
}

/// Body of `POST /api/orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
	/// Canonical status or any known alias.
	pub status: String,
	pub received_by: Option<String>,
	pub delivered_at: Option<u64>,
}

/// An order together with its display projection.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
	pub order: Order,
	pub view: StatusView,
}

impl OrderResponse {
	fn new(state: &AppState, order: Order) -> Self {
		let view = state.engine.lifecycle().view(&order);
		Self { order, view }
	}
}

/// Handles POST /api/orders requests.
pub async fn place_order(
	State(state): State<AppState>,
	Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
	let identity = match (request.account_id, request.guest_scope) {
		(Some(account_id), None) => {
			let account = state
				.engine
				.auth()
				.find_account(&account_id)
				.await?
				.ok_or_else(|| {
					ApiError::not_found(
						"ACCOUNT_NOT_FOUND",
						format!("Account not found: {}", account_id),
					)
				})?;
			CheckoutIdentity::Account(account)
		},
		(None, Some(scope)) => CheckoutIdentity::Guest {
			scope,
			prefill: request.prefill,
		},
		_ => {
			return Err(ApiError::bad_request(
				"Provide exactly one of account_id or guest_scope",
			))
		},
	};

	let order = state
		.engine
		.checkout()
		.place_order(identity, request.data)
		.await?;
	Ok((StatusCode::CREATED, Json(OrderResponse::new(&state, order))))
}

/// Handles GET /api/orders/{id} requests.
pub async fn get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<OrderResponse>, ApiError> {
	let order = state.engine.lifecycle().get_order(&id).await?;
	Ok(Json(OrderResponse::new(&state, order)))
}

/// Handles POST /api/orders/{id}/status requests.
pub async fn update_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
	let new_status = normalize_status(&request.status);
	let extra = TransitionExtra {
		received_by: request.received_by,
		delivered_at: request.delivered_at,
	};

	let order = state
		.engine
		.lifecycle()
		.transition(&id, new_status, extra)
		.await
		.inspect_err(|e| tracing::warn!(order_id = %id, "Status update rejected: {}", e))?;
	Ok(Json(OrderResponse::new(&state, order)))
}

/// Handles GET /api/customers/{id}/orders requests.
pub async fn customer_orders(
	Path(customer_id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
	let orders = state
		.engine
		.lifecycle()
		.orders_for_customer(&customer_id)
		.await?;
	Ok(Json(
		orders
			.into_iter()
			.map(|order| OrderResponse::new(&state, order))
			.collect(),
	))
}

#[cfg(test)]
mod tests {
	use crate::server::test_support::{request, test_app};
	use axum::http::{Method, StatusCode};
	use serde_json::json;

	#[tokio::test]
	async fn test_guest_order_walks_to_delivered() {
		let app = test_app();

		let (status, body) = request(
			&app,
			Method::POST,
			"/api/orders",
			Some(json!({
				"guest_scope": "device-1",
				"prefill": {"name": "Ana"},
				"data": {"items": ["paella"]}
			})),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["order"]["status"], "pending");
		assert_eq!(body["view"]["label"], "Pendiente");
		assert_eq!(body["view"]["next_action"], "Empezar a preparar");
		let id = body["order"]["id"].as_str().unwrap().to_string();
		let customer_id = body["order"]["customer"]["id"].as_str().unwrap().to_string();

		// Skipping straight to on_the_way is rejected
		let (status, body) = request(
			&app,
			Method::POST,
			&format!("/api/orders/{}/status", id),
			Some(json!({ "status": "en camino" })),
		)
		.await;
		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"], "INVALID_TRANSITION");

		let (status, body) = request(
			&app,
			Method::POST,
			&format!("/api/orders/{}/status", id),
			Some(json!({ "status": "Preparando" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["order"]["status"], "preparing");

		let (status, _) = request(
			&app,
			Method::POST,
			&format!("/api/orders/{}/status", id),
			Some(json!({ "status": "dispatched" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);

		let (status, body) = request(
			&app,
			Method::POST,
			&format!("/api/orders/{}/status", id),
			Some(json!({ "status": "delivered" })),
		)
		.await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"], "MISSING_DELIVERY_CONFIRMATION");

		let (status, body) = request(
			&app,
			Method::POST,
			&format!("/api/orders/{}/status", id),
			Some(json!({ "status": "entregado", "received_by": "Luis" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["order"]["received_by"], "Luis");
		assert_eq!(body["view"]["is_terminal"], true);

		let (status, body) = request(
			&app,
			Method::GET,
			&format!("/api/customers/{}/orders", customer_id),
			None,
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body.as_array().map(Vec::len), Some(1));
	}

	#[tokio::test]
	async fn test_missing_order_is_404() {
		let app = test_app();
		let (status, body) = request(&app, Method::GET, "/api/orders/nope", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "ORDER_NOT_FOUND");
	}

	#[tokio::test]
	async fn test_checkout_requires_one_identity() {
		let app = test_app();
		let (status, _) = request(
			&app,
			Method::POST,
			"/api/orders",
			Some(json!({ "data": {} })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (status, body) = request(
			&app,
			Method::POST,
			"/api/orders",
			Some(json!({ "account_id": "ghost" })),
		)
		.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "ACCOUNT_NOT_FOUND");
	}
}
