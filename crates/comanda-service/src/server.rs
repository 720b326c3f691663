//! HTTP server for the Comanda API.
//!
//! Serves the order tracking, admin and guest endpoints under `/api`.

use crate::apis::{guests, orders};
use axum::{
	http::HeaderValue,
	routing::{get, post},
	Router,
};
use comanda_config::{ApiConfig, CorsConfig};
use comanda_core::ComandaEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Engine that owns the lifecycle, guest and checkout services.
	pub engine: Arc<ComandaEngine>,
}

/// Builds the API router without middleware.
pub fn router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(orders::place_order))
				.route("/orders/{id}", get(orders::get_order))
				.route("/orders/{id}/status", post(orders::update_status))
				.route("/customers/{id}/orders", get(orders::customer_orders))
				.route(
					"/guests/{scope}",
					post(guests::create_guest)
						.get(guests::get_guest)
						.delete(guests::clear_guest),
				)
				.route("/guests/{scope}/touch", post(guests::touch_guest))
				.route("/guests/{scope}/migrate", post(guests::migrate_guest)),
		)
		.with_state(state)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<ComandaEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { engine }).layer(
		ServiceBuilder::new()
			.layer(TraceLayer::new_for_http())
			.layer(TimeoutLayer::new(Duration::from_secs(
				api_config.timeout_seconds,
			)))
			.layer(cors_layer(api_config.cors.as_ref())),
	);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Comanda API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Permissive unless origins are configured.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match origin.parse::<HeaderValue>() {
			Ok(value) => Some(value),
			Err(e) => {
				tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();

	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(Any)
		.allow_headers(Any)
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use axum::body::Body;
	use axum::http::{Method, Request, StatusCode};
	use comanda_config::Config;
	use comanda_core::{ComandaBuilder, ComandaFactories};
	use comanda_types::ManualClock;
	use tower::ServiceExt;

	const TEST_CONFIG: &str = r#"
[service]
id = "api-test"

[storage]
primary = "memory"
[storage.implementations.memory]

[account]
primary = "local"
[account.implementations.local]
"#;

	/// Router over a fresh in-memory engine with a frozen clock.
	pub(crate) fn test_app() -> Router {
		let config: Config = TEST_CONFIG.parse().unwrap();
		let factories = ComandaFactories {
			storage_factories: comanda_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			auth_factories: comanda_account::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		};
		let engine = ComandaBuilder::new(config)
			.with_clock(Arc::new(ManualClock::new(1_700_000_000)))
			.build(factories)
			.unwrap();
		router(AppState {
			engine: Arc::new(engine),
		})
	}

	/// Sends one request and returns the status with the parsed JSON body.
	pub(crate) async fn request(
		app: &Router,
		method: Method,
		uri: &str,
		body: Option<serde_json::Value>,
	) -> (StatusCode, serde_json::Value) {
		let builder = Request::builder().method(method).uri(uri);
		let request = match body {
			Some(json) => builder
				.header("content-type", "application/json")
				.body(Body::from(json.to_string())),
			None => builder.body(Body::empty()),
		}
		.unwrap();

		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let json = if bytes.is_empty() {
			serde_json::Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, json)
	}
}
