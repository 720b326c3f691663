//! HTTP handlers for the Comanda API.
//!
//! Every failure is rendered as a JSON [`ErrorResponse`] with a stable
//! machine-readable `error` code.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use comanda_account::AuthError;
use comanda_core::{CheckoutError, GuestSessionError, OrderLifecycleError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod guests;
pub mod orders;

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

/// An error that maps onto an HTTP status and error code.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
	status: StatusCode,
	code: &'static str,
	message: String,
}

impl ApiError {
	pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
		Self {
			status,
			code,
			message: message.into(),
		}
	}

	pub fn bad_request(message: impl Into<String>) -> Self {
		Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
	}

	pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
		Self::new(StatusCode::NOT_FOUND, code, message)
	}

	pub fn status(&self) -> StatusCode {
		self.status
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorResponse {
			error: self.code.to_string(),
			message: self.message,
		};
		(self.status, Json(body)).into_response()
	}
}

impl From<OrderLifecycleError> for ApiError {
	fn from(e: OrderLifecycleError) -> Self {
		let (status, code) = match &e {
			OrderLifecycleError::InvalidTransition { .. } => {
				(StatusCode::CONFLICT, "INVALID_TRANSITION")
			},
			OrderLifecycleError::MissingDeliveryConfirmation => (
				StatusCode::UNPROCESSABLE_ENTITY,
				"MISSING_DELIVERY_CONFIRMATION",
			),
			OrderLifecycleError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
			OrderLifecycleError::Storage(_) => {
				(StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE")
			},
		};
		Self::new(status, code, e.to_string())
	}
}

impl From<GuestSessionError> for ApiError {
	fn from(e: GuestSessionError) -> Self {
		let (status, code) = match &e {
			GuestSessionError::StorageUnavailable(_) => {
				(StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE")
			},
			GuestSessionError::MigrationFailed(_) => {
				(StatusCode::UNPROCESSABLE_ENTITY, "MIGRATION_FAILED")
			},
		};
		Self::new(status, code, e.to_string())
	}
}

impl From<CheckoutError> for ApiError {
	fn from(e: CheckoutError) -> Self {
		match e {
			CheckoutError::Guest(e) => e.into(),
			CheckoutError::Order(e) => e.into(),
		}
	}
}

impl From<AuthError> for ApiError {
	fn from(e: AuthError) -> Self {
		Self::new(
			StatusCode::SERVICE_UNAVAILABLE,
			"ACCOUNT_SERVICE_UNAVAILABLE",
			e.to_string(),
		)
	}
}
