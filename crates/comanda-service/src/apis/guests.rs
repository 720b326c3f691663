//! Temporary guest endpoints, keyed by device scope.

use super::ApiError;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
};
use comanda_types::{
	format_remaining, Account, GuestPrefill, GuestSession, RegistrationData, TempProfile,
};
use serde::Serialize;

/// Guest identity as shown in the tracking view.
#[derive(Debug, Serialize)]
pub struct GuestResponse {
	pub profile: TempProfile,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session: Option<GuestSession>,
	/// `"1h 30m"`, `"45m"` or `"Expirado"`.
	pub time_remaining: String,
}

impl GuestResponse {
	fn new(state: &AppState, profile: TempProfile, session: Option<GuestSession>) -> Self {
		let now = state.engine.clock().now();
		let time_remaining = format_remaining(profile.remaining_at(now));
		Self {
			profile,
			session,
			time_remaining,
		}
	}
}

/// Handles POST /api/guests/{scope} requests.
pub async fn create_guest(
	Path(scope): Path<String>,
	State(state): State<AppState>,
	Json(prefill): Json<GuestPrefill>,
) -> Result<(StatusCode, Json<GuestResponse>), ApiError> {
	let profile = state.engine.guest(scope).create_temp_profile(prefill).await?;
	Ok((
		StatusCode::CREATED,
		Json(GuestResponse::new(&state, profile, None)),
	))
}

/// Handles GET /api/guests/{scope} requests.
pub async fn get_guest(
	Path(scope): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<GuestResponse>, ApiError> {
	let resumed = state
		.engine
		.guest(scope.as_str())
		.reactivate_temp_session()
		.await
		.ok_or_else(|| {
			ApiError::not_found(
				"GUEST_NOT_FOUND",
				format!("No active guest session for {}", scope),
			)
		})?;
	Ok(Json(GuestResponse::new(
		&state,
		resumed.profile,
		Some(resumed.session),
	)))
}

/// Handles POST /api/guests/{scope}/touch requests.
pub async fn touch_guest(
	Path(scope): Path<String>,
	State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
	state.engine.guest(scope).update_session_access().await?;
	Ok(StatusCode::NO_CONTENT)
}

/// Handles POST /api/guests/{scope}/migrate requests.
pub async fn migrate_guest(
	Path(scope): Path<String>,
	State(state): State<AppState>,
	Json(registration): Json<RegistrationData>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
	let account = state
		.engine
		.guest(scope)
		.migrate_to_permanent_account(registration)
		.await?;
	Ok((StatusCode::CREATED, Json(account)))
}

/// Handles DELETE /api/guests/{scope} requests.
pub async fn clear_guest(
	Path(scope): Path<String>,
	State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
	state.engine.guest(scope).clear_temp_session().await?;
	Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
	use crate::server::test_support::{request, test_app};
	use axum::http::{Method, StatusCode};
	use serde_json::json;

	#[tokio::test]
	async fn test_guest_round_trip_and_migration() {
		let app = test_app();

		let (status, body) = request(
			&app,
			Method::POST,
			"/api/guests/phone-1",
			Some(json!({ "name": "Ana", "email": "ana@example.com" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["profile"]["name"], "Ana");
		assert_eq!(body["profile"]["is_temporary"], true);
		assert_eq!(body["time_remaining"], "2h 0m");

		let (status, body) = request(&app, Method::GET, "/api/guests/phone-1", None).await;
		assert_eq!(status, StatusCode::OK);
		assert!(body["session"]["is_active"].as_bool().unwrap());

		let (status, _) = request(&app, Method::POST, "/api/guests/phone-1/touch", None).await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, body) = request(
			&app,
			Method::POST,
			"/api/guests/phone-1/migrate",
			Some(json!({ "password": "tortilla", "phone": "600123123" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["email"], "ana@example.com");
		assert_eq!(body["phone"], "600123123");

		let (status, body) = request(&app, Method::GET, "/api/guests/phone-1", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "GUEST_NOT_FOUND");
	}

	#[tokio::test]
	async fn test_migration_without_guest_fails() {
		let app = test_app();
		let (status, body) = request(
			&app,
			Method::POST,
			"/api/guests/empty/migrate",
			Some(json!({ "password": "tortilla", "name": "Ana", "email": "a@b.c" })),
		)
		.await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"], "MIGRATION_FAILED");
	}

	#[tokio::test]
	async fn test_clear_guest() {
		let app = test_app();
		request(&app, Method::POST, "/api/guests/tablet", Some(json!({}))).await;

		let (status, _) = request(&app, Method::DELETE, "/api/guests/tablet", None).await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, _) = request(&app, Method::GET, "/api/guests/tablet", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}
}
