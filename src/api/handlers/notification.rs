//! Notification handlers: list and toggle read status.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};

use crate::api::auth::AuthenticatedUser;
use crate::api::dto::NotificationDto;
use crate::app_state::AppState;
use crate::domain::NotificationId;
use crate::error::{ErrorResponse, HubError};

/// `GET /notifications` — List the caller's notifications.
///
/// # Errors
///
/// Returns [`HubError`] on a missing session or storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    summary = "List notifications",
    description = "Returns every notification addressed to the authenticated user, oldest first. An empty array when there are none.",
    responses(
        (status = 200, description = "Notification list", body = Vec<NotificationDto>),
        (status = 401, description = "Missing or unknown session", body = ErrorResponse),
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, HubError> {
    let notifications = state.notifications.list_for_user(user.user_id).await?;
    let body: Vec<NotificationDto> = notifications.into_iter().map(NotificationDto::from).collect();
    Ok((StatusCode::OK, Json(body)))
}

/// `PATCH /notifications/{id}/read` — Flip a notification's read flag.
///
/// # Errors
///
/// Returns [`HubError::NotificationNotFound`] if the notification does not
/// exist or belongs to another user.
#[utoipa::path(
    patch,
    path = "/api/v1/notifications/{id}/read",
    tag = "Notifications",
    summary = "Toggle read status",
    description = "Toggles `is_read` on one of the authenticated user's notifications and returns the updated row.",
    params(("id" = i64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Updated notification", body = NotificationDto),
        (status = 401, description = "Missing or unknown session", body = ErrorResponse),
        (status = 404, description = "Notification not found", body = ErrorResponse),
    )
)]
pub async fn toggle_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HubError> {
    let updated = state
        .notifications
        .toggle_read(NotificationId::new(id), user.user_id)
        .await?;
    tracing::debug!(notification_id = id, user_id = %user.user_id, is_read = updated.is_read, "read flag toggled");
    Ok((StatusCode::OK, Json(NotificationDto::from(updated))))
}

/// Notification routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}/read", patch(toggle_read))
}
