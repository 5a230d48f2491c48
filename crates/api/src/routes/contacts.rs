//! Contact form route handlers.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::db::ContactRepository;
use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{ContactMessage, NewContactMessage};
use crate::state::AppState;

/// Store a contact form submission.
///
/// POST /api/contacts
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewContactMessage>,
) -> Result<ApiResponse<ContactMessage>> {
    body.validate()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    let message = ContactRepository::new(state.pool()).create(&body).await?;

    tracing::info!(contact_id = %message.id, "Contact message received");
    Ok(ApiResponse::created(message, "Message sent successfully"))
}

/// Every contact message, newest first.
///
/// GET /api/contacts
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<ApiResponse<Vec<ContactMessage>>> {
    let messages = ContactRepository::new(state.pool()).list().await?;
    Ok(ApiResponse::ok(messages))
}
