use crate::auth::auth;
use crate::models::{
    ErrorResponse, ForceTakeRequest, ForceTakeResponse, LockStatus, LockTakenMessage,
    ServerMessage,
};
use crate::services::auth_service::AuthedUser;
use crate::state::AppState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

fn parse_doc_id(raw: &str) -> Result<Uuid, (StatusCode, Json<ErrorResponse>)> {
    Uuid::parse_str(raw).map_err(|e| {
        let status = StatusCode::BAD_REQUEST;
        (
            status,
            Json(ErrorResponse::new(
                status,
                format!("Invalid document UUID: {}", e),
            )),
        )
    })
}

fn lock_unavailable(e: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    error!("Lock store error: {}", e);
    let status = StatusCode::SERVICE_UNAVAILABLE;
    (
        status,
        Json(ErrorResponse::new(
            status,
            format!("Lock coordination unavailable: {}", e),
        )),
    )
}

/// Current holder and remaining TTL of a document lock
pub async fn lock_status(
    State(app_state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthedUser>,
    Path(doc_id): Path<String>,
) -> Result<(StatusCode, Json<LockStatus>), (StatusCode, Json<ErrorResponse>)> {
    // Parse the document id
    let doc_id = parse_doc_id(&doc_id)?;

    let state = app_state
        .locks
        .query(&doc_id)
        .await
        .map_err(lock_unavailable)?;
    let (holder, ttl) = match state {
        Some((holder, ttl)) => (Some(holder), ttl),
        None => (None, None),
    };

    Ok((
        StatusCode::OK,
        Json(LockStatus {
            doc_id,
            holder,
            ttl_secs: ttl.map(|d| d.as_secs()),
        }),
    ))
}

/// Reassign a document lock regardless of its current holder
pub async fn force_take_lock(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Path(doc_id): Path<String>,
    Json(body): Json<ForceTakeRequest>,
) -> Result<(StatusCode, Json<ForceTakeResponse>), (StatusCode, Json<ErrorResponse>)> {
    // Ensure the caller is a service or an admin
    auth::ensure_service_or_admin(&user)?;

    // Parse the document id
    let doc_id = parse_doc_id(&doc_id)?;

    let (new_holder, previous_holder) = app_state
        .locks
        .force_take(&doc_id, &body.new_holder_id, &body.new_holder_name)
        .await
        .map_err(lock_unavailable)?;

    // Tell the displaced holder to stop editing, on whichever process
    // their sessions live.
    if let Some(previous) = &previous_holder {
        if previous.user_id != new_holder.user_id {
            let notice = ServerMessage::LockTaken(LockTakenMessage {
                doc_id,
                new_holder: new_holder.clone(),
            });
            app_state
                .broadcaster
                .broadcast_to_user(&previous.user_id, &notice)
                .await;
        }
    }

    info!(
        "Lock on document {} force-taken by {} on behalf of {}",
        doc_id, user.uid, body.new_holder_id
    );

    Ok((
        StatusCode::OK,
        Json(ForceTakeResponse {
            doc_id,
            new_holder,
            previous_holder,
        }),
    ))
}
