use crate::auth::auth;
use crate::models::{DiagnosticsResponse, ErrorResponse};
use crate::services::auth_service::AuthedUser;
use crate::state::AppState;
use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use std::sync::{Arc, Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Connection, room and host stats snapshot for operators
pub async fn get_diagnostics(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<(StatusCode, Json<DiagnosticsResponse>), (StatusCode, Json<ErrorResponse>)> {
    // Ensure the caller is an admin
    auth::ensure_admin(&user)?;

    // Aggregate counts from the connection registry
    let n_conn = app_state.registry.total_connections() as u32;
    let n_rooms = app_state.registry.total_rooms() as u32;
    let n_users = app_state.registry.total_users() as u32;
    let rooms_by_scope = app_state.registry.rooms_by_scope();

    // System stats
    let (cpu_usage, memory_alloc, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| {
            Mutex::new(System::new_all())
        });
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0)
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), Conn: {}, Rooms: {}",
        cpu_usage,
        memory_alloc / 1024 / 1024,
        memory_total / 1024 / 1024,
        memory_free / 1024 / 1024,
        n_conn,
        n_rooms
    );

    return Ok((
        StatusCode::OK,
        Json(DiagnosticsResponse {
            n_conn,
            n_rooms,
            n_users,
            rooms_by_scope,
            cpu_usage,
            memory_alloc,
            memory_total,
            memory_free,
        }),
    ));
}
