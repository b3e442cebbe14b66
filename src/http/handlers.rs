use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::allocator::{UsageReport, UserLabel};
use crate::http::response::ApiError;
use crate::http::server::AppState;

/// Identity fields of the user asking for access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteRequest {
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteResponse {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServersResponse {
    pub version: u64,
    pub servers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn create_invite(
    State(state): State<AppState>,
    Json(request): Json<InviteRequest>,
) -> Result<Json<InviteResponse>, ApiError> {
    if request.first_name.trim().is_empty() {
        return Err(ApiError::bad_request("first_name must not be empty"));
    }

    let label = UserLabel::from_identity(
        &request.first_name,
        request.last_name.as_deref(),
        request.user_id,
    );
    let url = state.allocator.generate_url(label.as_str()).await?;

    Ok(Json(InviteResponse {
        label: label.to_string(),
        url: url.into_string(),
    }))
}

pub async fn get_usage(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Result<Json<UsageReport>, ApiError> {
    tracing::info!(label = %label, "Usage requested");
    match state.allocator.usage(&label).await? {
        Some(report) => Ok(Json(report)),
        None => Err(ApiError::not_found(format!("no active credential for {}", label))),
    }
}

pub async fn get_servers(State(state): State<AppState>) -> Json<ServersResponse> {
    let snapshot = state.allocator.pool().current();
    Json(ServersResponse {
        version: snapshot.version(),
        servers: snapshot.servers().to_vec(),
    })
}

pub async fn get_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
