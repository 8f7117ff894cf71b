//! Admin service grant management.
//!
//! Flow Overview:
//! 1) Resolve the caller's admin session (namespace from `?ns=` or `Referer`).
//! 2) Super admins may read and replace anyone's grants; feature admins may
//!    only read their own.
//! 3) A `PUT` body is only parsed after the caller passed both checks, so an
//!    anonymous caller always sees 401.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, RawQuery},
    http::{HeaderMap, StatusCode, header::REFERER},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use super::auth::{
    AuthState, SessionResolver,
    cookies::CookieJar,
    namespace::resolve_namespace,
    resolver::EnrichedClaims,
    role::{Role, Scope},
    token::unix_now,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminServicesResponse {
    pub admin_id: i64,
    pub service_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AdminServicesUpdate {
    pub service_ids: Vec<i64>,
}

#[utoipa::path(
    get,
    path = "/api/admin/admins/{admin_id}/services",
    params(
        ("admin_id" = i64, Path, description = "Admin whose grants to list"),
        ("ns" = Option<String>, Query, description = "Caller's admin session namespace"),
    ),
    responses(
        (
            status = 200,
            description = "Services the admin may manage.",
            body = AdminServicesResponse
        ),
        (status = 401, description = "No admin session."),
        (status = 403, description = "Caller may not view these grants."),
    ),
    tag = "admin"
)]
pub async fn get_admin_services(
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    Path(admin_id): Path<i64>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let caller = match require_admin(&auth_state, &headers, query.as_deref()).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    if caller.claims.role != Role::SuperAdmin && caller.claims.sub != admin_id {
        return StatusCode::FORBIDDEN.into_response();
    }

    match auth_state.grants().service_ids(admin_id).await {
        Ok(service_ids) => (
            StatusCode::OK,
            Json(AdminServicesResponse {
                admin_id,
                service_ids,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to lookup admin services: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/admins/{admin_id}/services",
    params(
        ("admin_id" = i64, Path, description = "Admin whose grants to replace"),
        ("ns" = Option<String>, Query, description = "Caller's admin session namespace"),
    ),
    request_body = AdminServicesUpdate,
    responses(
        (status = 200, description = "Grants replaced.", body = AdminServicesResponse),
        (status = 400, description = "Body is not a valid grant list."),
        (status = 401, description = "No admin session."),
        (status = 403, description = "Caller is not a super admin."),
    ),
    tag = "admin"
)]
pub async fn put_admin_services(
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    Path(admin_id): Path<i64>,
    auth_state: Extension<Arc<AuthState>>,
    body: Bytes,
) -> Response {
    let caller = match require_admin(&auth_state, &headers, query.as_deref()).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    if caller.claims.role != Role::SuperAdmin {
        return StatusCode::FORBIDDEN.into_response();
    }

    let payload: AdminServicesUpdate = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid request body: {err}") })),
            )
                .into_response();
        }
    };

    match auth_state
        .grants()
        .replace_service_ids(admin_id, &payload.service_ids)
        .await
    {
        Ok(service_ids) => {
            info!(
                admin_id,
                granted_by = caller.claims.sub,
                services = service_ids.len(),
                "Admin services replaced"
            );
            (
                StatusCode::OK,
                Json(AdminServicesResponse {
                    admin_id,
                    service_ids,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to replace admin services: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Resolve the caller's admin session, or the response to send instead.
async fn require_admin(
    auth_state: &AuthState,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<EnrichedClaims, Response> {
    let codec = auth_state.codec().map_err(IntoResponse::into_response)?;
    let referer = headers.get(REFERER).and_then(|value| value.to_str().ok());
    let ns = resolve_namespace(query, None, referer);
    let jar = CookieJar::from_headers(headers);

    SessionResolver::new(codec, auth_state.grants())
        .resolve(Scope::Admin, ns.as_ref(), &jar, unix_now())
        .await
        .payload
        .ok_or_else(|| StatusCode::UNAUTHORIZED.into_response())
}
