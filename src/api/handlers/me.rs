//! Session query endpoint.
//!
//! Flow Overview:
//! 1) Read `scope` and `ns` from the query string or JSON body (the `ns` may
//!    also come from the `Referer`).
//! 2) Resolve the requested scopes against the request cookies.
//! 3) Answer 200 with one `ResolvedSession` per scope, even when logged out.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, RawQuery},
    http::{HeaderMap, StatusCode, header::REFERER},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

use super::auth::{
    AuthState, ResolvedSession, SessionResolver,
    cookies::CookieJar,
    namespace::{query_param, resolve_namespace},
    role::{Scope, ScopeQuery},
    token::unix_now,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub scope: ScopeQuery,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ResolvedSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<ResolvedSession>,
}

/// Body accepted by `POST /api/me`; every field is optional.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MeRequest {
    pub scope: Option<String>,
    pub ns: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/me",
    params(
        ("scope" = Option<String>, Query, description = "user, admin or both (default)"),
        ("ns" = Option<String>, Query, description = "Browser session namespace"),
    ),
    responses(
        (
            status = 200,
            description = "Resolved sessions for the requested scopes.",
            body = MeResponse
        ),
        (status = 500, description = "Session secret is not configured."),
    ),
    tag = "session"
)]
pub async fn get_me(
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    resolve_me(&auth_state, &headers, query.as_deref(), None).await
}

#[utoipa::path(
    post,
    path = "/api/me",
    request_body = MeRequest,
    responses(
        (
            status = 200,
            description = "Resolved sessions for the requested scopes.",
            body = MeResponse
        ),
        (status = 500, description = "Session secret is not configured."),
    ),
    tag = "session"
)]
pub async fn post_me(
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    auth_state: Extension<Arc<AuthState>>,
    body: Bytes,
) -> Response {
    // A missing or broken body is the same as an empty one.
    let body: Option<Value> = serde_json::from_slice(&body).ok();
    resolve_me(&auth_state, &headers, query.as_deref(), body.as_ref()).await
}

async fn resolve_me(
    auth_state: &AuthState,
    headers: &HeaderMap,
    query: Option<&str>,
    body: Option<&Value>,
) -> Response {
    let raw_scope = query_param(query, "scope").or_else(|| {
        body.and_then(|body| body.get("scope"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let scope = ScopeQuery::parse(raw_scope.as_deref());

    let referer = headers.get(REFERER).and_then(|value| value.to_str().ok());
    let ns = resolve_namespace(query, body, referer);

    let codec = match auth_state.codec() {
        Ok(codec) => codec,
        Err(err) => return err.into_response(),
    };

    let jar = CookieJar::from_headers(headers);
    let resolver = SessionResolver::new(codec, auth_state.grants());
    let now = unix_now();

    let mut response = MeResponse {
        scope,
        user: None,
        admin: None,
    };
    for &target in scope.scopes() {
        let session = resolver.resolve(target, ns.as_ref(), &jar, now).await;
        match target {
            Scope::User => response.user = Some(session),
            Scope::Admin => response.admin = Some(session),
        }
    }
    debug!(scope = ?scope, ns = ?ns, "Session query answered");

    (StatusCode::OK, Json(response)).into_response()
}
