//! Logout endpoint.
//!
//! Logout is cookie-only: tokens are stateless, so the server just tells the
//! browser to drop every variant that could carry a session for the scope.

use axum::{
    Json,
    extract::{Extension, RawQuery},
    http::{HeaderMap, StatusCode, header::REFERER},
    response::IntoResponse,
};
use serde::Serialize;
use std::{collections::BTreeSet, sync::Arc};
use tracing::debug;
use utoipa::ToSchema;

use super::{
    cookies::{
        CookieJar, CookieKind, DISPLAY_NAME_COOKIE, ROLE_COOKIE, SetCookie, TOKEN_COOKIE,
        append_set_cookies, classify_cookie, session_cookie_name,
    },
    namespace::{Namespace, query_param, resolve_namespace, sticky_cookie_name},
    role::{Scope, ScopeQuery},
    state::{AuthConfig, AuthState},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    pub ok: bool,
}

#[utoipa::path(
    post,
    path = "/api/logout",
    params(
        ("scope" = Option<String>, Query, description = "user, admin or both (default)"),
        ("ns" = Option<String>, Query, description = "Namespace to log out of; all when omitted"),
    ),
    responses(
        (status = 200, description = "Session cookies cleared", body = LogoutResponse)
    ),
    tag = "session"
)]
pub async fn logout(
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let scope = ScopeQuery::parse(query_param(query.as_deref(), "scope").as_deref());
    let referer = headers.get(REFERER).and_then(|value| value.to_str().ok());
    let ns = resolve_namespace(query.as_deref(), None, referer);
    let jar = CookieJar::from_headers(&headers);

    let cookies = logout_cookies(auth_state.config(), scope, ns.as_ref(), &jar);
    debug!(scope = ?scope, ns = ?ns, cleared = cookies.len(), "Logout");

    let mut response_headers = HeaderMap::new();
    append_set_cookies(&mut response_headers, &cookies);
    (
        StatusCode::OK,
        response_headers,
        Json(LogoutResponse { ok: true }),
    )
        .into_response()
}

/// Expiry directives for every cookie that may hold a session of `scope`.
///
/// With `ns`, only that namespace's cookies are cleared; without it, every
/// namespaced session cookie present in the jar is.
#[must_use]
pub fn logout_cookies(
    config: &AuthConfig,
    scope: ScopeQuery,
    ns: Option<&Namespace>,
    jar: &CookieJar,
) -> Vec<SetCookie> {
    let mut names: Vec<String> = Vec::new();
    let mut seen = BTreeSet::new();
    let mut push = |name: String| {
        if seen.insert(name.clone()) {
            names.push(name);
        }
    };

    for &scope in scope.scopes() {
        match ns {
            Some(ns) => {
                for kind in CookieKind::NAMESPACED {
                    if let Some(name) = session_cookie_name(scope, kind, Some(ns)) {
                        push(name);
                    }
                }
            }
            None => {
                for (name, _) in jar.iter() {
                    if present_namespaced(scope, name) {
                        push(name.to_string());
                    }
                }
            }
        }
        if let Some(name) = session_cookie_name(scope, CookieKind::Legacy, None) {
            push(name);
        }
        push(sticky_cookie_name(scope));
    }

    push(TOKEN_COOKIE.to_string());
    push(ROLE_COOKIE.to_string());
    push(DISPLAY_NAME_COOKIE.to_string());

    names
        .into_iter()
        .map(|name| SetCookie::expire(name).with_secure(config.cookie_secure()))
        .collect()
}

fn present_namespaced(scope: Scope, name: &str) -> bool {
    classify_cookie(scope, name).is_some_and(|(kind, _)| CookieKind::NAMESPACED.contains(&kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cookies: &[SetCookie]) -> Vec<&str> {
        cookies.iter().map(|cookie| cookie.name.as_str()).collect()
    }

    #[test]
    fn logout_with_namespace_clears_its_variants() {
        let ns = Namespace::parse("tab01");
        let jar = CookieJar::parse("user_session__tab02=x");
        let cookies = logout_cookies(&AuthConfig::new(), ScopeQuery::User, ns.as_ref(), &jar);
        assert_eq!(
            names(&cookies),
            vec![
                "user_session__tab01",
                "user_session-tab01",
                "user_session",
                "current_user_ns",
                "token",
                "role",
                "displayName",
            ]
        );
        assert!(cookies.iter().all(|cookie| cookie.max_age == Some(0)));
    }

    #[test]
    fn logout_without_namespace_clears_every_present_session() {
        let jar = CookieJar::parse(
            "user_session__aaa=1; admin_session-bbb=2; admin_session__ccc=3; \
             admin_session__x=4; other=5",
        );
        let cookies = logout_cookies(&AuthConfig::new(), ScopeQuery::Both, None, &jar);
        assert_eq!(
            names(&cookies),
            vec![
                "user_session__aaa",
                "user_session",
                "current_user_ns",
                "admin_session-bbb",
                "admin_session__ccc",
                "admin_session",
                "current_admin_ns",
                "token",
                "role",
                "displayName",
            ]
        );
    }

    #[test]
    fn logout_cookies_follow_secure_flag() {
        let config = AuthConfig::new().with_cookie_secure(true);
        let cookies = logout_cookies(&config, ScopeQuery::Admin, None, &CookieJar::default());
        assert!(cookies.iter().all(|cookie| cookie.secure));
        assert!(names(&cookies).contains(&"admin_session"));
        assert!(!names(&cookies).contains(&"user_session"));
    }
}
