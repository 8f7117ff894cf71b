//! Page route guard.
//!
//! Flow Overview:
//! 1) Public paths pass untouched.
//! 2) Everything else needs the bare `token` cookie; without it (or if it does
//!    not verify) the browser is sent to the login page with a `from` return path.
//! 3) `/Admin` pages additionally need an admin role.
//! 4) Allowed requests get `role`/`displayName` refreshed, but only when the
//!    browser's copies are stale.
//!
//! A missing session secret is the one hard failure (HTTP 500).

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

use super::{
    cookies::{
        CookieJar, DISPLAY_NAME_COOKIE, ROLE_COOKIE, SetCookie, TOKEN_COOKIE, append_set_cookies,
    },
    error::AuthError,
    state::{AuthConfig, AuthState},
    token::{TokenCodec, unix_now},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allow { set_cookies: Vec<SetCookie> },
    Redirect { location: String },
}

pub struct RouteGuard<'a> {
    config: &'a AuthConfig,
    codec: Option<&'a TokenCodec>,
}

impl<'a> RouteGuard<'a> {
    #[must_use]
    pub fn new(config: &'a AuthConfig, codec: Option<&'a TokenCodec>) -> Self {
        Self { config, codec }
    }

    /// Decide what happens to a page request as of `now`.
    ///
    /// # Errors
    /// Returns [`AuthError::NoSecret`] when a token must be verified but no
    /// session secret is configured.
    pub fn check(
        &self,
        path: &str,
        query: Option<&str>,
        jar: &CookieJar,
        now: i64,
    ) -> Result<GuardDecision, AuthError> {
        if self.is_public(path) {
            return Ok(GuardDecision::Allow {
                set_cookies: Vec::new(),
            });
        }

        let Some(token) = jar.get(TOKEN_COOKIE).filter(|token| !token.trim().is_empty()) else {
            debug!(path, "No session cookie, redirecting to login");
            return Ok(self.login_redirect(path, query));
        };

        let codec = self.codec.ok_or(AuthError::NoSecret)?;
        let claims = match codec.verify_at(token, now) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(path, reason = %err, "Session cookie rejected, redirecting to login");
                return Ok(self.login_redirect(path, query));
            }
        };

        if self.is_admin_path(path) && !claims.role.is_admin() {
            debug!(
                path,
                role = %claims.role,
                reason = %AuthError::RoleMismatch,
                "Admin page denied"
            );
            return Ok(GuardDecision::Redirect {
                location: self.config.admin_login_path().to_string(),
            });
        }

        let mut set_cookies = Vec::new();
        for (name, value) in [
            (ROLE_COOKIE, claims.role.as_str()),
            (DISPLAY_NAME_COOKIE, claims.name.as_str()),
        ] {
            if jar.get(name) != Some(value) {
                set_cookies
                    .push(SetCookie::new(name, value).with_secure(self.config.cookie_secure()));
            }
        }

        Ok(GuardDecision::Allow { set_cookies })
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.config.public_paths().iter().any(|public| public == path)
            || self
                .config
                .public_prefixes()
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// `/Admin` and anything below it; `/Administrator` is not an admin page.
    #[must_use]
    pub fn is_admin_path(&self, path: &str) -> bool {
        let prefix = self.config.admin_prefix();
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    #[must_use]
    pub fn login_path_for(&self, path: &str) -> &str {
        if self.is_admin_path(path) {
            self.config.admin_login_path()
        } else {
            self.config.user_login_path()
        }
    }

    fn login_redirect(&self, path: &str, query: Option<&str>) -> GuardDecision {
        let from = match query.filter(|query| !query.is_empty()) {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        GuardDecision::Redirect {
            location: format!(
                "{}?from={}",
                self.login_path_for(path),
                urlencoding::encode(&from)
            ),
        }
    }
}

/// Axum middleware applying [`RouteGuard`] to every request.
pub async fn route_guard(
    State(state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);

    let guard = RouteGuard::new(state.config(), state.codec().ok());
    match guard.check(&path, query.as_deref(), &jar, unix_now()) {
        Ok(GuardDecision::Allow { set_cookies }) => {
            let mut response = next.run(request).await;
            append_set_cookies(response.headers_mut(), &set_cookies);
            response
        }
        Ok(GuardDecision::Redirect { location }) => Redirect::temporary(&location).into_response(),
        Err(err) => {
            error!(path = %path, "Route guard failed: {err}");
            err.into_response()
        }
    }
}
