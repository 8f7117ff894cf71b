//! Cookie jar parsing, session cookie naming, and `Set-Cookie` directives.
//!
//! Session cookies come in four shapes, kept as an explicit table so the
//! precedence between them is auditable:
//!
//! | kind         | name                     |
//! |--------------|--------------------------|
//! | `Namespaced` | `{scope}_session__{ns}`  |
//! | `Dashed`     | `{scope}_session-{ns}`   |
//! | `Legacy`     | `{scope}_session`        |
//! | `BareToken`  | `token`                  |
//!
//! The jar is read-only; writes are expressed as [`SetCookie`] values the
//! caller renders into response headers.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
};
use std::fmt;
use tracing::warn;

use super::{namespace::Namespace, role::Scope};

pub const TOKEN_COOKIE: &str = "token";
pub const ROLE_COOKIE: &str = "role";
pub const DISPLAY_NAME_COOKIE: &str = "displayName";

/// Cookies of one request, in header order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: Vec<(String, String)>,
}

impl CookieJar {
    /// Parse a `Cookie` header value. Never fails: broken segments are skipped
    /// and values that do not percent-decode are kept raw.
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let mut jar = Self::default();
        jar.extend_from(header);
        jar
    }

    /// Parse every `Cookie` header of a request.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::default();
        for value in headers.get_all(COOKIE) {
            // Raw non-ASCII bytes only damage the cookie that carries them.
            jar.extend_from(&String::from_utf8_lossy(value.as_bytes()));
        }
        jar
    }

    fn extend_from(&mut self, header: &str) {
        for pair in header.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|inner| inner.strip_suffix('"'))
                .unwrap_or(value);
            let decoded = urlencoding::decode(value)
                .map_or_else(|_| value.to_string(), |decoded| decoded.into_owned());
            self.entries.push((name.to_string(), decoded));
        }
    }

    /// Value of the first cookie called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All cookies whose name starts with `prefix`.
    #[must_use]
    pub fn by_prefix(&self, prefix: &str) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shapes a session cookie name can take, in precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CookieKind {
    Namespaced,
    Dashed,
    Legacy,
    BareToken,
}

impl CookieKind {
    /// Lower ranks win ties between otherwise equal candidates.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Namespaced => 0,
            Self::Dashed => 1,
            Self::Legacy => 2,
            Self::BareToken => 3,
        }
    }

    /// Kinds that carry a namespace in their name.
    pub const NAMESPACED: [Self; 2] = [Self::Namespaced, Self::Dashed];
    /// Kinds shared by every namespace.
    pub const GLOBAL: [Self; 2] = [Self::Legacy, Self::BareToken];
}

/// Cookie-name prefix shared by the namespaced session cookies of `scope`.
#[must_use]
pub fn session_prefix(scope: Scope, kind: CookieKind) -> String {
    match kind {
        CookieKind::Namespaced => format!("{}_session__", scope.as_str()),
        CookieKind::Dashed => format!("{}_session-", scope.as_str()),
        CookieKind::Legacy => format!("{}_session", scope.as_str()),
        CookieKind::BareToken => TOKEN_COOKIE.to_string(),
    }
}

/// Cookie name for a session of `kind`. Namespaced kinds need `ns`.
#[must_use]
pub fn session_cookie_name(
    scope: Scope,
    kind: CookieKind,
    ns: Option<&Namespace>,
) -> Option<String> {
    match kind {
        CookieKind::Namespaced | CookieKind::Dashed => {
            ns.map(|ns| format!("{}{}", session_prefix(scope, kind), ns.as_str()))
        }
        CookieKind::Legacy | CookieKind::BareToken => Some(session_prefix(scope, kind)),
    }
}

/// Classify a cookie name as a session cookie of `scope`.
///
/// Namespaced names with an invalid namespace are not session cookies.
#[must_use]
pub fn classify_cookie(scope: Scope, name: &str) -> Option<(CookieKind, Option<Namespace>)> {
    if name == TOKEN_COOKIE {
        return Some((CookieKind::BareToken, None));
    }
    if name == session_prefix(scope, CookieKind::Legacy) {
        return Some((CookieKind::Legacy, None));
    }
    CookieKind::NAMESPACED.into_iter().find_map(|kind| {
        name.strip_prefix(&session_prefix(scope, kind))
            .and_then(Namespace::parse)
            .map(|ns| (kind, Some(ns)))
    })
}

/// A `Set-Cookie` directive. All cookies are `Path=/; SameSite=Lax`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub http_only: bool,
    pub max_age: Option<i64>,
    pub secure: bool,
}

impl SetCookie {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            http_only: false,
            max_age: None,
            secure: false,
        }
    }

    /// Directive that deletes `name` in the browser.
    #[must_use]
    pub fn expire(name: impl Into<String>) -> Self {
        Self::new(name, "").with_max_age(0)
    }

    #[must_use]
    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Render as a header value.
    ///
    /// # Errors
    /// Returns an error if the name contains characters not allowed in headers.
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.to_string())
    }
}

/// Append `Set-Cookie` headers, skipping (and logging) any that cannot be rendered.
pub fn append_set_cookies(headers: &mut HeaderMap, cookies: &[SetCookie]) {
    for cookie in cookies {
        match cookie.to_header_value() {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => warn!(cookie = %cookie.name, "Failed to render Set-Cookie: {err}"),
        }
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path=/; SameSite=Lax",
            self.name,
            urlencoding::encode(&self.value)
        )?;
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}
