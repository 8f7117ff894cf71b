//! Browser session namespaces.
//!
//! The portal pages generate a namespace per browser tab group so several
//! logins can coexist in one browser. A namespace is only ever a hint: values
//! that do not match the pattern are treated exactly like missing ones, so a
//! bad `ns` never breaks navigation.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use url::{Url, form_urlencoded};

use super::{cookies::CookieJar, role::Scope};

pub const NAMESPACE_PATTERN: &str = r"^[A-Za-z0-9_-]{3,32}$";
pub const NAMESPACE_PARAM: &str = "ns";

/// A validated namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(String);

impl Namespace {
    /// Padded values are rejected, not trimmed.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Regex::new(NAMESPACE_PATTERN)
            .is_ok_and(|regex| regex.is_match(value))
            .then(|| Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First value of `key` in a raw query string (without the leading `?`).
#[must_use]
pub fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

/// Read `ns` from a raw query string.
#[must_use]
pub fn from_query(query: Option<&str>) -> Option<Namespace> {
    query_param(query, NAMESPACE_PARAM).and_then(|value| Namespace::parse(&value))
}

/// Read `ns` from a JSON request body.
#[must_use]
pub fn from_body(body: Option<&Value>) -> Option<Namespace> {
    body?
        .get(NAMESPACE_PARAM)
        .and_then(Value::as_str)
        .and_then(Namespace::parse)
}

/// Read `ns` from the query string of the `Referer` URL.
#[must_use]
pub fn from_referer(referer: Option<&str>) -> Option<Namespace> {
    let url = Url::parse(referer?).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == NAMESPACE_PARAM)
        .and_then(|(_, value)| Namespace::parse(&value))
}

/// Explicit namespace for a request: query, then body, then referer.
#[must_use]
pub fn resolve_namespace(
    query: Option<&str>,
    body: Option<&Value>,
    referer: Option<&str>,
) -> Option<Namespace> {
    from_query(query)
        .or_else(|| from_body(body))
        .or_else(|| from_referer(referer))
}

/// Name of the cookie remembering the last namespace used for `scope`.
#[must_use]
pub fn sticky_cookie_name(scope: Scope) -> String {
    format!("current_{}_ns", scope.as_str())
}

/// Namespace remembered in the sticky cookie for `scope`, if valid.
#[must_use]
pub fn sticky_namespace(jar: &CookieJar, scope: Scope) -> Option<Namespace> {
    jar.get(&sticky_cookie_name(scope))
        .and_then(Namespace::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_enforces_pattern() {
        assert!(Namespace::parse("abc").is_some());
        assert!(Namespace::parse("tab_01-A").is_some());
        assert!(Namespace::parse(&"x".repeat(32)).is_some());
        assert!(Namespace::parse("ab").is_none());
        assert!(Namespace::parse(&"x".repeat(33)).is_none());
        assert!(Namespace::parse("bad ns").is_none());
        assert!(Namespace::parse("tab.01").is_none());
        assert!(Namespace::parse("").is_none());
        assert!(Namespace::parse(" tab01").is_none());
        assert!(Namespace::parse("tab01\n").is_none());
    }

    #[test]
    fn padded_query_value_is_absent() {
        assert_eq!(from_query(Some("ns=%20tab01%20")), None);
        assert_eq!(from_query(Some("ns=tab01+")), None);
        assert_eq!(
            from_query(Some("ns=tab01")).as_ref().map(Namespace::as_str),
            Some("tab01")
        );
    }

    #[test]
    fn query_wins_over_body_and_referer() {
        let body = json!({"ns": "body_ns"});
        let ns = resolve_namespace(
            Some("scope=user&ns=query_ns"),
            Some(&body),
            Some("https://bi-one.dev/User?ns=referer_ns"),
        );
        assert_eq!(ns.as_ref().map(Namespace::as_str), Some("query_ns"));
    }

    #[test]
    fn invalid_query_falls_through_to_body() {
        let body = json!({"ns": "body_ns"});
        let ns = resolve_namespace(Some("ns=x"), Some(&body), None);
        assert_eq!(ns.as_ref().map(Namespace::as_str), Some("body_ns"));
    }

    #[test]
    fn referer_is_last_resort() {
        let ns = resolve_namespace(
            None,
            Some(&json!({"ns": 42})),
            Some("https://bi-one.dev/Admin/Fitur?tab=1&ns=adm_tab"),
        );
        assert_eq!(ns.as_ref().map(Namespace::as_str), Some("adm_tab"));
    }

    #[test]
    fn nothing_valid_means_none() {
        assert_eq!(resolve_namespace(None, None, None), None);
        assert_eq!(
            resolve_namespace(Some("ns=%20"), None, Some("not a url")),
            None
        );
    }

    #[test]
    fn sticky_cookie_is_validated() {
        let jar = CookieJar::parse("current_admin_ns=adm_1; current_user_ns=!!");
        assert_eq!(
            sticky_namespace(&jar, Scope::Admin).as_ref().map(Namespace::as_str),
            Some("adm_1")
        );
        assert_eq!(sticky_namespace(&jar, Scope::User), None);
    }
}
