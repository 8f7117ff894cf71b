//! Session resolution for one scope of one request.
//!
//! Flow Overview:
//! 1) Pick the namespace hint: explicit (query/body/referer) first, then the
//!    sticky `current_{scope}_ns` cookie.
//! 2) With a hint, only that namespace's cookies and the legacy globals whose
//!    claim agrees with it are candidates. Nothing else may satisfy it.
//! 3) Without a hint, every namespaced cookie of the scope is verified and the
//!    latest valid one wins; the legacy globals are tried only if none does.
//! 4) Admin sessions are enriched with their service grants (one lookup).
//!
//! Resolution never fails: every rejection ends as `hasToken: false`.

use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::{
    cookies::{CookieJar, CookieKind, classify_cookie, session_cookie_name},
    error::AuthError,
    namespace::{Namespace, sticky_namespace},
    role::{Role, Scope},
    storage::GrantStore,
    token::{SessionClaims, TokenCodec},
};

/// Admin-only additions to a resolved session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct AdminEnrichment {
    pub role_id: u8,
    pub service_ids: Vec<i64>,
}

/// Verified claims plus the admin enrichment when resolved for the admin scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct EnrichedClaims {
    #[serde(flatten)]
    pub claims: SessionClaims,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<AdminEnrichment>,
}

impl EnrichedClaims {
    /// Whether this session may manage `service_id`.
    #[must_use]
    pub fn can_administer(&self, service_id: i64) -> bool {
        match self.claims.role {
            Role::SuperAdmin => true,
            Role::AdminFitur => self
                .admin
                .as_ref()
                .is_some_and(|admin| admin.service_ids.contains(&service_id)),
            Role::User => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSession {
    pub has_token: bool,
    pub payload: Option<EnrichedClaims>,
    pub cookie_name: Option<String>,
    pub ns: Option<String>,
}

impl ResolvedSession {
    #[must_use]
    pub fn unauthenticated(ns: Option<&Namespace>) -> Self {
        Self {
            has_token: false,
            payload: None,
            cookie_name: None,
            ns: ns.map(ToString::to_string),
        }
    }
}

/// Where a pinned namespace came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NamespaceSource {
    Explicit,
    Sticky,
}

#[derive(Clone, Debug)]
struct Candidate<'j> {
    name: String,
    kind: CookieKind,
    ns: Option<Namespace>,
    token: &'j str,
}

#[derive(Debug)]
struct Verified<'j> {
    candidate: Candidate<'j>,
    claims: SessionClaims,
}

/// Total order over valid candidates: later `exp`, then later `iat`, then
/// cookie-kind precedence, then the smaller cookie name.
fn rank(a: &Verified<'_>, b: &Verified<'_>) -> Ordering {
    a.claims
        .exp
        .cmp(&b.claims.exp)
        .then(a.claims.iat.cmp(&b.claims.iat))
        .then(
            b.candidate
                .kind
                .precedence()
                .cmp(&a.candidate.kind.precedence()),
        )
        .then(b.candidate.name.cmp(&a.candidate.name))
}

pub struct SessionResolver<'a> {
    codec: &'a TokenCodec,
    grants: &'a dyn GrantStore,
}

impl<'a> SessionResolver<'a> {
    #[must_use]
    pub fn new(codec: &'a TokenCodec, grants: &'a dyn GrantStore) -> Self {
        Self { codec, grants }
    }

    /// Resolve the session of `scope` as of `now`.
    pub async fn resolve(
        &self,
        scope: Scope,
        explicit: Option<&Namespace>,
        jar: &CookieJar,
        now: i64,
    ) -> ResolvedSession {
        let pinned = explicit
            .cloned()
            .map(|ns| (ns, NamespaceSource::Explicit))
            .or_else(|| sticky_namespace(jar, scope).map(|ns| (ns, NamespaceSource::Sticky)));

        if let Some((ns, source)) = &pinned {
            debug!(scope = scope.as_str(), ns = %ns, source = ?source, "Namespace pinned");
        }
        let pinned_ns = pinned.as_ref().map(|(ns, _)| ns);

        let winner = match self.select(scope, pinned_ns, jar, now) {
            Ok(winner) => winner,
            Err(err) => {
                debug!(scope = scope.as_str(), reason = %err, "No session resolved");
                return ResolvedSession::unauthenticated(pinned_ns);
            }
        };

        let Verified { candidate, claims } = winner;
        let ns = pinned_ns
            .cloned()
            .or(candidate.ns)
            .or_else(|| claims.ns.as_deref().and_then(Namespace::parse));

        match self.enrich(scope, claims).await {
            Ok(payload) => {
                debug!(
                    scope = scope.as_str(),
                    cookie = %candidate.name,
                    sub = payload.claims.sub,
                    "Session resolved"
                );
                ResolvedSession {
                    has_token: true,
                    payload: Some(payload),
                    cookie_name: Some(candidate.name),
                    ns: ns.map(|ns| ns.to_string()),
                }
            }
            Err(err) => {
                warn!(scope = scope.as_str(), reason = %err, "Session enrichment failed");
                ResolvedSession::unauthenticated(pinned_ns)
            }
        }
    }

    fn select<'j>(
        &self,
        scope: Scope,
        pinned: Option<&Namespace>,
        jar: &'j CookieJar,
        now: i64,
    ) -> Result<Verified<'j>, AuthError> {
        if let Some(ns) = pinned {
            let mut candidates = pinned_candidates(scope, ns, jar);
            candidates.extend(global_candidates(scope, jar));
            return self.best(scope, pinned, candidates, now);
        }

        let namespaced = namespaced_candidates(scope, jar);
        if namespaced.is_empty() {
            debug!(
                scope = scope.as_str(),
                reason = %AuthError::NoNamespace,
                "No namespaced sessions"
            );
        } else if let Ok(winner) = self.best(scope, None, namespaced, now) {
            return Ok(winner);
        }

        self.best(scope, None, global_candidates(scope, jar), now)
    }

    fn best<'j>(
        &self,
        scope: Scope,
        pinned: Option<&Namespace>,
        candidates: Vec<Candidate<'j>>,
        now: i64,
    ) -> Result<Verified<'j>, AuthError> {
        let mut last_err = AuthError::NoToken;
        let mut best: Option<Verified<'j>> = None;

        for candidate in candidates {
            let name = candidate.name.clone();
            match self.verify_candidate(scope, pinned, candidate, now) {
                Ok(verified) => {
                    best = match best {
                        Some(current) if rank(&current, &verified) != Ordering::Less => {
                            Some(current)
                        }
                        _ => Some(verified),
                    };
                }
                Err(err) => {
                    debug!(
                        scope = scope.as_str(),
                        cookie = %name,
                        reason = %err,
                        "Session candidate rejected"
                    );
                    last_err = err;
                }
            }
        }

        best.ok_or(last_err)
    }

    fn verify_candidate<'j>(
        &self,
        scope: Scope,
        pinned: Option<&Namespace>,
        candidate: Candidate<'j>,
        now: i64,
    ) -> Result<Verified<'j>, AuthError> {
        let claims = self.codec.verify_at(candidate.token, now)?;

        if !scope.admits(claims.role) {
            return Err(AuthError::RoleMismatch);
        }

        // Globals are shared by every namespace; one issued for another is not ours.
        if let (Some(ns), Some(claim_ns)) = (pinned, claims.ns.as_deref()) {
            if CookieKind::GLOBAL.contains(&candidate.kind) && claim_ns != ns.as_str() {
                return Err(AuthError::InvalidToken(format!(
                    "session belongs to namespace {claim_ns}"
                )));
            }
        }

        Ok(Verified { candidate, claims })
    }

    async fn enrich(
        &self,
        scope: Scope,
        claims: SessionClaims,
    ) -> Result<EnrichedClaims, AuthError> {
        if scope != Scope::Admin {
            return Ok(EnrichedClaims {
                claims,
                admin: None,
            });
        }

        let role_id = claims
            .role_id
            .or_else(|| claims.role.role_id())
            .ok_or(AuthError::RoleMismatch)?;
        let service_ids = self
            .grants
            .service_ids(claims.sub)
            .await
            .map_err(|err| AuthError::VerifyFailure(format!("{err:#}")))?;

        Ok(EnrichedClaims {
            claims,
            admin: Some(AdminEnrichment {
                role_id,
                service_ids,
            }),
        })
    }
}

fn pinned_candidates<'j>(scope: Scope, ns: &Namespace, jar: &'j CookieJar) -> Vec<Candidate<'j>> {
    CookieKind::NAMESPACED
        .into_iter()
        .filter_map(|kind| {
            let name = session_cookie_name(scope, kind, Some(ns))?;
            let token = jar.get(&name)?;
            Some(Candidate {
                name,
                kind,
                ns: Some(ns.clone()),
                token,
            })
        })
        .collect()
}

fn global_candidates(scope: Scope, jar: &CookieJar) -> Vec<Candidate<'_>> {
    CookieKind::GLOBAL
        .into_iter()
        .filter_map(|kind| {
            let name = session_cookie_name(scope, kind, None)?;
            let token = jar.get(&name)?;
            Some(Candidate {
                name,
                kind,
                ns: None,
                token,
            })
        })
        .collect()
}

/// Every namespaced session cookie of `scope`; the first of duplicate names wins.
fn namespaced_candidates(scope: Scope, jar: &CookieJar) -> Vec<Candidate<'_>> {
    let mut candidates: Vec<Candidate<'_>> = Vec::new();
    for (name, token) in jar.iter() {
        let Some((kind, ns)) = classify_cookie(scope, name) else {
            continue;
        };
        if !CookieKind::NAMESPACED.contains(&kind)
            || candidates.iter().any(|existing| existing.name == name)
        {
            continue;
        }
        candidates.push(Candidate {
            name: name.to_string(),
            kind,
            ns,
            token,
        });
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::{
        storage::MemoryGrantStore,
        token::NewSession,
    };

    const NOW: i64 = 1_750_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"resolver-secret", 10)
    }

    fn token(role: Role, sub: i64, ns: Option<&str>, iat: i64, ttl: i64) -> String {
        codec()
            .sign(
                &NewSession {
                    sub,
                    role,
                    name: format!("person-{sub}"),
                    ns: ns.map(ToString::to_string),
                    role_id: None,
                },
                ttl,
                iat,
            )
            .unwrap_or_default()
    }

    fn ns(value: &str) -> Namespace {
        Namespace::parse(value).unwrap_or_else(|| panic!("bad namespace {value}"))
    }

    async fn resolve(
        grants: &MemoryGrantStore,
        scope: Scope,
        explicit: Option<&str>,
        cookies: &str,
    ) -> ResolvedSession {
        let codec = codec();
        let explicit = explicit.map(ns);
        SessionResolver::new(&codec, grants)
            .resolve(scope, explicit.as_ref(), &CookieJar::parse(cookies), NOW)
            .await
    }

    fn sub_of(session: &ResolvedSession) -> Option<i64> {
        session.payload.as_ref().map(|payload| payload.claims.sub)
    }

    #[tokio::test]
    async fn explicit_namespace_selects_its_cookie() {
        let grants = MemoryGrantStore::default();
        let cookies = format!(
            "user_session__tab01={}; user_session__tab02={}",
            token(Role::User, 1, Some("tab01"), NOW, 60),
            token(Role::User, 2, Some("tab02"), NOW, 600),
        );
        let session = resolve(&grants, Scope::User, Some("tab01"), &cookies).await;
        assert!(session.has_token);
        assert_eq!(sub_of(&session), Some(1));
        assert_eq!(session.cookie_name.as_deref(), Some("user_session__tab01"));
        assert_eq!(session.ns.as_deref(), Some("tab01"));
    }

    #[tokio::test]
    async fn pinned_namespace_never_leaks_another() {
        let grants = MemoryGrantStore::default();
        let cookies = format!(
            "user_session__tab02={}",
            token(Role::User, 2, Some("tab02"), NOW, 600)
        );
        let session = resolve(&grants, Scope::User, Some("tab01"), &cookies).await;
        assert!(!session.has_token);
        assert_eq!(session.payload, None);
        assert_eq!(session.cookie_name, None);
        assert_eq!(session.ns.as_deref(), Some("tab01"));
    }

    #[tokio::test]
    async fn sticky_cookie_pins_like_explicit() {
        let grants = MemoryGrantStore::default();
        let cookies = format!(
            "current_user_ns=tab01; user_session__tab02={}",
            token(Role::User, 2, Some("tab02"), NOW, 600)
        );
        let session = resolve(&grants, Scope::User, None, &cookies).await;
        assert!(!session.has_token);
        assert_eq!(session.ns.as_deref(), Some("tab01"));

        let cookies = format!(
            "current_user_ns=tab02; user_session__tab02={}",
            token(Role::User, 2, Some("tab02"), NOW, 600)
        );
        let session = resolve(&grants, Scope::User, None, &cookies).await;
        assert_eq!(sub_of(&session), Some(2));
    }

    #[tokio::test]
    async fn dashed_variant_satisfies_pinned_namespace() {
        let grants = MemoryGrantStore::default();
        let cookies = format!(
            "admin_session-adm01={}",
            token(Role::SuperAdmin, 5, Some("adm01"), NOW, 60)
        );
        let session = resolve(&grants, Scope::Admin, Some("adm01"), &cookies).await;
        assert!(session.has_token);
        assert_eq!(session.cookie_name.as_deref(), Some("admin_session-adm01"));
    }

    #[tokio::test]
    async fn without_hint_latest_expiry_wins() {
        let grants = MemoryGrantStore::default();
        let cookies = format!(
            "user_session__aaa={}; user_session__bbb={}",
            token(Role::User, 1, Some("aaa"), NOW, 600),
            token(Role::User, 2, Some("bbb"), NOW, 60),
        );
        let session = resolve(&grants, Scope::User, None, &cookies).await;
        assert_eq!(sub_of(&session), Some(1));
        assert_eq!(session.ns.as_deref(), Some("aaa"));
    }

    #[tokio::test]
    async fn equal_expiry_prefers_later_issue() {
        let grants = MemoryGrantStore::default();
        // Same exp, later iat.
        let cookies = format!(
            "user_session__aaa={}; user_session__bbb={}",
            token(Role::User, 1, Some("aaa"), NOW - 100, 700),
            token(Role::User, 2, Some("bbb"), NOW - 50, 650),
        );
        let session = resolve(&grants, Scope::User, None, &cookies).await;
        assert_eq!(sub_of(&session), Some(2));
    }

    #[tokio::test]
    async fn invalid_newest_falls_back_to_older_valid() {
        let grants = MemoryGrantStore::default();
        let cookies = format!(
            "user_session__aaa=not-a-token; user_session__bbb={}; user_session__ccc={}",
            token(Role::User, 2, Some("bbb"), NOW, 60),
            token(Role::User, 3, Some("ccc"), NOW - 10_000, 60),
        );
        let session = resolve(&grants, Scope::User, None, &cookies).await;
        assert_eq!(sub_of(&session), Some(2));
    }

    #[tokio::test]
    async fn legacy_global_used_without_namespaced_sessions() {
        let grants = MemoryGrantStore::default();
        let cookies = format!("user_session={}", token(Role::User, 9, None, NOW, 60));
        let session = resolve(&grants, Scope::User, None, &cookies).await;
        assert_eq!(sub_of(&session), Some(9));
        assert_eq!(session.cookie_name.as_deref(), Some("user_session"));
        assert_eq!(session.ns, None);
    }

    #[tokio::test]
    async fn legacy_global_for_other_namespace_is_not_accepted() {
        let grants = MemoryGrantStore::default();
        let cookies = format!(
            "user_session={}",
            token(Role::User, 9, Some("tab02"), NOW, 60)
        );
        let session = resolve(&grants, Scope::User, Some("tab01"), &cookies).await;
        assert!(!session.has_token);

        let cookies = format!("token={}", token(Role::User, 9, None, NOW, 60));
        let session = resolve(&grants, Scope::User, Some("tab01"), &cookies).await;
        assert_eq!(sub_of(&session), Some(9));
        assert_eq!(session.ns.as_deref(), Some("tab01"));
    }

    #[tokio::test]
    async fn admin_scope_rejects_user_role() {
        let grants = MemoryGrantStore::default();
        let cookies = format!(
            "admin_session__adm01={}",
            token(Role::User, 4, Some("adm01"), NOW, 60)
        );
        let session = resolve(&grants, Scope::Admin, Some("adm01"), &cookies).await;
        assert!(!session.has_token);
        assert_eq!(grants.lookups(), 0);
    }

    #[tokio::test]
    async fn expired_session_is_unauthenticated() {
        let grants = MemoryGrantStore::default();
        let cookies = format!(
            "user_session__tab01={}",
            token(Role::User, 1, Some("tab01"), NOW - 100, 60)
        );
        let session = resolve(&grants, Scope::User, Some("tab01"), &cookies).await;
        assert!(!session.has_token);
    }

    #[tokio::test]
    async fn admin_sessions_are_enriched_once() {
        let grants = MemoryGrantStore::with_grants([(5, vec![3, 8])]);
        let cookies = format!(
            "admin_session__adm01={}; admin_session__adm02={}",
            token(Role::AdminFitur, 5, Some("adm01"), NOW, 600),
            token(Role::AdminFitur, 6, Some("adm02"), NOW, 60),
        );
        let session = resolve(&grants, Scope::Admin, None, &cookies).await;
        assert_eq!(grants.lookups(), 1);

        let payload = session.payload.unwrap_or_else(|| panic!("expected payload"));
        assert_eq!(
            payload.admin,
            Some(AdminEnrichment {
                role_id: 2,
                service_ids: vec![3, 8],
            })
        );
        assert!(payload.can_administer(8));
        assert!(!payload.can_administer(4));
    }

    #[tokio::test]
    async fn super_admin_administers_everything() {
        let grants = MemoryGrantStore::default();
        let cookies = format!(
            "admin_session__adm01={}",
            token(Role::SuperAdmin, 1, Some("adm01"), NOW, 60)
        );
        let session = resolve(&grants, Scope::Admin, Some("adm01"), &cookies).await;
        let payload = session.payload.unwrap_or_else(|| panic!("expected payload"));
        assert_eq!(payload.admin.as_ref().map(|admin| admin.role_id), Some(1));
        assert!(payload.can_administer(42));
    }

    #[tokio::test]
    async fn grant_lookup_failure_is_unauthenticated() {
        let grants = MemoryGrantStore::failing();
        let cookies = format!(
            "admin_session__adm01={}",
            token(Role::SuperAdmin, 1, Some("adm01"), NOW, 60)
        );
        let session = resolve(&grants, Scope::Admin, Some("adm01"), &cookies).await;
        assert!(!session.has_token);
        assert_eq!(session.ns.as_deref(), Some("adm01"));
        assert_eq!(grants.lookups(), 1);
    }

    #[tokio::test]
    async fn user_scope_skips_grant_lookup() {
        let grants = MemoryGrantStore::failing();
        let cookies = format!("token={}", token(Role::SuperAdmin, 1, None, NOW, 60));
        let session = resolve(&grants, Scope::User, None, &cookies).await;
        assert!(session.has_token);
        assert_eq!(grants.lookups(), 0);
    }

    #[test]
    fn resolved_session_serializes_camel_case() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(ResolvedSession::unauthenticated(Some(&ns("tab01"))))?;
        assert_eq!(
            value,
            serde_json::json!({
                "hasToken": false,
                "payload": null,
                "cookieName": null,
                "ns": "tab01",
            })
        );
        Ok(())
    }
}
