//! # BI-ONE session gateway
//!
//! `bione` resolves who is signed in to the BI-ONE booking portals and decides
//! whether a page request may proceed. The portals allow several logical
//! sessions in one browser (for example an admin and a user side by side), so
//! every session cookie is scoped by a client-generated **namespace**.
//!
//! ## Sessions
//!
//! Sessions are stateless: the signed HS256 token in the cookie is the whole
//! session. The only server-side state consulted during resolution is the
//! `admin_services` table, read once per resolved admin to list the services a
//! feature admin (`admin_fitur`) may manage.
//!
//! ## Namespace pinning
//!
//! Once a caller names a namespace (query, body, referer, or the sticky
//! `current_{scope}_ns` cookie), resolution is scoped to it and never satisfied
//! by another namespace's cookie. Only a request with no namespace hint at all
//! picks the latest valid namespaced session.
//!
//! ## Failure policy
//!
//! Malformed, expired, or mismatched tokens all mean "unauthenticated": page
//! requests are redirected to the matching login page and `/api/me` reports
//! `hasToken: false`. A missing signing secret is the only hard failure and
//! answers `500`.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
