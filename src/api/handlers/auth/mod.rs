//! Session tokens, namespaces and the resolver that ties them together.
//!
//! ## Sessions
//!
//! A session is an HS256 token in a cookie. One browser may hold several: one
//! per portal scope (`user`, `admin`) and per namespace, where a namespace is a
//! short id the portal pages put in `?ns=` to keep tabs apart. Legacy pages
//! still use the unnamespaced `{scope}_session` and bare `token` cookies.
//!
//! ## Namespace pinning
//!
//! Once a request names a namespace (explicitly or through the sticky
//! `current_{scope}_ns` cookie) only sessions of that namespace may answer it.
//! Picking the latest session across namespaces happens only when there is no
//! hint at all.
//!
//! ## Failure policy
//!
//! Bad, expired or missing tokens all mean "not logged in". A missing session
//! secret is the only hard error and surfaces as HTTP 500.

pub mod cookies;
pub mod error;
pub mod guard;
pub mod namespace;
pub mod resolver;
pub mod role;
pub mod session;
mod state;
pub mod storage;
pub mod token;

pub use error::AuthError;
pub use guard::{GuardDecision, RouteGuard, route_guard};
pub use resolver::{ResolvedSession, SessionResolver};
pub use state::{AuthConfig, AuthState};
pub use storage::{GrantStore, PgGrantStore};
