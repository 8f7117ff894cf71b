//! Auth configuration and the shared per-process auth state.
//!
//! Everything the codec, resolver and guard need is passed in explicitly
//! through [`AuthConfig`]; nothing is read from ambient globals.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::error;

use super::{error::AuthError, storage::GrantStore, token::TokenCodec};

const DEFAULT_CLOCK_TOLERANCE_SECONDS: i64 = 10;
const DEFAULT_USER_LOGIN_PATH: &str = "/Login/hal-login";
const DEFAULT_ADMIN_LOGIN_PATH: &str = "/Signin/hal-signAdmin";
const DEFAULT_ADMIN_PREFIX: &str = "/Admin";
const DEFAULT_PUBLIC_PATHS: &[&str] = &["/", "/favicon.ico", "/robots.txt", "/health"];
const DEFAULT_PUBLIC_PREFIXES: &[&str] = &[
    "/api/",
    "/_next/",
    "/assets/",
    "/images/",
    "/Login/",
    "/Signin/",
];

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_secret: Option<SecretString>,
    clock_tolerance_seconds: i64,
    cookie_secure: bool,
    user_login_path: String,
    admin_login_path: String,
    admin_prefix: String,
    public_paths: Vec<String>,
    public_prefixes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_secret: None,
            clock_tolerance_seconds: DEFAULT_CLOCK_TOLERANCE_SECONDS,
            cookie_secure: false,
            user_login_path: DEFAULT_USER_LOGIN_PATH.to_string(),
            admin_login_path: DEFAULT_ADMIN_LOGIN_PATH.to_string(),
            admin_prefix: DEFAULT_ADMIN_PREFIX.to_string(),
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(ToString::to_string).collect(),
            public_prefixes: DEFAULT_PUBLIC_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Empty secrets are treated as missing.
    #[must_use]
    pub fn with_session_secret(mut self, secret: Option<SecretString>) -> Self {
        self.session_secret = secret.filter(|secret| !secret.expose_secret().trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_clock_tolerance_seconds(mut self, seconds: i64) -> Self {
        self.clock_tolerance_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_login_paths(mut self, user: String, admin: String) -> Self {
        self.user_login_path = user;
        self.admin_login_path = admin;
        self
    }

    #[must_use]
    pub fn session_secret(&self) -> Option<&SecretString> {
        self.session_secret.as_ref()
    }

    #[must_use]
    pub fn clock_tolerance_seconds(&self) -> i64 {
        self.clock_tolerance_seconds
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn user_login_path(&self) -> &str {
        &self.user_login_path
    }

    #[must_use]
    pub fn admin_login_path(&self) -> &str {
        &self.admin_login_path
    }

    #[must_use]
    pub fn admin_prefix(&self) -> &str {
        &self.admin_prefix
    }

    #[must_use]
    pub fn public_paths(&self) -> &[String] {
        &self.public_paths
    }

    #[must_use]
    pub fn public_prefixes(&self) -> &[String] {
        &self.public_prefixes
    }
}

pub struct AuthState {
    config: AuthConfig,
    codec: Option<TokenCodec>,
    grants: Arc<dyn GrantStore>,
}

impl AuthState {
    pub fn new(config: AuthConfig, grants: Arc<dyn GrantStore>) -> Self {
        let codec = TokenCodec::from_config(&config).ok();
        if codec.is_none() {
            error!("Session secret is not configured; authenticated endpoints will fail");
        }
        Self {
            config,
            codec,
            grants,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The token codec, or [`AuthError::NoSecret`] when the deployment has no secret.
    ///
    /// # Errors
    /// Returns `NoSecret` if no session secret was configured.
    pub fn codec(&self) -> Result<&TokenCodec, AuthError> {
        self.codec.as_ref().ok_or(AuthError::NoSecret)
    }

    #[must_use]
    pub fn grants(&self) -> &dyn GrantStore {
        self.grants.as_ref()
    }
}
