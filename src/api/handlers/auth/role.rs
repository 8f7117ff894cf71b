//! Portal roles and the session scopes they map to.
//!
//! Role strings in tokens come from several generations of the login pages,
//! so they are folded before matching: case, surrounding whitespace and the
//! `-`/`_`/space separators are ignored (`super-admin`, `SuperAdmin` and
//! `super_admin` are the same role).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use utoipa::ToSchema;

pub const SUPER_ADMIN_ROLE_ID: u8 = 1;
pub const ADMIN_FITUR_ROLE_ID: u8 = 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Role {
    User,
    /// Feature admin, limited to the services granted in `admin_services`.
    AdminFitur,
    /// Unscoped admin.
    SuperAdmin,
}

impl Role {
    /// Fold a raw role string into a known role.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        let folded: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "user" => Some(Self::User),
            "adminfitur" | "featureadmin" | "admin" => Some(Self::AdminFitur),
            "superadmin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::AdminFitur => "admin_fitur",
            Self::SuperAdmin => "super_admin",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::AdminFitur | Self::SuperAdmin)
    }

    /// Numeric role id used by the admin portal (`super_admin=1`, `admin_fitur=2`).
    #[must_use]
    pub const fn role_id(self) -> Option<u8> {
        match self {
            Self::User => None,
            Self::AdminFitur => Some(ADMIN_FITUR_ROLE_ID),
            Self::SuperAdmin => Some(SUPER_ADMIN_ROLE_ID),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::normalize(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown role: {raw}")))
    }
}

/// Session family a resolution targets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    User,
    Admin,
}

impl Scope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Whether a claim with `role` may back a session in this scope.
    #[must_use]
    pub const fn admits(self, role: Role) -> bool {
        match self {
            Self::User => true,
            Self::Admin => role.is_admin(),
        }
    }
}

/// Scope selector accepted by `/api/me` and `/api/logout`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScopeQuery {
    User,
    Admin,
    #[default]
    Both,
}

impl ScopeQuery {
    /// Unknown or missing values select both scopes.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("user") => Self::User,
            Some("admin") => Self::Admin,
            _ => Self::Both,
        }
    }

    #[must_use]
    pub fn scopes(self) -> &'static [Scope] {
        match self {
            Self::User => &[Scope::User],
            Self::Admin => &[Scope::Admin],
            Self::Both => &[Scope::User, Scope::Admin],
        }
    }
}
