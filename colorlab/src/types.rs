//! Common type definitions shared across the crate.
//!
//! # ID Types
//!
//! All entities use `BIGSERIAL` primary keys, exposed as `i64` aliases so the JWT `sub` claim
//! can carry a user id as a plain integer:
//!
//! - [`UserId`]: User account identifier
//! - [`ClienteId`]: Customer identifier
//! - [`ColoracionId`]: Coloring formula identifier
//! - [`ReporteId`]: Service report identifier
//! - [`FotoReporteId`]: Report photo identifier
//!
//! # Roles
//!
//! Roles are integer tiers stored in the `roles` table. Only two exist: [`ROLE_ADMIN`] and
//! [`ROLE_USER`].

pub type UserId = i64;
pub type ClienteId = i64;
pub type ColoracionId = i64;
pub type ReporteId = i64;
pub type FotoReporteId = i64;
pub type RefreshTokenId = i64;
pub type RoleId = i32;

pub const ROLE_ADMIN: RoleId = 1;
pub const ROLE_USER: RoleId = 2;

/// Whether the given role tier grants administrative access.
pub fn is_admin_role(role: Option<RoleId>) -> bool {
    role == Some(ROLE_ADMIN)
}

/// Human readable name for a role tier, used in logs.
pub fn role_name(role: RoleId) -> &'static str {
    match role {
        ROLE_ADMIN => "admin",
        ROLE_USER => "user",
        _ => "unknown",
    }
}
