//! API request/response models for users.

use super::pagination::PageParams;
use super::validation::{self, MAX_TEXT_LENGTH};
use crate::db::models::users::UserDBResponse;
use crate::errors::Result;
use crate::types::{ROLE_ADMIN, ROLE_USER, RoleId, UserId, is_admin_role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// The authenticated caller, decoded from a Bearer access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub id: UserId,
    pub role: Option<RoleId>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        is_admin_role(self.role)
    }
}

/// User as exposed over the API. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    /// Role tier: 1 = admin, 2 = user
    pub role: RoleId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            name: db.name,
            role: db.role_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Admin request to create a user with an explicit role
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserCreate {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    /// Role tier, defaults to 2 (user)
    pub role: Option<RoleId>,
}

impl UserCreate {
    pub fn validate(self) -> Result<Self> {
        let role = self.role.unwrap_or(ROLE_USER);
        if role != ROLE_ADMIN && role != ROLE_USER {
            return Err(crate::errors::Error::validation("El rol debe ser 1 (admin) o 2 (usuario)"));
        }
        Ok(Self {
            email: validation::email("email", &self.email)?,
            password: self.password,
            name: validation::optional_text("name", self.name.as_deref(), MAX_TEXT_LENGTH)?,
            role: Some(role),
        })
    }
}

/// Profile update. Users may only update themselves unless they are admins.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    /// New password, re-hashed when present
    pub password: Option<String>,
}

impl UserUpdate {
    pub fn validate(self) -> Result<Self> {
        Ok(Self {
            id: validation::positive_id("id", self.id)?,
            email: validation::email("email", &self.email)?,
            name: validation::optional_text("name", self.name.as_deref(), MAX_TEXT_LENGTH)?,
            password: self.password,
        })
    }
}

/// Filters for the admin user search
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserSearchQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PageParams,

    pub email: Option<String>,
    pub name: Option<String>,
    /// Role tier
    pub role: Option<String>,
}

impl UserSearchQuery {
    pub fn role(&self) -> Result<Option<RoleId>> {
        self.role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| {
                r.parse::<RoleId>()
                    .map_err(|_| crate::errors::Error::validation("El rol debe ser un número entero"))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn test_user_response_drops_password_hash() {
        let now = Utc::now();
        let response = UserResponse::from(UserDBResponse {
            id: 5,
            email: "ana@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            name: Some("Ana".to_string()),
            role_id: 2,
            created_at: now,
            updated_at: now,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["id"], 5);
        assert_eq!(json["role"], 2);
        assert!(!json.to_string().contains("argon2"));
    }

    #[test]
    fn test_user_create_validation() {
        let create = UserCreate {
            email: "Admin@Example.com".to_string(),
            password: "password123".to_string(),
            name: None,
            role: None,
        }
        .validate()
        .unwrap();
        assert_eq!(create.email, "admin@example.com");
        assert_eq!(create.role, Some(ROLE_USER));

        let bad_role = UserCreate {
            email: "a@example.com".to_string(),
            password: "password123".to_string(),
            name: None,
            role: Some(7),
        };
        assert!(matches!(bad_role.validate(), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_search_role_parsing() {
        let query = UserSearchQuery {
            role: Some("1".to_string()),
            ..Default::default()
        };
        assert_eq!(query.role().unwrap(), Some(1));

        let query = UserSearchQuery {
            role: Some("admin".to_string()),
            ..Default::default()
        };
        assert!(query.role().is_err());
    }
}
