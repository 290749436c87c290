use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::dto::UpdateUserRequest;

/// User roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// User document as stored in the collection.
///
/// Serialization here is the BSON storage format; API responses never use it
/// directly and go through `PublicUser` instead, which has no hash field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid, // stored as a string
    pub email: String,    // unique, lowercased
    pub username: String, // unique
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn new(email: String, username: String, password_hash: String, role: Role) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            email,
            username,
            password_hash,
            first_name: None,
            last_name: None,
            role,
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update. Absent fields are left untouched; the password
    /// hash must already be computed by the caller.
    pub fn apply_update(&mut self, input: UpdateUserRequest, password_hash: Option<String>) {
        if let Some(email) = input.email {
            self.email = email;
        }
        if let Some(username) = input.username {
            self.username = username;
        }
        if let Some(hash) = password_hash {
            self.password_hash = hash;
        }
        if let Some(first_name) = input.first_name {
            self.first_name = Some(first_name);
        }
        if let Some(last_name) = input.last_name {
            self.last_name = Some(last_name);
        }
        if let Some(role) = input.role {
            self.role = role;
        }
        if let Some(image) = input.image {
            self.image = Some(image);
        }
        self.updated_at = OffsetDateTime::now_utc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_and_displays() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn apply_update_leaves_absent_fields_untouched() {
        let mut user = User::new(
            "jane@example.com".into(),
            "jane".into(),
            "old-hash".into(),
            Role::User,
        );
        user.first_name = Some("Jane".into());

        user.apply_update(
            UpdateUserRequest {
                last_name: Some("Doe".into()),
                ..Default::default()
            },
            None,
        );

        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.first_name.as_deref(), Some("Jane"));
        assert_eq!(user.last_name.as_deref(), Some("Doe"));
        assert_eq!(user.password_hash, "old-hash");
    }

    #[test]
    fn apply_update_replaces_password_hash_when_given() {
        let mut user = User::new(
            "jane@example.com".into(),
            "jane".into(),
            "old-hash".into(),
            Role::User,
        );
        user.apply_update(UpdateUserRequest::default(), Some("new-hash".into()));
        assert_eq!(user.password_hash, "new-hash");
    }
}
