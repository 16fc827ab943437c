//! Domain model shared by the token manager, the policy engine and the stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Immutable identifier of a principal (user).
///
/// The policy index is keyed by this value, never by the display name, so a
/// rename does not invalidate any grouping. Ids are 32-bit so every value fits
/// the signed integer a token carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub u32);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a role in the Policy Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub u64);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a permission in the Policy Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(pub u64);

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a resource or action name is not recognised.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Resource kinds a permission can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    User,
    Role,
    Permission,
    Product,
    Order,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::User,
        ResourceType::Role,
        ResourceType::Permission,
        ResourceType::Product,
        ResourceType::Order,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::User => "USER",
            ResourceType::Role => "ROLE",
            ResourceType::Permission => "PERMISSION",
            ResourceType::Product => "PRODUCT",
            ResourceType::Order => "ORDER",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "resource",
                value: s.to_string(),
            })
    }
}

/// Actions a permission can allow on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::Create,
        ActionType::Read,
        ActionType::Update,
        ActionType::Delete,
        ActionType::List,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Create => "CREATE",
            ActionType::Read => "READ",
            ActionType::Update => "UPDATE",
            ActionType::Delete => "DELETE",
            ActionType::List => "LIST",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "action",
                value: s.to_string(),
            })
    }
}

/// Public view of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub display_name: String,
}

/// A principal as stored by the Credential Store, including its password digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalRecord {
    pub id: PrincipalId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Opaque digest produced by a [`crate::SecretHasher`].
    #[serde(skip_serializing, default)]
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
}

impl PrincipalRecord {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            display_name: self.username.clone(),
        }
    }
}

/// Input for creating a principal.
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_digest: String,
}

/// A named collection of grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    /// Unique across the store; the policy index is keyed by it.
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// An allowed `(resource, action)` pair with administrative metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub resource: ResourceType,
    pub action: ActionType,
}

/// Input for creating a permission.
#[derive(Debug, Clone)]
pub struct NewPermission {
    pub name: String,
    pub description: String,
    pub resource: ResourceType,
    pub action: ActionType,
}
