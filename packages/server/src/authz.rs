use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::error::AppError;
use crate::extractors::auth::AuthUser;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MODERATOR: &str = "moderator";
pub const ROLE_MEMBER: &str = "member";

/// Operations subject to a role check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Read,
    Create,
    Update,
    Delete,
    React,
}

impl Op {
    fn key(self) -> &'static str {
        match self {
            Op::Read => "read",
            Op::Create => "create",
            Op::Update => "update",
            Op::Delete => "delete",
            Op::React => "react",
        }
    }
}

/// Admit iff any principal role is in `required`. A missing principal always
/// fails; an empty `required` admits every authenticated caller.
pub fn check(roles: Option<&[String]>, required: &[String]) -> bool {
    let Some(roles) = roles else {
        return false;
    };
    required.is_empty() || roles.iter().any(|r| required.contains(r))
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("cannot read role policy: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid role policy: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Required roles per operation.
///
/// ```toml
/// read = []
/// create = ["admin", "moderator", "member"]
/// delete = ["admin"]
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct RolePolicy {
    #[serde(flatten)]
    required: HashMap<String, Vec<String>>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        let everyone = vec![
            ROLE_ADMIN.to_string(),
            ROLE_MODERATOR.to_string(),
            ROLE_MEMBER.to_string(),
        ];
        let staff = vec![ROLE_ADMIN.to_string(), ROLE_MODERATOR.to_string()];
        let required = HashMap::from([
            (Op::Read.key().to_string(), Vec::new()),
            (Op::Create.key().to_string(), everyone.clone()),
            (Op::Update.key().to_string(), everyone.clone()),
            (Op::React.key().to_string(), everyone),
            (Op::Delete.key().to_string(), staff),
        ]);
        Self { required }
    }
}

impl RolePolicy {
    /// Built-in defaults overlaid with the entries of a TOML file.
    pub fn load(path: Option<&Path>) -> Result<Self, PolicyError> {
        let mut policy = Self::default();
        if let Some(path) = path {
            let text = std::fs::read_to_string(path)?;
            policy.merge(Self::parse(&text)?);
        }
        Ok(policy)
    }

    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        Ok(toml::from_str(text)?)
    }

    fn merge(&mut self, other: RolePolicy) {
        self.required.extend(other.required);
    }

    pub fn required(&self, op: Op) -> &[String] {
        self.required
            .get(op.key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Role check against an optional principal.
    pub fn authorize(&self, user: Option<&AuthUser>, op: Op) -> Result<(), AppError> {
        let required = self.required(op);
        if check(user.map(|u| u.roles.as_slice()), required) {
            Ok(())
        } else if user.is_none() {
            Err(AppError::TokenMissing)
        } else {
            Err(AppError::PermissionDenied)
        }
    }
}

/// Owners may change their own rows; admins and moderators may change any.
pub fn require_owner_or_staff(
    user: &AuthUser,
    caller_id: i64,
    owner_id: i64,
) -> Result<(), AppError> {
    let staff = [ROLE_ADMIN.to_string(), ROLE_MODERATOR.to_string()];
    if caller_id == owner_id || check(Some(user.roles.as_slice()), &staff) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}
