//! Identity database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::domain::{Identity, Role};
use crate::{Error, Result};

/// Identity database model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IdentityDbModel {
    pub id: String,
    pub display_name: String,
    /// STUDENT, TUTOR or ADMIN
    pub role: String,
}

impl From<&Identity> for IdentityDbModel {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            role: identity.role.to_string(),
        }
    }
}

impl TryFrom<IdentityDbModel> for Identity {
    type Error = Error;

    fn try_from(row: IdentityDbModel) -> Result<Self> {
        let role = Role::from_str(&row.role).map_err(|_| {
            Error::Other(format!("identity {} has unknown role '{}'", row.id, row.role))
        })?;
        Ok(Identity {
            id: row.id,
            display_name: row.display_name,
            role,
        })
    }
}
