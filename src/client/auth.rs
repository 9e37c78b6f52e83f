//! Administrative authorization for destructive operations.

use crate::{Error, Result};

/// Credential check for administrative operations. The comparison mechanism
/// (shared secret, HMAC, IAM) is a collaborator concern; the core only needs
/// the missing / wrong / valid distinction.
pub trait AdminAuth: Send + Sync {
    fn authorize(&self, credential: Option<&str>) -> Result<()>;
}

/// Shared-secret comparison.
pub struct SharedSecret {
    secret: String,
}

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl AdminAuth for SharedSecret {
    fn authorize(&self, credential: Option<&str>) -> Result<()> {
        match credential {
            None => Err(Error::Authentication {
                message: "admin credential required".into(),
            }),
            Some(c) if c.is_empty() => Err(Error::Authentication {
                message: "admin credential required".into(),
            }),
            Some(c) if c == self.secret => Ok(()),
            Some(_) => Err(Error::Authorization {
                message: "admin credential rejected".into(),
            }),
        }
    }
}

/// Deny-everything fallback used when no admin credential is configured.
pub struct DisabledAdmin;

impl AdminAuth for DisabledAdmin {
    fn authorize(&self, _: Option<&str>) -> Result<()> {
        Err(Error::Authentication {
            message: "administrative operations are not configured".into(),
        })
    }
}
