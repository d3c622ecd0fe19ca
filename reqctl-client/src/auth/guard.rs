use reqctl_shared::roles::Role;
use tracing::debug;

use crate::error::AuthorizationError;

/// Where a denied operator is sent instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    OrganizationList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied(Redirect),
}

/// Only superadmins may review membership requests.
pub fn check_access(role: Role) -> Access {
    if role.is_superadmin() {
        Access::Allowed
    } else {
        debug!("access denied for role {}", role);
        Access::Denied(Redirect::OrganizationList)
    }
}

pub fn require_superadmin(role: Role) -> Result<(), AuthorizationError> {
    match check_access(role) {
        Access::Allowed => Ok(()),
        Access::Denied(redirect) => Err(AuthorizationError { role, redirect }),
    }
}
