use reqctl_shared::{error::ErrorBody, roles::Role};
use thiserror::Error;

use crate::auth::Redirect;

pub const SERVER_ERROR: &str = "SERVER_ERROR";
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";

/// Which list failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTarget {
    Organizations,
    Requests,
}

impl FetchTarget {
    fn label(&self) -> &'static str {
        match self {
            FetchTarget::Organizations => "organizations",
            FetchTarget::Requests => "membership requests",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to load {}: {reason}", .target.label())]
pub struct FetchError {
    pub target: FetchTarget,
    pub reason: String,
}

impl FetchError {
    pub fn new(target: FetchTarget, reason: impl Into<String>) -> Self {
        Self {
            target,
            reason: reason.into(),
        }
    }
}

/// Failure of an accept/reject call, as `{code, message}`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ActionError {
    pub code: String,
    pub message: String,
}

impl ActionError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(NETWORK_ERROR, message)
    }

    /// Builds the error for a non-success status, preferring the service's
    /// structured body when it parses.
    pub fn from_status(status: u16, body: &str) -> Self {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            return Self::new(parsed.code, parsed.message);
        }
        let code = if status >= 500 {
            SERVER_ERROR.to_string()
        } else {
            format!("HTTP_{status}")
        };
        let message = if body.trim().is_empty() {
            format!("request failed with status {status}")
        } else {
            body.trim().to_string()
        };
        Self::new(code, message)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Role {role} may not review membership requests")]
pub struct AuthorizationError {
    pub role: Role,
    pub redirect: Redirect,
}
