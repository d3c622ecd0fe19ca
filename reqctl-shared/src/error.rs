use serde::{Deserialize, Serialize};

/// Structured error body returned by the membership service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
}
