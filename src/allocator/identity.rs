//! User labels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The label a user's credential carries on its backend.
///
/// Built as `first_last_id`; the same three inputs always give the same label,
/// which is what makes repeat allocations find the existing credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserLabel(String);

impl UserLabel {
    /// Derive a label from platform identity fields. A missing last name
    /// renders as an empty segment.
    pub fn from_identity(first_name: &str, last_name: Option<&str>, user_id: i64) -> Self {
        Self(format!("{}_{}_{}", first_name, last_name.unwrap_or(""), user_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
