use std::fmt;

use serde::{Deserialize, Serialize};

/// A single action that can be performed on a document.
///
/// The three capabilities are independent: holding `Write` does not imply
/// `Read`, and none of them implies another. Each maps to its own boolean
/// on an explicit permission row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Write,
    Delete,
}

impl Capability {
    /// Converts a capability string to its enum value.
    pub fn parse(s: &str) -> Option<Capability> {
        match s {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
