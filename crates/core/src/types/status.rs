//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Newsletter subscription state for one email address.
///
/// ```text
/// NoRecord --issue--> CodeIssued --verify--> Verified
///                      ^    |                   |
///                      +----+ resend            |
///                      +------------------------+ issue (resets verification)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No subscriber record exists for the address.
    #[default]
    NoRecord,
    /// A code has been issued and not yet verified.
    CodeIssued,
    /// The address has been verified.
    Verified,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRecord => write!(f, "no_record"),
            Self::CodeIssued => write!(f, "code_issued"),
            Self::Verified => write!(f, "verified"),
        }
    }
}
