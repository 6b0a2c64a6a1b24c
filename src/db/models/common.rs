//! Common types shared across models.

use serde::{Deserialize, Serialize};

/// Generic success/failure envelope for endpoints that return a message
/// rather than a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Lifecycle state of a membership record.
///
/// Every member starts out `Pending` and is moved to `Active` or
/// `Rejected` by an explicit admin action. `Rejected` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Active,
    Rejected,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "active" | "approved" => Ok(Self::Active),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown membership status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            MembershipStatus::Pending,
            MembershipStatus::Active,
            MembershipStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<MembershipStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_status_accepts_approved_alias() {
        assert_eq!(
            "approved".parse::<MembershipStatus>(),
            Ok(MembershipStatus::Active)
        );
        assert!("banned".parse::<MembershipStatus>().is_err());
    }
}
