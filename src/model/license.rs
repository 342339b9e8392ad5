use serde::{Deserialize, Serialize};

/// SPDX placeholder used when a package carries no license metadata.
pub const UNKNOWN_SPDX: &str = "UNKNOWN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Allowed,
    Warn,
    Blocked,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Allowed => "allowed",
            LicenseStatus::Warn => "warn",
            LicenseStatus::Blocked => "blocked",
        }
    }
}

impl std::str::FromStr for LicenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allowed" | "allow" => Ok(LicenseStatus::Allowed),
            "warn" | "warning" => Ok(LicenseStatus::Warn),
            "blocked" | "block" | "deny" => Ok(LicenseStatus::Blocked),
            _ => Err(format!(
                "Unknown license status: {}. Use 'allowed', 'warn', or 'blocked'",
                s
            )),
        }
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseFinding {
    pub package: String,
    pub spdx: String,
    pub status: LicenseStatus,
}
