//! The sync strategy dimension an application configuration selects.

use std::fmt;
use std::str::FromStr;

/// Legal `syncStrategy` values, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStrategy {
    CareTeam,
    Organization,
    Location,
}

impl FromStr for SyncStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "careteam" => Ok(Self::CareTeam),
            "organization" => Ok(Self::Organization),
            "location" => Ok(Self::Location),
            other => Err(format!("unrecognized sync strategy: {other}")),
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStrategy::CareTeam => "CareTeam",
            SyncStrategy::Organization => "Organization",
            SyncStrategy::Location => "Location",
        };
        write!(f, "{s}")
    }
}
