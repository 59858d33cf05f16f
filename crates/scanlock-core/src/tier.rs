//! License tiers and their entitlement table.
//!
//! The tier table is static and process-wide; an issued license copies its
//! limits at creation time, so later edits here never retroactively change
//! existing licenses.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// License tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Trial,
    Basic,
    Premium,
    Enterprise,
}

/// Static configuration for a tier.
#[derive(Debug, Clone, Copy)]
pub struct TierConfig {
    /// License validity in days.
    pub duration_days: i64,
    /// Scan quota for the lifetime of the license. `None` means unbounded.
    pub scan_limit: Option<u64>,
    /// Capability strings granted by this tier.
    pub features: &'static [&'static str],
}

impl Tier {
    /// Look up the entitlement configuration for this tier.
    pub fn config(&self) -> TierConfig {
        match self {
            Tier::Trial => TierConfig {
                duration_days: 30,
                scan_limit: Some(100),
                features: &["basic_scan", "history"],
            },
            Tier::Basic => TierConfig {
                duration_days: 180,
                scan_limit: Some(1000),
                features: &["basic_scan", "history", "export"],
            },
            Tier::Premium => TierConfig {
                duration_days: 365,
                scan_limit: Some(10_000),
                features: &["basic_scan", "history", "export", "bulk_scan", "analytics"],
            },
            Tier::Enterprise => TierConfig {
                duration_days: 365,
                scan_limit: None,
                features: &[
                    "basic_scan",
                    "history",
                    "export",
                    "bulk_scan",
                    "analytics",
                    "api_access",
                    "priority_support",
                ],
            },
        }
    }

    /// Feature list as owned strings, as stored on an issued license.
    pub fn feature_list(&self) -> Vec<String> {
        self.config().features.iter().map(|f| f.to_string()).collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Trial => "TRIAL",
            Tier::Basic => "BASIC",
            Tier::Premium => "PREMIUM",
            Tier::Enterprise => "ENTERPRISE",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRIAL" => Ok(Tier::Trial),
            "BASIC" => Ok(Tier::Basic),
            "PREMIUM" => Ok(Tier::Premium),
            "ENTERPRISE" => Ok(Tier::Enterprise),
            other => Err(Error::UnknownTier(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_config() {
        let config = Tier::Trial.config();
        assert_eq!(config.duration_days, 30);
        assert_eq!(config.scan_limit, Some(100));
        assert_eq!(config.features, &["basic_scan", "history"]);
    }

    #[test]
    fn test_enterprise_is_unbounded() {
        assert_eq!(Tier::Enterprise.config().scan_limit, None);
    }

    #[test]
    fn test_tier_roundtrip() {
        for tier in [Tier::Trial, Tier::Basic, Tier::Premium, Tier::Enterprise] {
            let parsed: Tier = tier.as_str().parse().unwrap();
            assert_eq!(tier, parsed);
        }
    }

    #[test]
    fn test_unknown_tier_rejected() {
        let err = "GOLD".parse::<Tier>().unwrap_err();
        assert!(matches!(err, Error::UnknownTier(_)));
    }

    #[test]
    fn test_tier_serde_screaming_case() {
        let json = serde_json::to_string(&Tier::Premium).unwrap();
        assert_eq!(json, "\"PREMIUM\"");
    }
}
