use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Numeric value of the custom audit severity.
///
/// Sits above every standard level so a logger left at the default
/// `INFO` threshold never filters audit records out.
pub const AUDIT_LEVEL_NUM: u8 = 60;

/// Name written into the `level` field for audit records.
pub const AUDIT_LEVEL_NAME: &str = "AUDIT";

/// Severity used both for gating and for the `level` field of a record.
///
/// The number/name table is fixed at compile time; there is no runtime
/// registration path. [`Off`](Severity::Off) is a threshold only: nothing is
/// emitted at it, and a logger set to it writes nothing, audit included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
    Audit,
    Off,
}

/// Numeric value of the [`Off`](Severity::Off) threshold. Any number above
/// [`AUDIT_LEVEL_NUM`] parses to it.
pub const OFF_LEVEL_NUM: u8 = u8::MAX;

impl Severity {
    /// Every level a record can be emitted at.
    pub const ALL: [Severity; 6] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
        Severity::Audit,
    ];

    pub const fn number(self) -> u8 {
        match self {
            Severity::Debug => 10,
            Severity::Info => 20,
            Severity::Warning => 30,
            Severity::Error => 40,
            Severity::Critical => 50,
            Severity::Audit => AUDIT_LEVEL_NUM,
            Severity::Off => OFF_LEVEL_NUM,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Audit => AUDIT_LEVEL_NAME,
            Severity::Off => "OFF",
        }
    }

    /// Emission method name handed to processors (`"info"`, `"audit"`, ...).
    pub const fn method_name(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
            Severity::Audit => "audit",
            Severity::Off => "off",
        }
    }

    /// Look up a severity by its exact number.
    pub fn from_number(number: u8) -> Option<Severity> {
        if number == OFF_LEVEL_NUM {
            return Some(Severity::Off);
        }
        Severity::ALL.into_iter().find(|s| s.number() == number)
    }

    /// Threshold for a numeric level: an exact table entry, or `Off` for
    /// anything above `AUDIT`.
    pub fn threshold_from_number(number: u8) -> Option<Severity> {
        if number > AUDIT_LEVEL_NUM {
            return Some(Severity::Off);
        }
        Severity::from_number(number)
    }

    /// Whether a record at `self` passes a logger whose threshold is `threshold`.
    pub fn passes(self, threshold: Severity) -> bool {
        self != Severity::Off && self.number() >= threshold.number()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<u8>() {
            return Severity::threshold_from_number(number)
                .ok_or_else(|| ConfigError::InvalidLevel(s.to_string()));
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" => Ok(Severity::Critical),
            "AUDIT" => Ok(Severity::Audit),
            "OFF" => Ok(Severity::Off),
            _ => Err(ConfigError::InvalidLevel(s.to_string())),
        }
    }
}
