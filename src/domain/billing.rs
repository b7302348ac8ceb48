use super::money::Money;
use crate::error::FeeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ClassId = String;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Termly,
    Monthly,
    Annual,
    OneTime,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Frequency::Termly => "termly",
            Frequency::Monthly => "monthly",
            Frequency::Annual => "annual",
            Frequency::OneTime => "one-time",
        })
    }
}

/// Which residence classification a billing item applies to.
///
/// Set explicitly at catalog ingestion. `Unspecified` marks legacy rows that
/// were never classified.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash, Default)]
#[serde(try_from = "String", into = "String")]
pub enum ResidenceScope {
    Day,
    Boarding,
    Both,
    #[default]
    Unspecified,
}

impl ResidenceScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResidenceScope::Day => "day",
            ResidenceScope::Boarding => "boarding",
            ResidenceScope::Both => "both",
            ResidenceScope::Unspecified => "unspecified",
        }
    }
}

impl FromStr for ResidenceScope {
    type Err = FeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(ResidenceScope::Day),
            "boarding" => Ok(ResidenceScope::Boarding),
            "both" => Ok(ResidenceScope::Both),
            "" | "unspecified" => Ok(ResidenceScope::Unspecified),
            other => Err(FeeError::Validation(format!(
                "Unknown residence scope '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for ResidenceScope {
    type Error = FeeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResidenceScope> for String {
    fn from(scope: ResidenceScope) -> Self {
        scope.as_str().to_string()
    }
}

impl fmt::Display for ResidenceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single priced fee category in a class catalog.
///
/// Owned by the external catalog service; the engine treats each fetched
/// list as immutable.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct BillingItem {
    pub id: String,
    pub name: String,
    pub amount: Money,
    pub frequency: Frequency,
    pub class_id: ClassId,
    pub term: String,
    pub year: u16,
    #[serde(default)]
    pub residence_scope: ResidenceScope,
}

impl BillingItem {
    /// Checks the invariants the reconciliation math relies on.
    pub fn validate(&self) -> Result<(), FeeError> {
        if self.name.trim().is_empty() {
            return Err(FeeError::Validation(format!(
                "Billing item '{}' has an empty name",
                self.id
            )));
        }
        if self.class_id.trim().is_empty() {
            return Err(FeeError::Validation(format!(
                "Billing item '{}' has no class",
                self.id
            )));
        }
        Ok(())
    }
}
