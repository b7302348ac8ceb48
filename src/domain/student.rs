use super::billing::ClassId;
use crate::error::FeeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type StudentId = String;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResidenceType {
    #[default]
    Day,
    Boarding,
}

impl FromStr for ResidenceType {
    type Err = FeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(ResidenceType::Day),
            "boarding" => Ok(ResidenceType::Boarding),
            other => Err(FeeError::Validation(format!(
                "Unknown residence type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ResidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResidenceType::Day => f.write_str("day"),
            ResidenceType::Boarding => f.write_str("boarding"),
        }
    }
}

/// The slice of a student record the fee engine reads.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Student {
    pub id: StudentId,
    pub class_id: ClassId,
    /// `None` when the directory never classified the student.
    pub residence_type: Option<ResidenceType>,
}
