use super::money::Amount;
use super::student::StudentId;
use crate::error::FeeError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Overdue,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    BankTransfer,
    MobileMoney,
    Cheque,
    Card,
    Other,
}

impl FromStr for PaymentMethod {
    type Err = FeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "bank_transfer" | "bank" => Ok(PaymentMethod::BankTransfer),
            "mobile_money" | "mobile" => Ok(PaymentMethod::MobileMoney),
            "cheque" | "check" => Ok(PaymentMethod::Cheque),
            "card" => Ok(PaymentMethod::Card),
            "other" => Ok(PaymentMethod::Other),
            other => Err(FeeError::Validation(format!(
                "Unknown payment method '{other}'"
            ))),
        }
    }
}

/// A persisted ledger entry. Append-only: never mutated once written.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct PaymentRecord {
    pub id: String,
    pub student_id: StudentId,
    /// Free-text fee name the payment was made against.
    pub billing_type: String,
    pub amount: Amount,
    pub timestamp: DateTime<Utc>,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub reference: String,
}

/// Raw submission as it arrives from a form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentInput {
    pub student_id: String,
    pub amount: Decimal,
    pub billing_type: String,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub description: Option<String>,
    /// Client-generated token; repeated submissions with the same token
    /// resolve to the first recorded payment.
    pub idempotency_key: Option<String>,
}

/// A submission that passed validation and is ready for the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub student_id: StudentId,
    pub amount: Amount,
    pub billing_type: String,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub description: Option<String>,
}

impl PaymentInput {
    pub fn validate(&self) -> Result<NewPayment, FeeError> {
        let student_id = self.student_id.trim();
        if student_id.is_empty() {
            return Err(FeeError::Validation("Student id is required".to_string()));
        }
        let billing_type = self.billing_type.trim();
        if billing_type.is_empty() {
            return Err(FeeError::Validation("Billing type is required".to_string()));
        }
        let amount = Amount::new(self.amount)?;

        Ok(NewPayment {
            student_id: student_id.to_string(),
            amount,
            billing_type: billing_type.to_string(),
            method: self.method,
            reference: non_blank(&self.reference),
            description: non_blank(&self.description),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
