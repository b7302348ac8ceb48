use super::billing::{BillingItem, ClassId};
use super::money::Money;
use super::payment::{PaymentRecord, PaymentStatus};
use super::residence::{Advisory, FilteredFees};
use super::student::{ResidenceType, StudentId};
use serde::{Deserialize, Serialize};
use crate::error::FeeError;
use std::collections::HashMap;

/// The residence-filtered fee structure of a class.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct FeeStructureSnapshot {
    pub class_id: ClassId,
    /// Residence the items were filtered for.
    pub residence: ResidenceType,
    pub items: Vec<BillingItem>,
    pub total: Money,
}

impl FeeStructureSnapshot {
    pub fn from_filtered(class_id: impl Into<ClassId>, filtered: FilteredFees) -> Self {
        Self {
            class_id: class_id.into(),
            residence: filtered.residence,
            items: filtered.items,
            total: filtered.total,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct BreakdownLine {
    pub billing_type: String,
    pub required: Money,
    pub paid: Money,
    pub remaining: Money,
}

/// Required vs. paid vs. remaining for one student.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct PaymentSummary {
    pub student_id: StudentId,
    pub class_id: ClassId,
    pub residence: ResidenceType,
    pub total_required: Money,
    /// Attributed plus unattributed paid amounts.
    pub total_paid: Money,
    pub balance: Money,
    pub breakdown: Vec<BreakdownLine>,
    pub unattributed_paid: Money,
    pub pending_count: usize,
    pub overdue_count: usize,
    pub advisories: Vec<Advisory>,
}

impl PaymentSummary {
    /// Amount paid beyond what is required.
    pub fn credit(&self) -> Money {
        self.total_paid.saturating_sub(self.total_required)
    }

    pub fn line(&self, billing_type: &str) -> Option<&BreakdownLine> {
        let key = normalize_billing_key(billing_type);
        self.breakdown
            .iter()
            .find(|line| normalize_billing_key(&line.billing_type) == key)
    }

    pub fn with_advisory(mut self, advisory: Option<Advisory>) -> Self {
        if let Some(advisory) = advisory
            && !self.advisories.contains(&advisory)
        {
            self.advisories.push(advisory);
        }
        self
    }
}

/// Key used to match ledger entries to catalog items.
pub fn normalize_billing_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Matches a student's payments against a fee snapshot.
///
/// Only `paid` records count. Payments whose billing type matches no item are
/// kept as unattributed. When several items share a normalized name, matching
/// payments fill them in catalog order and the excess lands on the last one.
/// Totals that overflow a `Decimal` are a validation error.
pub fn reconcile(
    student_id: &str,
    snapshot: &FeeStructureSnapshot,
    payments: &[PaymentRecord],
) -> Result<PaymentSummary, FeeError> {
    let mut paid_by_key: HashMap<String, Money> = HashMap::new();
    let mut pending_count = 0;
    let mut overdue_count = 0;

    for payment in payments {
        match payment.status {
            PaymentStatus::Paid => {
                let pool = paid_by_key
                    .entry(normalize_billing_key(&payment.billing_type))
                    .or_default();
                *pool = pool.checked_add(Money::from(payment.amount))?;
            }
            PaymentStatus::Pending => pending_count += 1,
            PaymentStatus::Overdue => overdue_count += 1,
        }
    }

    let keys: Vec<String> = snapshot
        .items
        .iter()
        .map(|item| normalize_billing_key(&item.name))
        .collect();

    let mut breakdown = Vec::with_capacity(snapshot.items.len());
    for (index, item) in snapshot.items.iter().enumerate() {
        let key = &keys[index];
        let is_last_with_key = !keys[index + 1..].contains(key);
        let available = paid_by_key.get(key).copied().unwrap_or(Money::ZERO);

        let paid = if is_last_with_key {
            available
        } else {
            available.min(item.amount)
        };
        if let Some(pool) = paid_by_key.get_mut(key) {
            *pool = pool.saturating_sub(paid);
        }

        breakdown.push(BreakdownLine {
            billing_type: item.name.clone(),
            required: item.amount,
            paid,
            remaining: item.amount.saturating_sub(paid),
        });
    }

    // Whatever is left in the pools matched no catalog item.
    let unattributed_paid = Money::try_sum(
        paid_by_key
            .iter()
            .filter(|(key, _)| !keys.contains(key))
            .map(|(_, amount)| *amount),
    )?;

    let total_required = Money::try_sum(snapshot.items.iter().map(|item| item.amount))?;
    let attributed = Money::try_sum(breakdown.iter().map(|line| line.paid))?;
    let total_paid = attributed.checked_add(unattributed_paid)?;

    Ok(PaymentSummary {
        student_id: student_id.to_string(),
        class_id: snapshot.class_id.clone(),
        residence: snapshot.residence,
        total_required,
        total_paid,
        balance: total_required.saturating_sub(total_paid),
        breakdown,
        unattributed_paid,
        pending_count,
        overdue_count,
        advisories: Vec::new(),
    })
}
