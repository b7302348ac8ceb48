//! Selects the billing items that apply to a student's residence.
//!
//! Pure and order-preserving: the same items and residence always yield the
//! same filtered list in input order.

use super::billing::{BillingItem, ResidenceScope};
use super::money::Money;
use super::student::ResidenceType;
use crate::error::FeeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether boarding students also owe day-only items.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResidencePolicy {
    /// Boarding owes Day + Boarding + Both.
    #[default]
    Inclusive,
    /// Boarding owes Boarding + Both only.
    Exclusive,
}

/// Non-fatal conditions noticed while computing fees.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// Residence was absent and the day default was applied.
    AmbiguousResidence { assumed: ResidenceType },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::AmbiguousResidence { assumed } => {
                write!(f, "residence not recorded, assumed {assumed}")
            }
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct FilteredFees {
    pub residence: ResidenceType,
    pub items: Vec<BillingItem>,
    pub total: Money,
    pub advisory: Option<Advisory>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResidenceFilter {
    policy: ResidencePolicy,
    infer_unspecified: bool,
}

impl ResidenceFilter {
    pub fn new(policy: ResidencePolicy, infer_unspecified: bool) -> Self {
        Self {
            policy,
            infer_unspecified,
        }
    }

    /// Absent residence resolves to `Day`, with an advisory.
    pub fn resolve(residence: Option<ResidenceType>) -> (ResidenceType, Option<Advisory>) {
        match residence {
            Some(r) => (r, None),
            None => (
                ResidenceType::Day,
                Some(Advisory::AmbiguousResidence {
                    assumed: ResidenceType::Day,
                }),
            ),
        }
    }

    /// Fails only when the filtered total does not fit in a `Decimal`.
    pub fn apply(
        &self,
        items: &[BillingItem],
        residence: Option<ResidenceType>,
    ) -> Result<FilteredFees, FeeError> {
        let (resolved, advisory) = Self::resolve(residence);
        let items: Vec<BillingItem> = items
            .iter()
            .filter(|item| self.applies(item, resolved))
            .cloned()
            .collect();
        let total = Money::try_sum(items.iter().map(|item| item.amount))?;

        Ok(FilteredFees {
            residence: resolved,
            items,
            total,
            advisory,
        })
    }

    fn applies(&self, item: &BillingItem, residence: ResidenceType) -> bool {
        let scope = match item.residence_scope {
            ResidenceScope::Unspecified if self.infer_unspecified => {
                infer_scope_from_name(&item.name)
            }
            scope => scope,
        };

        match (scope, residence) {
            (ResidenceScope::Both | ResidenceScope::Unspecified, _) => true,
            (ResidenceScope::Day, ResidenceType::Day) => true,
            (ResidenceScope::Day, ResidenceType::Boarding) => {
                self.policy == ResidencePolicy::Inclusive
            }
            (ResidenceScope::Boarding, ResidenceType::Boarding) => true,
            (ResidenceScope::Boarding, ResidenceType::Day) => false,
        }
    }
}

const BOARDING_TOKENS: [&str; 3] = ["board", "hostel", "dorm"];

/// Migration aid for catalog rows that predate explicit scopes.
///
/// Names mentioning boarding are treated as boarding-only, everything else
/// applies to both.
pub fn infer_scope_from_name(name: &str) -> ResidenceScope {
    let name = name.to_lowercase();
    if BOARDING_TOKENS.iter().any(|token| name.contains(token)) {
        ResidenceScope::Boarding
    } else {
        ResidenceScope::Both
    }
}
