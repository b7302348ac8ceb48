use super::billing::BillingItem;
use super::payment::{NewPayment, PaymentRecord};
use super::student::Student;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Read access to the external billing catalog.
#[async_trait]
pub trait BillingCatalog: Send + Sync {
    /// Items configured for a class, or `None` for an unknown class.
    async fn items_for_class(&self, class_id: &str) -> Result<Option<Vec<BillingItem>>>;
}

#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn get_student(&self, student_id: &str) -> Result<Option<Student>>;
}

/// The append-only payment ledger.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    async fn payments_for(&self, student_id: &str) -> Result<Vec<PaymentRecord>>;

    /// Persists a payment. Issues a receipt reference when none was supplied.
    async fn record(&self, payment: NewPayment) -> Result<PaymentRecord>;
}

pub type BillingCatalogRef = Arc<dyn BillingCatalog>;
pub type StudentDirectoryRef = Arc<dyn StudentDirectory>;
pub type PaymentLedgerRef = Arc<dyn PaymentLedger>;
