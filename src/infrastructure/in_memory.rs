use crate::domain::billing::{BillingItem, ClassId};
use crate::domain::payment::{NewPayment, PaymentRecord, PaymentStatus};
use crate::domain::ports::{BillingCatalog, PaymentLedger, StudentDirectory};
use crate::domain::student::{Student, StudentId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory billing catalog keyed by class.
///
/// Item order within a class is preserved as inserted.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    classes: Arc<RwLock<HashMap<ClassId, Vec<BillingItem>>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from a flat item list, grouping by class.
    pub fn from_items(items: impl IntoIterator<Item = BillingItem>) -> Self {
        let mut classes: HashMap<ClassId, Vec<BillingItem>> = HashMap::new();
        for item in items {
            classes.entry(item.class_id.clone()).or_default().push(item);
        }
        Self {
            classes: Arc::new(RwLock::new(classes)),
        }
    }

    pub async fn set_class(&self, class_id: &str, items: Vec<BillingItem>) {
        let mut classes = self.classes.write().await;
        classes.insert(class_id.to_string(), items);
    }
}

#[async_trait]
impl BillingCatalog for InMemoryCatalog {
    async fn items_for_class(&self, class_id: &str) -> Result<Option<Vec<BillingItem>>> {
        let classes = self.classes.read().await;
        Ok(classes.get(class_id).cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryStudentDirectory {
    students: Arc<RwLock<HashMap<StudentId, Student>>>,
}

impl InMemoryStudentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_students(students: impl IntoIterator<Item = Student>) -> Self {
        let students = students
            .into_iter()
            .map(|student| (student.id.clone(), student))
            .collect();
        Self {
            students: Arc::new(RwLock::new(students)),
        }
    }

    pub async fn upsert(&self, student: Student) {
        let mut students = self.students.write().await;
        students.insert(student.id.clone(), student);
    }
}

#[async_trait]
impl StudentDirectory for InMemoryStudentDirectory {
    async fn get_student(&self, student_id: &str) -> Result<Option<Student>> {
        let students = self.students.read().await;
        Ok(students.get(student_id).cloned())
    }
}

/// An append-only in-memory payment ledger.
///
/// Records are kept per student in arrival order. Missing references are
/// filled with a generated receipt number.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    payments: Arc<RwLock<HashMap<StudentId, Vec<PaymentRecord>>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = PaymentRecord>) -> Self {
        let mut payments: HashMap<StudentId, Vec<PaymentRecord>> = HashMap::new();
        for record in records {
            payments
                .entry(record.student_id.clone())
                .or_default()
                .push(record);
        }
        Self {
            payments: Arc::new(RwLock::new(payments)),
        }
    }
}

fn receipt_number(id: &Uuid) -> String {
    let simple = id.simple().to_string().to_uppercase();
    format!("RCP-{}", &simple[..10])
}

#[async_trait]
impl PaymentLedger for InMemoryLedger {
    async fn payments_for(&self, student_id: &str) -> Result<Vec<PaymentRecord>> {
        let payments = self.payments.read().await;
        Ok(payments.get(student_id).cloned().unwrap_or_default())
    }

    async fn record(&self, payment: NewPayment) -> Result<PaymentRecord> {
        let id = Uuid::new_v4();
        let record = PaymentRecord {
            id: id.to_string(),
            student_id: payment.student_id,
            billing_type: payment.billing_type,
            amount: payment.amount,
            timestamp: Utc::now(),
            method: payment.method,
            status: PaymentStatus::Paid,
            reference: payment.reference.unwrap_or_else(|| receipt_number(&id)),
        };

        let mut payments = self.payments.write().await;
        payments
            .entry(record.student_id.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }
}
