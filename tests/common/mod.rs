#![allow(dead_code)]

use async_trait::async_trait;
use bursar::domain::billing::{BillingItem, Frequency, ResidenceScope};
use bursar::domain::money::Money;
use bursar::domain::payment::{NewPayment, PaymentRecord};
use bursar::domain::ports::{BillingCatalog, PaymentLedger, StudentDirectory};
use bursar::domain::student::{ResidenceType, Student};
use bursar::error::{FeeError, Result};
use bursar::infrastructure::in_memory::{InMemoryCatalog, InMemoryLedger, InMemoryStudentDirectory};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Semaphore;

pub fn item(name: &str, amount: Decimal, scope: ResidenceScope) -> BillingItem {
    BillingItem {
        id: name.to_lowercase().replace(' ', "-"),
        name: name.to_string(),
        amount: Money::new(amount).unwrap(),
        frequency: Frequency::Termly,
        class_id: "S1".to_string(),
        term: "T1".to_string(),
        year: 2024,
        residence_scope: scope,
    }
}

pub fn student(id: &str, residence: Option<ResidenceType>) -> Student {
    Student {
        id: id.to_string(),
        class_id: "S1".to_string(),
        residence_type: residence,
    }
}

/// Blocks calls until the test releases them.
pub struct Gate {
    closed: AtomicBool,
    permits: Semaphore,
    waiting: AtomicUsize,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            closed: AtomicBool::new(false),
            permits: Semaphore::new(0),
            waiting: AtomicUsize::new(0),
        }
    }
}

impl Gate {
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    async fn pass(&self) {
        if self.closed.load(Ordering::SeqCst) {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            if let Ok(permit) = self.permits.acquire().await {
                permit.forget();
            }
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub async fn wait_for_waiters(&self, n: usize) {
        while self.waiting() < n {
            tokio::task::yield_now().await;
        }
    }
}

/// Catalog wrapper that counts reads and can hold them at a gate.
pub struct CountingCatalog {
    inner: InMemoryCatalog,
    pub reads: AtomicUsize,
    pub gate: Gate,
}

impl CountingCatalog {
    pub fn new(inner: InMemoryCatalog) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            gate: Gate::default(),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BillingCatalog for CountingCatalog {
    async fn items_for_class(&self, class_id: &str) -> Result<Option<Vec<BillingItem>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;
        self.inner.items_for_class(class_id).await
    }
}

/// Ledger wrapper with gated reads, injectable read failures and write
/// rejection.
pub struct FlakyLedger {
    inner: InMemoryLedger,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    read_failures_left: AtomicUsize,
    reject_writes: AtomicBool,
    pub gate: Gate,
}

impl FlakyLedger {
    pub fn new(inner: InMemoryLedger) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            read_failures_left: AtomicUsize::new(0),
            reject_writes: AtomicBool::new(false),
            gate: Gate::default(),
        }
    }

    pub fn fail_next_reads(&self, n: usize) {
        self.read_failures_left.store(n, Ordering::SeqCst);
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentLedger for FlakyLedger {
    /// The gate sits after the read, so a held call returns data as it was
    /// when the call started.
    async fn payments_for(&self, student_id: &str) -> Result<Vec<PaymentRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.inner.payments_for(student_id).await;
        self.gate.pass().await;
        let failing = self
            .read_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(FeeError::Network("ledger unreachable".to_string()));
        }
        snapshot
    }

    async fn record(&self, payment: NewPayment) -> Result<PaymentRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(FeeError::Persistence("ledger rejected the write".to_string()));
        }
        self.inner.record(payment).await
    }
}

pub fn directory(students: impl IntoIterator<Item = Student>) -> Arc<dyn StudentDirectory> {
    Arc::new(InMemoryStudentDirectory::from_students(students))
}
