use super::cache::{CacheView, Fetched, RefreshCache};
use super::retry::RetryPolicy;
use crate::config::EngineConfig;
use crate::domain::billing::ClassId;
use crate::domain::ports::{BillingCatalogRef, PaymentLedgerRef, StudentDirectoryRef};
use crate::domain::reconcile::{FeeStructureSnapshot, PaymentSummary, reconcile};
use crate::domain::residence::ResidenceFilter;
use crate::domain::student::{ResidenceType, Student, StudentId};
use crate::error::{FeeError, Result};
use tokio::sync::RwLock;

/// Which cache an explicit invalidation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// Keyed by class id.
    Catalog,
    /// Keyed by student id.
    Summary,
}

/// Domain events that drive cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    ManualRefreshRequested {
        student_id: StudentId,
    },
    StudentUpdated {
        student_id: StudentId,
        new_residence: Option<ResidenceType>,
    },
    PaymentSubmitted {
        student_id: StudentId,
    },
}

/// Owner of every derived-data cache.
///
/// Fee snapshots are cached per class and tagged with the residence they
/// were filtered for; summaries are cached per student. All reads of the
/// external services go through the retry policy, and all invalidation goes
/// through [`FeeCoordinator::handle`] or [`FeeCoordinator::invalidate`].
pub struct FeeCoordinator {
    catalog: BillingCatalogRef,
    directory: StudentDirectoryRef,
    ledger: PaymentLedgerRef,
    filter: ResidenceFilter,
    retry: RetryPolicy,
    snapshots: RefreshCache<ClassId, ResidenceType, FeeStructureSnapshot>,
    summaries: RefreshCache<StudentId, (), PaymentSummary>,
    active_student: RwLock<Option<StudentId>>,
}

impl FeeCoordinator {
    pub fn new(
        catalog: BillingCatalogRef,
        directory: StudentDirectoryRef,
        ledger: PaymentLedgerRef,
        config: &EngineConfig,
    ) -> Self {
        Self {
            catalog,
            directory,
            ledger,
            filter: config.residence_filter(),
            retry: config.retry,
            snapshots: RefreshCache::new("fee_structure"),
            summaries: RefreshCache::new("payment_summary"),
            active_student: RwLock::new(None),
        }
    }

    /// Fee structure of `class_id` for a residence. Absent residence is
    /// treated as day.
    pub async fn fee_structure(
        &self,
        class_id: &str,
        residence: Option<ResidenceType>,
    ) -> Result<CacheView<FeeStructureSnapshot>> {
        self.snapshot(class_id, residence, false).await
    }

    pub async fn payment_summary(&self, student_id: &str) -> Result<CacheView<PaymentSummary>> {
        self.summary(student_id, false).await
    }

    /// Applies a refresh event. A manual refresh returns the recomputed summary.
    pub async fn handle(&self, event: RefreshEvent) -> Result<Option<CacheView<PaymentSummary>>> {
        tracing::info!(?event, "handling refresh event");
        match event {
            RefreshEvent::ManualRefreshRequested { student_id } => {
                self.summary(&student_id, true).await.map(Some)
            }
            RefreshEvent::StudentUpdated {
                student_id,
                new_residence,
            } => {
                let is_active = self.active_student.read().await.as_deref() == Some(&*student_id);
                let residence_changed = self
                    .summaries
                    .peek(&student_id)
                    .await
                    .is_some_and(|view| {
                        view.value.residence != ResidenceFilter::resolve(new_residence).0
                    });
                if is_active || residence_changed {
                    self.summaries.invalidate(&student_id).await;
                }
                Ok(None)
            }
            RefreshEvent::PaymentSubmitted { student_id } => {
                self.summaries.invalidate(&student_id).await;
                Ok(None)
            }
        }
    }

    /// Explicit invalidation. Invalidating a class also invalidates the
    /// summaries computed from it.
    pub async fn invalidate(&self, scope: CacheScope, key: &str) {
        let key = key.to_string();
        match scope {
            CacheScope::Catalog => {
                self.snapshots.invalidate(&key).await;
                let students = self
                    .summaries
                    .invalidate_where(|summary| summary.class_id == key)
                    .await;
                tracing::debug!(class_id = %key, dependents = students.len(), "catalog invalidated");
            }
            CacheScope::Summary => {
                self.summaries.invalidate(&key).await;
            }
        }
    }

    pub async fn set_active_student(&self, student_id: Option<StudentId>) {
        *self.active_student.write().await = student_id;
    }

    pub async fn active_student(&self) -> Option<StudentId> {
        self.active_student.read().await.clone()
    }

    pub async fn cached_summary(&self, student_id: &str) -> Option<CacheView<PaymentSummary>> {
        self.summaries.peek(&student_id.to_string()).await
    }

    pub async fn cached_fee_structure(
        &self,
        class_id: &str,
    ) -> Option<CacheView<FeeStructureSnapshot>> {
        self.snapshots.peek(&class_id.to_string()).await
    }

    /// Looks a student up, retrying transient failures.
    pub async fn resolve_student(&self, student_id: &str) -> Result<Student> {
        self.retry
            .run("get_student", || self.directory.get_student(student_id))
            .await?
            .ok_or_else(|| FeeError::NotFound(format!("Student '{student_id}'")))
    }

    async fn snapshot(
        &self,
        class_id: &str,
        residence: Option<ResidenceType>,
        force: bool,
    ) -> Result<CacheView<FeeStructureSnapshot>> {
        let (resolved, advisory) = ResidenceFilter::resolve(residence);
        if let Some(advisory) = advisory {
            tracing::warn!(class_id, ?advisory, "residence absent, defaulting");
        }

        let key = class_id.to_string();
        self.snapshots
            .get_or_refresh(&key, &resolved, force, || async {
                let items = self
                    .retry
                    .run("items_for_class", || self.catalog.items_for_class(class_id))
                    .await?
                    .ok_or_else(|| FeeError::NotFound(format!("Class '{class_id}'")))?;
                items.iter().try_for_each(|item| item.validate())?;

                let filtered = self.filter.apply(&items, Some(resolved))?;
                Ok(Fetched::fresh(FeeStructureSnapshot::from_filtered(
                    class_id, filtered,
                )))
            })
            .await
    }

    async fn summary(&self, student_id: &str, force: bool) -> Result<CacheView<PaymentSummary>> {
        let key = student_id.to_string();
        self.summaries
            .get_or_refresh(&key, &(), force, || async {
                let student = self.resolve_student(student_id).await?;
                let (_, advisory) = ResidenceFilter::resolve(student.residence_type);

                let (snapshot, payments) = tokio::try_join!(
                    self.snapshot(&student.class_id, student.residence_type, force),
                    self.retry
                        .run("payments_for", || self.ledger.payments_for(student_id)),
                )?;

                let summary = reconcile(student_id, &snapshot.value, &payments)?
                    .with_advisory(advisory);
                tracing::debug!(
                    student_id,
                    total_required = %summary.total_required,
                    total_paid = %summary.total_paid,
                    balance = %summary.balance,
                    "summary recomputed"
                );
                Ok(Fetched {
                    value: summary,
                    from_stale_inputs: snapshot.stale,
                })
            })
            .await
    }
}
