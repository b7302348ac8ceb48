use super::coordinator::{FeeCoordinator, RefreshEvent};
use crate::domain::payment::{PaymentInput, PaymentRecord};
use crate::domain::ports::PaymentLedgerRef;
use crate::error::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Bounded memory of recent keyed submissions.
struct RecentSubmissions {
    capacity: usize,
    entries: VecDeque<(String, PaymentRecord)>,
}

impl RecentSubmissions {
    fn find(&self, key: &str) -> Option<&PaymentRecord> {
        self.entries
            .iter()
            .find(|(seen, _)| seen == key)
            .map(|(_, record)| record)
    }

    fn remember(&mut self, key: String, record: PaymentRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((key, record));
    }
}

/// Validates and records new payments.
///
/// A submission either lands in the ledger and invalidates the student's
/// cached summary, or fails and leaves ledger and caches untouched. Ledger
/// writes are never retried.
pub struct PaymentGateway {
    ledger: PaymentLedgerRef,
    coordinator: Arc<FeeCoordinator>,
    recent: Mutex<RecentSubmissions>,
}

impl PaymentGateway {
    pub fn new(
        ledger: PaymentLedgerRef,
        coordinator: Arc<FeeCoordinator>,
        idempotency_window: usize,
    ) -> Self {
        Self {
            ledger,
            coordinator,
            recent: Mutex::new(RecentSubmissions {
                capacity: idempotency_window,
                entries: VecDeque::new(),
            }),
        }
    }

    pub async fn submit(&self, input: PaymentInput) -> Result<PaymentRecord> {
        let payment = input.validate().inspect_err(|err| {
            tracing::info!(student_id = %input.student_id, error = %err, "payment rejected");
        })?;

        // Keyed submissions are serialized so a double click cannot race
        // past the duplicate check.
        let mut recent = match &input.idempotency_key {
            Some(key) => {
                let guard = self.recent.lock().await;
                if let Some(existing) = guard.find(key) {
                    tracing::info!(
                        idempotency_key = %key,
                        reference = %existing.reference,
                        "duplicate submission, returning earlier receipt"
                    );
                    return Ok(existing.clone());
                }
                Some(guard)
            }
            None => None,
        };

        self.coordinator.resolve_student(&payment.student_id).await?;

        let student_id = payment.student_id.clone();
        let record = self.ledger.record(payment).await.inspect_err(|err| {
            tracing::warn!(%student_id, error = %err, "ledger write failed");
        })?;
        tracing::info!(
            %student_id,
            reference = %record.reference,
            amount = %record.amount.value(),
            billing_type = %record.billing_type,
            "payment recorded"
        );

        if let (Some(guard), Some(key)) = (recent.as_mut(), input.idempotency_key) {
            guard.remember(key, record.clone());
        }
        drop(recent);

        // The write already succeeded; an invalidation failure must not turn
        // it into an error for the caller.
        if let Err(err) = self
            .coordinator
            .handle(RefreshEvent::PaymentSubmitted { student_id })
            .await
        {
            tracing::error!(error = %err, "failed to invalidate summary after payment");
        }
        Ok(record)
    }
}
