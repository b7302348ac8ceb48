mod common;

use bursar::application::coordinator::{CacheScope, FeeCoordinator, RefreshEvent};
use bursar::application::gateway::PaymentGateway;
use bursar::application::retry::RetryPolicy;
use bursar::config::EngineConfig;
use bursar::domain::billing::ResidenceScope;
use bursar::domain::payment::{PaymentInput, PaymentMethod};
use bursar::domain::student::ResidenceType;
use bursar::error::FeeError;
use bursar::infrastructure::in_memory::{InMemoryCatalog, InMemoryLedger};
use common::{CountingCatalog, FlakyLedger, item, student};
use rust_decimal_macros::dec;
use std::sync::Arc;

struct Harness {
    catalog: Arc<CountingCatalog>,
    ledger: Arc<FlakyLedger>,
    coordinator: Arc<FeeCoordinator>,
    gateway: PaymentGateway,
}

fn config() -> EngineConfig {
    EngineConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
        ..EngineConfig::default()
    }
}

fn harness() -> Harness {
    let catalog = Arc::new(CountingCatalog::new(InMemoryCatalog::from_items([
        item("Tuition", dec!(500000), ResidenceScope::Both),
        item("BoardingFee", dec!(300000), ResidenceScope::Boarding),
    ])));
    let ledger = Arc::new(FlakyLedger::new(InMemoryLedger::new()));
    let directory = common::directory([
        student("STU1", Some(ResidenceType::Day)),
        student("STU2", Some(ResidenceType::Boarding)),
    ]);
    let coordinator = Arc::new(FeeCoordinator::new(
        catalog.clone(),
        directory,
        ledger.clone(),
        &config(),
    ));
    let gateway = PaymentGateway::new(ledger.clone(), coordinator.clone(), 16);
    Harness {
        catalog,
        ledger,
        coordinator,
        gateway,
    }
}

fn tuition_payment(amount: rust_decimal::Decimal) -> PaymentInput {
    PaymentInput {
        student_id: "STU1".into(),
        amount,
        billing_type: "Tuition".into(),
        method: PaymentMethod::MobileMoney,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_concurrent_cold_reads_issue_one_catalog_read() {
    let h = harness();
    h.catalog.gate.close();

    let first = h.coordinator.fee_structure("S1", Some(ResidenceType::Day));
    let second = h.coordinator.fee_structure("S1", Some(ResidenceType::Day));
    let release = async {
        h.catalog.gate.wait_for_waiters(1).await;
        h.catalog.gate.release(1);
    };
    let (a, b, ()) = tokio::join!(first, second, release);

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(h.catalog.reads(), 1);
    assert_eq!(a.value, b.value);
    assert_eq!(a.value.total.value(), dec!(500000));
}

#[tokio::test]
async fn test_concurrent_reads_for_different_residences_do_not_share() {
    let h = harness();
    let (day, boarding) = tokio::join!(
        h.coordinator.fee_structure("S1", Some(ResidenceType::Day)),
        h.coordinator.fee_structure("S1", Some(ResidenceType::Boarding)),
    );
    assert_eq!(day.unwrap().value.total.value(), dec!(500000));
    assert_eq!(boarding.unwrap().value.total.value(), dec!(800000));
    assert_eq!(h.catalog.reads(), 2);
}

#[tokio::test]
async fn test_residence_mismatch_recomputes_class_snapshot() {
    let h = harness();
    h.coordinator.payment_summary("STU1").await.unwrap();
    assert_eq!(h.catalog.reads(), 1);

    // STU2 boards in the same class, so the day-tagged snapshot is a miss.
    let boarder = h.coordinator.payment_summary("STU2").await.unwrap();
    assert_eq!(boarder.value.total_required.value(), dec!(800000));
    assert_eq!(h.catalog.reads(), 2);

    let cached = h.coordinator.cached_fee_structure("S1").await.unwrap();
    assert_eq!(cached.value.residence, ResidenceType::Boarding);
}

#[tokio::test]
async fn test_payment_submission_keeps_catalog_cache() {
    let h = harness();
    h.coordinator.payment_summary("STU1").await.unwrap();
    let catalog_generation = h.coordinator.cached_fee_structure("S1").await.unwrap().generation;

    h.gateway.submit(tuition_payment(dec!(200000))).await.unwrap();

    let summary = h.coordinator.payment_summary("STU1").await.unwrap();
    assert_eq!(summary.value.balance.value(), dec!(300000));
    assert_eq!(h.catalog.reads(), 1);
    assert_eq!(
        h.coordinator.cached_fee_structure("S1").await.unwrap().generation,
        catalog_generation
    );
}

#[tokio::test]
async fn test_late_response_does_not_overwrite_newer_state() {
    let h = harness();
    h.ledger.gate.close();

    let slow_summary = h.coordinator.payment_summary("STU1");
    let pay_meanwhile = async {
        h.ledger.gate.wait_for_waiters(1).await;
        h.gateway.submit(tuition_payment(dec!(200000))).await.unwrap();
        h.ledger.gate.release(1);
    };
    let (late, ()) = tokio::join!(slow_summary, pay_meanwhile);

    // The late read started before the payment and is not committed.
    assert_eq!(late.unwrap().value.balance.value(), dec!(500000));
    assert!(h.coordinator.cached_summary("STU1").await.is_none());

    h.ledger.gate.release(1);
    let current = h.coordinator.payment_summary("STU1").await.unwrap();
    assert_eq!(current.value.balance.value(), dec!(300000));
}

#[tokio::test]
async fn test_transient_ledger_failures_are_retried() {
    let h = harness();
    h.ledger.fail_next_reads(2);

    let summary = h.coordinator.payment_summary("STU1").await.unwrap();
    assert!(!summary.stale);
    assert_eq!(h.ledger.reads(), 3);
}

#[tokio::test]
async fn test_failed_refresh_serves_last_known_summary_as_stale() {
    let h = harness();
    let first = h.coordinator.payment_summary("STU1").await.unwrap();

    h.coordinator.invalidate(CacheScope::Summary, "STU1").await;
    h.ledger.fail_next_reads(10);
    let fallback = h.coordinator.payment_summary("STU1").await.unwrap();
    assert!(fallback.stale);
    assert_eq!(fallback.value, first.value);

    h.ledger.fail_next_reads(0);
    let recovered = h.coordinator.payment_summary("STU1").await.unwrap();
    assert!(!recovered.stale);
}

#[tokio::test]
async fn test_failed_refresh_without_cache_is_an_error() {
    let h = harness();
    h.ledger.fail_next_reads(10);
    let result = h.coordinator.payment_summary("STU1").await;
    assert!(matches!(result, Err(FeeError::Network(_))));
}

#[tokio::test]
async fn test_manual_refresh_refetches_catalog_and_ledger() {
    let h = harness();
    h.coordinator.payment_summary("STU1").await.unwrap();
    let ledger_reads = h.ledger.reads();

    h.coordinator
        .handle(RefreshEvent::ManualRefreshRequested {
            student_id: "STU1".into(),
        })
        .await
        .unwrap();

    assert_eq!(h.catalog.reads(), 2);
    assert_eq!(h.ledger.reads(), ledger_reads + 1);
}

#[tokio::test]
async fn test_failed_submission_leaves_caches_untouched() {
    let h = harness();
    let before = h.coordinator.payment_summary("STU1").await.unwrap();
    h.ledger.reject_writes(true);

    let result = h.gateway.submit(tuition_payment(dec!(100000))).await;
    assert!(matches!(result, Err(FeeError::Persistence(_))));

    let cached = h.coordinator.cached_summary("STU1").await.unwrap();
    assert!(!cached.stale);
    assert_eq!(cached.generation, before.generation);
    assert_eq!(cached.value, before.value);
}
