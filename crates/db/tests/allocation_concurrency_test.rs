//! Concurrent allocation tests.
//!
//! Settlements are locked before obligations and obligations in id order, so
//! batches racing for one obligation run one after another and each sees the
//! sums the previous one committed. Skipped when no database is reachable.

#![allow(clippy::uninlined_format_args)]

#[macro_use]
mod common;

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

use obligo_core::ErrorKind;
use obligo_core::allocation::AllocationRequest;
use obligo_core::obligation::ObligationStatus;
use obligo_db::repositories::{AllocationRepository, ObligationRepository, SettlementRepository};
use obligo_shared::types::ALLOCATION_TOLERANCE;

use common::date;

// Stays below the default pool size; every task holds a connection while it
// waits on the obligation row.
const TASKS: usize = 8;

#[tokio::test]
async fn test_racing_batches_cannot_overallocate_one_obligation() {
    let fx = fixture_or_skip!();
    let obligations = ObligationRepository::new(fx.db.clone());
    let settlements = SettlementRepository::new(fx.db.clone());
    let allocations = AllocationRepository::new(fx.db.clone());

    let invoice = obligations
        .create(fx.invoice(dec!(1000.00), date(2025, 10, 1), None))
        .await
        .unwrap();
    let mut receipts = Vec::with_capacity(TASKS);
    for _ in 0..TASKS {
        let receipt = settlements
            .create(fx.receipt(dec!(800.00), date(2025, 10, 2)))
            .await
            .unwrap();
        receipts.push(receipt.settlement.id);
    }

    let barrier = Arc::new(Barrier::new(TASKS));
    let handles = receipts.into_iter().map(|settlement_id| {
        let allocations = allocations.clone();
        let barrier = Arc::clone(&barrier);
        let entity_id = fx.entity_id;
        let obligation_id = invoice.obligation.id;
        tokio::spawn(async move {
            barrier.wait().await;
            allocations
                .allocate(
                    entity_id,
                    settlement_id,
                    vec![AllocationRequest {
                        obligation_id,
                        amount: dec!(800.00),
                        allocation_date: None,
                        notes: None,
                        installment_id: None,
                    }],
                )
                .await
        })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1, "results: {:?}", results);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::OverAllocation, "{}", err);
    }

    let position = obligations
        .get(fx.entity_id, invoice.obligation.id)
        .await
        .unwrap();
    assert_eq!(position.paid, dec!(800.00));
    assert!(position.paid <= position.obligation.total_amount + ALLOCATION_TOLERANCE);
    assert_eq!(position.obligation.status, ObligationStatus::Partial);
}

#[tokio::test]
async fn test_racing_auto_allocations_fill_exactly_once() {
    let fx = fixture_or_skip!();
    let obligations = ObligationRepository::new(fx.db.clone());
    let settlements = SettlementRepository::new(fx.db.clone());
    let allocations = AllocationRepository::new(fx.db.clone());

    let invoice = obligations
        .create(fx.invoice(dec!(1000.00), date(2025, 11, 3), None))
        .await
        .unwrap();
    let mut receipts = Vec::with_capacity(TASKS);
    for _ in 0..TASKS {
        let receipt = settlements
            .create(fx.receipt(dec!(300.00), date(2025, 11, 4)))
            .await
            .unwrap();
        receipts.push(receipt.settlement.id);
    }

    let barrier = Arc::new(Barrier::new(TASKS));
    let handles = receipts.iter().copied().map(|settlement_id| {
        let allocations = allocations.clone();
        let barrier = Arc::clone(&barrier);
        let entity_id = fx.entity_id;
        tokio::spawn(async move {
            barrier.wait().await;
            allocations.auto_allocate(entity_id, settlement_id, None).await
        })
    });

    let applied: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .flat_map(|joined| joined.unwrap().unwrap())
        .collect();

    // 300 + 300 + 300 + 100, then nothing is left to fill.
    let total: Decimal = applied.iter().map(|a| a.amount).sum();
    assert_eq!(total, dec!(1000.00));
    assert_eq!(applied.len(), 4);

    let position = obligations
        .get(fx.entity_id, invoice.obligation.id)
        .await
        .unwrap();
    assert_eq!(position.paid, dec!(1000.00));
    assert_eq!(position.obligation.status, ObligationStatus::Settled);

    let mut unallocated = Vec::with_capacity(receipts.len());
    for settlement_id in receipts {
        unallocated.push(
            settlements
                .get(fx.entity_id, settlement_id)
                .await
                .unwrap()
                .unallocated,
        );
    }
    let left: Decimal = unallocated.iter().sum();
    assert_eq!(left, dec!(300.00) * Decimal::from(TASKS) - dec!(1000.00));
}
