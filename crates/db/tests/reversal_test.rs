//! Reversal tests.
//!
//! Reversal twins are dated today, so these tests use the current month.
//! Skipped when no database is reachable.

#![allow(clippy::uninlined_format_args)]

#[macro_use]
mod common;

use chrono::Utc;
use rust_decimal_macros::dec;

use obligo_core::ErrorKind;
use obligo_core::obligation::{Direction, ObligationStatus};
use obligo_core::settlement::{FlowDirection, SettlementStatus};
use obligo_db::repositories::{
    AllocationRepository, BalanceRepository, ObligationRepository, ReversalRepository,
    SettlementRepository,
};

#[tokio::test]
async fn test_obligation_reversal_requires_cancelled_allocations() {
    let fx = fixture_or_skip!();
    let today = Utc::now().date_naive();
    let obligations = ObligationRepository::new(fx.db.clone());
    let settlements = SettlementRepository::new(fx.db.clone());
    let allocations = AllocationRepository::new(fx.db.clone());
    let reversals = ReversalRepository::new(fx.db.clone());

    let invoice = obligations
        .create(fx.invoice(dec!(420.00), today, None))
        .await
        .unwrap();
    let receipt = settlements
        .create(fx.receipt(dec!(100.00), today))
        .await
        .unwrap();
    let created = allocations
        .auto_allocate(fx.entity_id, receipt.settlement.id, None)
        .await
        .unwrap();

    let err = reversals
        .reverse_obligation(fx.entity_id, invoice.obligation.id, "wrong customer")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    allocations
        .cancel_allocation(fx.entity_id, created[0].id, "undo before reversal")
        .await
        .unwrap();

    let reversed = reversals
        .reverse_obligation(fx.entity_id, invoice.obligation.id, "wrong customer")
        .await
        .unwrap();
    let original = &reversed.original;
    let twin = &reversed.reversal;

    assert_eq!(original.status, ObligationStatus::Reversed);
    assert_eq!(original.reversal_obligation_id, Some(twin.id));
    assert_eq!(original.total_amount, dec!(420.00));

    assert_eq!(twin.status, ObligationStatus::Reversed);
    assert_eq!(twin.reversed_obligation_id, Some(original.id));
    assert_eq!(twin.direction, Direction::Payable);
    assert_eq!(twin.total_amount, dec!(420.00));
    assert_eq!(twin.obligation_date, today);
    assert_ne!(twin.number, original.number);

    let again = reversals
        .reverse_obligation(fx.entity_id, original.id, "second time")
        .await
        .unwrap_err();
    assert_eq!(again.kind(), ErrorKind::InvalidStateTransition);

    let twin_again = reversals
        .reverse_obligation(fx.entity_id, twin.id, "reverse the reversal")
        .await
        .unwrap_err();
    assert_eq!(twin_again.kind(), ErrorKind::InvalidStateTransition);

    let delete = obligations.delete(fx.entity_id, twin.id).await.unwrap_err();
    assert_eq!(delete.kind(), ErrorKind::InvalidStateTransition);

    assert_eq!(
        BalanceRepository::new(fx.db.clone())
            .party_receivable_balance(fx.entity_id, fx.customer.id)
            .await
            .unwrap(),
        dec!(0)
    );
}

#[tokio::test]
async fn test_settlement_reversal_nets_account_to_zero() {
    let fx = fixture_or_skip!();
    let today = Utc::now().date_naive();
    let settlements = SettlementRepository::new(fx.db.clone());
    let reversals = ReversalRepository::new(fx.db.clone());
    let balances = BalanceRepository::new(fx.db.clone());

    let receipt = settlements
        .create(fx.receipt(dec!(75.50), today))
        .await
        .unwrap();
    assert_eq!(
        balances
            .account_balance_as_of(fx.entity_id, fx.cashbox, today)
            .await
            .unwrap(),
        dec!(75.50)
    );

    let blank = reversals
        .reverse_settlement(fx.entity_id, receipt.settlement.id, "")
        .await
        .unwrap_err();
    assert_eq!(blank.kind(), ErrorKind::Validation);

    let reversed = reversals
        .reverse_settlement(fx.entity_id, receipt.settlement.id, "bounced")
        .await
        .unwrap();
    assert_eq!(reversed.original.status, SettlementStatus::Reversed);
    assert_eq!(reversed.reversal.direction, FlowDirection::Out);
    assert_eq!(reversed.reversal.amount, dec!(75.50));
    assert_eq!(
        reversed.reversal.reversed_settlement_id,
        Some(reversed.original.id)
    );

    assert_eq!(
        balances
            .account_balance_as_of(fx.entity_id, fx.cashbox, today)
            .await
            .unwrap(),
        dec!(0)
    );
}

#[tokio::test]
async fn test_draft_settlement_cannot_be_reversed() {
    let fx = fixture_or_skip!();
    let today = Utc::now().date_naive();
    let settlements = SettlementRepository::new(fx.db.clone());
    let reversals = ReversalRepository::new(fx.db.clone());

    let mut input = fx.receipt(dec!(10.00), today);
    input.confirm = false;
    let draft = settlements.create(input).await.unwrap();
    assert_eq!(draft.settlement.status, SettlementStatus::Draft);

    let err = reversals
        .reverse_settlement(fx.entity_id, draft.settlement.id, "never posted")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    // Drafts are simply deleted instead.
    settlements
        .delete(fx.entity_id, draft.settlement.id)
        .await
        .unwrap();
    let gone = settlements
        .get(fx.entity_id, draft.settlement.id)
        .await
        .unwrap_err();
    assert_eq!(gone.kind(), ErrorKind::NotFound);
}
