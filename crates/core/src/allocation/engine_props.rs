//! Property-based tests for AllocationEngine.
//!
//! Over-allocation must be impossible whatever the batch looks like.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use obligo_shared::types::{
    ALLOCATION_TOLERANCE, CashboxId, EntityId, ObligationId, PartyId, SettlementId,
};

use crate::allocation::engine::AllocationEngine;
use crate::allocation::types::{AllocationRequest, OpenObligation};
use crate::obligation::{Direction, Obligation, ObligationStatus, ObligationType};
use crate::settlement::{
    AccountRef, FlowDirection, Settlement, SettlementPosition, SettlementStatus, SettlementType,
};

fn arb_cents() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

fn settlement(entity_id: EntityId, party_id: PartyId, amount: Decimal) -> SettlementPosition {
    SettlementPosition {
        settlement: Settlement {
            id: SettlementId::new(),
            entity_id,
            branch_id: None,
            number: "CI2025-000001".to_string(),
            settlement_type: SettlementType::CashIn,
            direction: FlowDirection::In,
            party_id: Some(party_id),
            account: AccountRef::Cashbox(CashboxId::new()),
            destination: None,
            settlement_date: base_date(),
            amount,
            fee_amount: Decimal::ZERO,
            net_amount: amount,
            status: SettlementStatus::Confirmed,
            reversed_settlement_id: None,
            reversal_settlement_id: None,
            reference: None,
            description: None,
            notes: None,
            status_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        allocated: Decimal::ZERO,
        unallocated: amount,
    }
}

fn open(
    entity_id: EntityId,
    party_id: PartyId,
    seq: usize,
    total: Decimal,
    due_offset: Option<u64>,
) -> OpenObligation {
    OpenObligation {
        obligation: Obligation {
            id: ObligationId::new(),
            entity_id,
            branch_id: None,
            number: format!("SF2025-{seq:06}"),
            obligation_type: ObligationType::CustomerInvoice,
            direction: Direction::Receivable,
            party_id,
            obligation_date: base_date(),
            due_date: due_offset.map(|days| base_date() + chrono::Days::new(days)),
            total_amount: total,
            category_id: None,
            status: ObligationStatus::Pending,
            reversed_obligation_id: None,
            reversal_obligation_id: None,
            source: None,
            reference: None,
            description: None,
            notes: None,
            status_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        allocated: Decimal::ZERO,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Auto-allocation never exceeds the settlement nor any obligation.
    #[test]
    fn prop_auto_plan_never_over_allocates(
        amount in arb_cents(),
        totals in prop::collection::vec((arb_cents(), prop::option::of(0u64..120)), 0..8),
    ) {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let s = settlement(entity, party, amount);
        let candidates: Vec<_> = totals
            .iter()
            .enumerate()
            .map(|(i, (total, due))| open(entity, party, i + 1, *total, *due))
            .collect();
        let by_id: HashMap<_, _> = candidates
            .iter()
            .map(|c| (c.obligation.id, c.obligation.total_amount))
            .collect();

        let plan = AllocationEngine::plan_auto(&s, party, candidates).unwrap();

        let planned_total: Decimal = plan.iter().map(|p| p.amount).sum();
        prop_assert!(planned_total <= amount);
        for p in &plan {
            prop_assert!(p.amount > Decimal::ZERO);
            prop_assert!(p.amount <= by_id[&p.obligation_id]);
        }

        // Greedy fill: either the settlement is used up or every candidate is paid.
        let owed: Decimal = by_id.values().copied().sum();
        prop_assert_eq!(planned_total, amount.min(owed));
    }

    /// An accepted manual batch keeps every cumulative sum inside the tolerance.
    #[test]
    fn prop_manual_plan_respects_cumulative_limits(
        amount in arb_cents(),
        total in arb_cents(),
        parts in prop::collection::vec(arb_cents(), 1..6),
    ) {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let s = settlement(entity, party, amount);
        let ob = open(entity, party, 1, total, None);
        let id = ob.obligation.id;
        let obligations: HashMap<_, _> = [(id, ob)].into_iter().collect();
        let requests: Vec<_> = parts
            .iter()
            .map(|part| AllocationRequest {
                obligation_id: id,
                amount: *part,
                allocation_date: None,
                notes: None,
                installment_id: None,
            })
            .collect();

        let requested: Decimal = parts.iter().copied().sum();
        let result = AllocationEngine::plan_manual(&s, &requests, &obligations, &HashMap::new());
        let within = requested <= total + ALLOCATION_TOLERANCE
            && requested <= amount + ALLOCATION_TOLERANCE;
        prop_assert_eq!(result.is_ok(), within);
    }
}
