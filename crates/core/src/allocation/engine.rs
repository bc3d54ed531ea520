//! Allocation planning.
//!
//! The engine decides what may be allocated; storage supplies locked rows and
//! live sums, then inserts the plan and recalculates both sides.

use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::Decimal;

use obligo_shared::types::money::fits_within;
use obligo_shared::types::{InstallmentId, ObligationId, PartyId};

use crate::allocation::types::{
    Allocation, AllocationRequest, AllocationSuggestion, InstallmentPosition, OpenObligation,
    OverpaymentPlan, PlannedAllocation,
};
use crate::error::{LedgerError, ensure_positive_amount};
use crate::obligation::{
    CreateObligationInput, Direction, Obligation, ObligationService, ObligationType, SourceKind,
    SourceRef,
};
use crate::period::{Mutation, PeriodStatus, assert_open_period};
use crate::settlement::{FlowDirection, SettlementPosition, SettlementService};

/// Stateless allocation engine.
pub struct AllocationEngine;

impl AllocationEngine {
    /// Validates a manual allocation batch.
    ///
    /// `obligations` holds every obligation the batch references with its
    /// current allocated sum, and `installments` every referenced installment.
    /// Amounts are checked cumulatively within the batch, so two lines against
    /// one obligation cannot each use its full remainder.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad amounts or foreign records,
    /// [`LedgerError::NotFound`] for unknown ids,
    /// [`LedgerError::InvalidStateTransition`] for unallocatable records and
    /// [`LedgerError::OverAllocation`] when a cumulative check fails.
    pub fn plan_manual(
        settlement: &SettlementPosition,
        requests: &[AllocationRequest],
        obligations: &HashMap<ObligationId, OpenObligation>,
        installments: &HashMap<InstallmentId, InstallmentPosition>,
    ) -> Result<Vec<PlannedAllocation>, LedgerError> {
        SettlementService::ensure_allocatable(&settlement.settlement)?;
        if requests.is_empty() {
            return Err(LedgerError::Validation(
                "at least one allocation is required".to_string(),
            ));
        }

        let mut per_obligation: HashMap<ObligationId, Decimal> = HashMap::new();
        let mut per_installment: HashMap<InstallmentId, Decimal> = HashMap::new();
        let mut batch_total = Decimal::ZERO;
        let mut planned = Vec::with_capacity(requests.len());

        for request in requests {
            ensure_positive_amount(request.amount)?;

            let open = obligations
                .get(&request.obligation_id)
                .ok_or_else(|| LedgerError::not_found("obligation", request.obligation_id))?;
            let obligation = &open.obligation;
            if obligation.entity_id != settlement.settlement.entity_id {
                return Err(LedgerError::EntityMismatch {
                    kind: "obligation",
                    id: obligation.id.into_inner(),
                    entity_id: settlement.settlement.entity_id.into_inner(),
                });
            }
            ObligationService::ensure_allocatable(obligation)?;

            if let Some(installment_id) = request.installment_id {
                let position = installments
                    .get(&installment_id)
                    .ok_or_else(|| LedgerError::not_found("installment", installment_id))?;
                if position.installment.obligation_id != obligation.id {
                    return Err(LedgerError::Validation(format!(
                        "installment {installment_id} does not belong to {}",
                        obligation.number
                    )));
                }
                let requested = per_installment.entry(installment_id).or_default();
                *requested += request.amount;
                if !fits_within(
                    position.allocated,
                    *requested,
                    position.installment.amount,
                ) {
                    return Err(LedgerError::OverAllocation {
                        target: format!(
                            "{} installment {}",
                            obligation.number, position.installment.sequence_no
                        ),
                        requested: *requested,
                        available: position.unpaid(),
                    });
                }
            }

            let requested = per_obligation.entry(obligation.id).or_default();
            *requested += request.amount;
            if !fits_within(open.allocated, *requested, obligation.total_amount) {
                return Err(LedgerError::OverAllocation {
                    target: obligation.number.clone(),
                    requested: *requested,
                    available: open.unpaid(),
                });
            }

            batch_total += request.amount;
            if !fits_within(
                settlement.allocated,
                batch_total,
                settlement.settlement.amount,
            ) {
                return Err(LedgerError::OverAllocation {
                    target: settlement.settlement.number.clone(),
                    requested: batch_total,
                    available: settlement.unallocated,
                });
            }

            planned.push(PlannedAllocation {
                obligation_id: obligation.id,
                installment_id: request.installment_id,
                amount: request.amount,
                allocation_date: request
                    .allocation_date
                    .unwrap_or(settlement.settlement.settlement_date),
                notes: request.notes.clone(),
            });
        }

        Ok(planned)
    }

    /// Auto-allocation order: due date ascending with missing due dates last,
    /// then obligation date, then id.
    #[must_use]
    pub fn auto_order(a: &Obligation, b: &Obligation) -> Ordering {
        let due = match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        due.then_with(|| a.obligation_date.cmp(&b.obligation_date))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Filters and orders candidates for auto-allocation.
    ///
    /// Keeps open obligations of `party_id` in the settlement's entity whose
    /// direction the settlement can pay down and which still have something
    /// unpaid.
    #[must_use]
    pub fn eligible_candidates(
        settlement: &SettlementPosition,
        party_id: PartyId,
        candidates: Vec<OpenObligation>,
    ) -> Vec<OpenObligation> {
        let direction = settlement.settlement.direction.settles();
        let mut eligible: Vec<OpenObligation> = candidates
            .into_iter()
            .filter(|c| {
                c.obligation.entity_id == settlement.settlement.entity_id
                    && c.obligation.party_id == party_id
                    && c.obligation.direction == direction
                    && c.obligation.status.is_open()
                    && c.unpaid() > Decimal::ZERO
            })
            .collect();
        eligible.sort_by(|a, b| Self::auto_order(&a.obligation, &b.obligation));
        eligible
    }

    /// Party auto-allocation works for: the override, else the settlement's.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingParty`] when neither is set.
    pub fn resolve_party(
        settlement: &SettlementPosition,
        party_override: Option<PartyId>,
    ) -> Result<PartyId, LedgerError> {
        party_override
            .or(settlement.settlement.party_id)
            .ok_or_else(|| {
                LedgerError::MissingParty(format!(
                    "auto-allocation of {}",
                    settlement.settlement.number
                ))
            })
    }

    /// Greedy oldest-due-first fill of the settlement's unallocated amount.
    ///
    /// An empty plan is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] unless the settlement
    /// is confirmed.
    pub fn plan_auto(
        settlement: &SettlementPosition,
        party_id: PartyId,
        candidates: Vec<OpenObligation>,
    ) -> Result<Vec<PlannedAllocation>, LedgerError> {
        SettlementService::ensure_allocatable(&settlement.settlement)?;

        let mut remaining = settlement.unallocated;
        let mut planned = Vec::new();
        for candidate in Self::eligible_candidates(settlement, party_id, candidates) {
            if remaining <= Decimal::ZERO {
                break;
            }
            let amount = remaining.min(candidate.unpaid());
            remaining -= amount;
            planned.push(PlannedAllocation {
                obligation_id: candidate.obligation.id,
                installment_id: None,
                amount,
                allocation_date: settlement.settlement.settlement_date,
                notes: Some("auto-allocated".to_string()),
            });
        }
        Ok(planned)
    }

    /// Read-only preview of auto-allocation, at most `limit` entries.
    #[must_use]
    pub fn suggestions(
        settlement: &SettlementPosition,
        party_id: PartyId,
        candidates: Vec<OpenObligation>,
        limit: usize,
    ) -> Vec<AllocationSuggestion> {
        let mut remaining = settlement.unallocated;
        Self::eligible_candidates(settlement, party_id, candidates)
            .into_iter()
            .take(limit)
            .map(|candidate| {
                let unpaid = candidate.unpaid();
                let suggested_amount = remaining.min(unpaid).max(Decimal::ZERO);
                remaining -= suggested_amount;
                AllocationSuggestion {
                    obligation_id: candidate.obligation.id,
                    number: candidate.obligation.number,
                    due_date: candidate.obligation.due_date,
                    unpaid,
                    suggested_amount,
                }
            })
            .collect()
    }

    /// Plans an advance obligation absorbing `amount` of the settlement.
    ///
    /// Money received becomes an advance received (payable); money paid out
    /// becomes an advance given (receivable).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingParty`] for a settlement without party,
    /// a validation error for a bad amount and [`LedgerError::OverAllocation`]
    /// when `amount` exceeds the unallocated remainder.
    pub fn plan_overpayment(
        settlement: &SettlementPosition,
        amount: Decimal,
    ) -> Result<OverpaymentPlan, LedgerError> {
        let record = &settlement.settlement;
        SettlementService::ensure_allocatable(record)?;
        ensure_positive_amount(amount)?;
        let party_id = record.party_id.ok_or_else(|| {
            LedgerError::MissingParty(format!("overpayment of {}", record.number))
        })?;
        if !fits_within(settlement.allocated, amount, record.amount) {
            return Err(LedgerError::OverAllocation {
                target: record.number.clone(),
                requested: amount,
                available: settlement.unallocated,
            });
        }

        let (obligation_type, direction) = match record.direction {
            FlowDirection::In => (ObligationType::AdvanceReceived, Direction::Payable),
            FlowDirection::Out => (ObligationType::AdvanceGiven, Direction::Receivable),
        };

        Ok(OverpaymentPlan {
            obligation: CreateObligationInput {
                entity_id: record.entity_id,
                branch_id: record.branch_id,
                obligation_type,
                direction: Some(direction),
                party_id,
                obligation_date: record.settlement_date,
                due_date: None,
                total_amount: amount,
                category_id: None,
                source: Some(SourceRef {
                    kind: SourceKind::Overpayment,
                    id: record.id.into_inner(),
                }),
                reference: Some(record.number.clone()),
                description: Some(format!("Overpayment of {}", record.number)),
                notes: None,
                as_draft: false,
                lines: Vec::new(),
                installments: Vec::new(),
            },
            allocation_date: record.settlement_date,
        })
    }

    /// Validates cancellation of an allocation.
    ///
    /// Neither side may be dated in a frozen period.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] for an already
    /// cancelled allocation and [`LedgerError::LockedPeriod`] naming the
    /// frozen side.
    pub fn validate_cancel(
        allocation: &Allocation,
        obligation: &Obligation,
        obligation_period: PeriodStatus,
        settlement: &SettlementPosition,
        settlement_period: PeriodStatus,
        reason: &str,
    ) -> Result<(), LedgerError> {
        if reason.trim().is_empty() {
            return Err(LedgerError::Validation(
                "a cancellation reason is required".to_string(),
            ));
        }
        if !allocation.is_active() {
            return Err(LedgerError::transition(format!(
                "allocation {} is already cancelled",
                allocation.id
            )));
        }
        assert_open_period(
            &obligation.number,
            obligation.obligation_date,
            obligation_period,
            Mutation::Update,
        )?;
        assert_open_period(
            &settlement.settlement.number,
            settlement.settlement.settlement_date,
            settlement_period,
            Mutation::Update,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use obligo_shared::types::{AllocationId, CashboxId, EntityId, SettlementId};
    use rust_decimal_macros::dec;

    use crate::allocation::types::AllocationStatus;
    use crate::obligation::{Installment, ObligationStatus};
    use crate::settlement::{AccountRef, Settlement, SettlementStatus, SettlementType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
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
                settlement_date: date(2025, 1, 20),
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

    fn receivable(
        entity_id: EntityId,
        party_id: PartyId,
        number: &str,
        total: Decimal,
        due_date: Option<NaiveDate>,
    ) -> OpenObligation {
        OpenObligation {
            obligation: Obligation {
                id: ObligationId::new(),
                entity_id,
                branch_id: None,
                number: number.to_string(),
                obligation_type: ObligationType::CustomerInvoice,
                direction: Direction::Receivable,
                party_id,
                obligation_date: date(2025, 1, 1),
                due_date,
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

    fn request(obligation_id: ObligationId, amount: Decimal) -> AllocationRequest {
        AllocationRequest {
            obligation_id,
            amount,
            allocation_date: None,
            notes: None,
            installment_id: None,
        }
    }

    fn index(obligations: &[OpenObligation]) -> HashMap<ObligationId, OpenObligation> {
        obligations
            .iter()
            .map(|o| (o.obligation.id, o.clone()))
            .collect()
    }

    #[test]
    fn test_manual_allocation_defaults_date() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let s = settlement(entity, party, dec!(600));
        let ob = receivable(entity, party, "SF2025-000001", dec!(1000), None);
        let plan = AllocationEngine::plan_manual(
            &s,
            &[request(ob.obligation.id, dec!(600))],
            &index(&[ob]),
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].allocation_date, date(2025, 1, 20));
    }

    #[test]
    fn test_manual_allocation_checks_cumulative_obligation_amount() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let s = settlement(entity, party, dec!(1000));
        let ob = receivable(entity, party, "SF2025-000001", dec!(500), None);
        let id = ob.obligation.id;
        let err = AllocationEngine::plan_manual(
            &s,
            &[request(id, dec!(300)), request(id, dec!(300))],
            &index(&[ob]),
            &HashMap::new(),
        )
        .unwrap_err();
        match err {
            LedgerError::OverAllocation { target, requested, .. } => {
                assert_eq!(target, "SF2025-000001");
                assert_eq!(requested, dec!(600));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_manual_allocation_checks_settlement_remainder() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let s = settlement(entity, party, dec!(500));
        let a = receivable(entity, party, "SF2025-000001", dec!(400), None);
        let b = receivable(entity, party, "SF2025-000002", dec!(400), None);
        let err = AllocationEngine::plan_manual(
            &s,
            &[
                request(a.obligation.id, dec!(300)),
                request(b.obligation.id, dec!(300)),
            ],
            &index(&[a, b]),
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::OverAllocation { ref target, .. } if target == "CI2025-000001"
        ));
    }

    #[test]
    fn test_manual_allocation_within_tolerance() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let s = settlement(entity, party, dec!(100.01));
        let ob = receivable(entity, party, "SF2025-000001", dec!(100.00), None);
        assert!(
            AllocationEngine::plan_manual(
                &s,
                &[request(ob.obligation.id, dec!(100.01))],
                &index(&[ob]),
                &HashMap::new(),
            )
            .is_ok()
        );
    }

    #[test]
    fn test_manual_allocation_rejects_cancelled_and_foreign() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let s = settlement(entity, party, dec!(100));
        let mut cancelled = receivable(entity, party, "SF2025-000001", dec!(100), None);
        cancelled.obligation.status = ObligationStatus::Cancelled;
        assert!(matches!(
            AllocationEngine::plan_manual(
                &s,
                &[request(cancelled.obligation.id, dec!(10))],
                &index(&[cancelled]),
                &HashMap::new(),
            ),
            Err(LedgerError::InvalidStateTransition(_))
        ));

        let foreign = receivable(EntityId::new(), party, "SF2025-000009", dec!(100), None);
        assert!(matches!(
            AllocationEngine::plan_manual(
                &s,
                &[request(foreign.obligation.id, dec!(10))],
                &index(&[foreign]),
                &HashMap::new(),
            ),
            Err(LedgerError::EntityMismatch { .. })
        ));
    }

    #[test]
    fn test_manual_allocation_requires_confirmed_settlement() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let mut s = settlement(entity, party, dec!(100));
        s.settlement.status = SettlementStatus::Draft;
        let ob = receivable(entity, party, "SF2025-000001", dec!(100), None);
        assert!(matches!(
            AllocationEngine::plan_manual(
                &s,
                &[request(ob.obligation.id, dec!(10))],
                &index(&[ob]),
                &HashMap::new(),
            ),
            Err(LedgerError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_manual_allocation_bounded_by_installment() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let s = settlement(entity, party, dec!(1000));
        let ob = receivable(entity, party, "SF2025-000001", dec!(1000), None);
        let installment = InstallmentPosition {
            installment: Installment {
                id: InstallmentId::new(),
                obligation_id: ob.obligation.id,
                sequence_no: 1,
                due_date: date(2025, 2, 1),
                amount: dec!(500),
            },
            allocated: dec!(200),
        };
        let installments: HashMap<_, _> = [(installment.installment.id, installment.clone())]
            .into_iter()
            .collect();
        let mut req = request(ob.obligation.id, dec!(400));
        req.installment_id = Some(installment.installment.id);
        let err =
            AllocationEngine::plan_manual(&s, &[req], &index(&[ob]), &installments).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::OverAllocation { ref target, .. } if target == "SF2025-000001 installment 1"
        ));
    }

    #[test]
    fn test_tolerance_band_is_not_reusable_across_calls() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let mut ob = receivable(entity, party, "SF2025-000001", dec!(100.00), None);
        ob.allocated = dec!(100.01);
        ob.obligation.status = ObligationStatus::Settled;
        let s = settlement(entity, party, dec!(50.00));

        let err = AllocationEngine::plan_manual(
            &s,
            &[request(ob.obligation.id, dec!(0.01))],
            &index(&[ob.clone()]),
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::OverAllocation { .. }), "{err:?}");

        // A settlement that already used its band cannot give away more.
        let mut spent = settlement(entity, party, dec!(100.00));
        spent.allocated = dec!(100.01);
        spent.unallocated = Decimal::ZERO;
        let mut open = ob;
        open.allocated = Decimal::ZERO;
        open.obligation.status = ObligationStatus::Pending;
        let err = AllocationEngine::plan_manual(
            &spent,
            &[request(open.obligation.id, dec!(0.01))],
            &index(&[open]),
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::OverAllocation { ref target, .. } if target == "CI2025-000001"
        ));
        assert!(matches!(
            AllocationEngine::plan_overpayment(&spent, dec!(0.01)),
            Err(LedgerError::OverAllocation { .. })
        ));
    }

    #[test]
    fn test_auto_order_puts_missing_due_dates_last() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let late = receivable(entity, party, "late", dec!(1), Some(date(2025, 3, 1)));
        let early = receivable(entity, party, "early", dec!(1), Some(date(2025, 2, 1)));
        let undated = receivable(entity, party, "undated", dec!(1), None);
        let s = settlement(entity, party, dec!(10));
        let ordered = AllocationEngine::eligible_candidates(&s, party, vec![undated, late, early]);
        let numbers: Vec<_> = ordered.iter().map(|o| o.obligation.number.as_str()).collect();
        assert_eq!(numbers, ["early", "late", "undated"]);
    }

    #[test]
    fn test_auto_allocation_scenario() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let mut ob = receivable(entity, party, "SF2025-000001", dec!(1000.00), None);
        ob.allocated = dec!(600.00);
        ob.obligation.status = ObligationStatus::Partial;
        let s = settlement(entity, party, dec!(400.00));
        let plan = AllocationEngine::plan_auto(&s, party, vec![ob.clone()]).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].amount, dec!(400.00));
        assert_eq!(
            ObligationService::derive_status(
                ob.obligation.status,
                ob.obligation.total_amount,
                ob.allocated + plan[0].amount
            ),
            ObligationStatus::Settled
        );
    }

    #[test]
    fn test_auto_allocation_skips_wrong_direction_and_party() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let mut payable = receivable(entity, party, "PF2025-000001", dec!(100), None);
        payable.obligation.direction = Direction::Payable;
        let other_party = receivable(entity, PartyId::new(), "SF2025-000002", dec!(100), None);
        let s = settlement(entity, party, dec!(100));
        let plan = AllocationEngine::plan_auto(&s, party, vec![payable, other_party]).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_suggestions_respect_limit_and_remainder() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let a = receivable(entity, party, "a", dec!(300), Some(date(2025, 2, 1)));
        let b = receivable(entity, party, "b", dec!(300), Some(date(2025, 2, 2)));
        let c = receivable(entity, party, "c", dec!(300), Some(date(2025, 2, 3)));
        let s = settlement(entity, party, dec!(400));
        let suggestions = AllocationEngine::suggestions(&s, party, vec![c, b, a], 2);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].suggested_amount, dec!(300));
        assert_eq!(suggestions[1].suggested_amount, dec!(100));
    }

    #[test]
    fn test_overpayment_becomes_advance_received() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let s = settlement(entity, party, dec!(500));
        let plan = AllocationEngine::plan_overpayment(&s, dec!(500)).unwrap();
        assert_eq!(plan.obligation.obligation_type, ObligationType::AdvanceReceived);
        assert_eq!(plan.obligation.direction, Some(Direction::Payable));
        assert_eq!(plan.obligation.total_amount, dec!(500));
        assert_eq!(plan.obligation.obligation_date, s.settlement.settlement_date);

        assert!(matches!(
            AllocationEngine::plan_overpayment(&s, dec!(500.02)),
            Err(LedgerError::OverAllocation { .. })
        ));

        let mut anonymous = s.clone();
        anonymous.settlement.party_id = None;
        assert!(matches!(
            AllocationEngine::plan_overpayment(&anonymous, dec!(1)),
            Err(LedgerError::MissingParty(_))
        ));
    }

    #[test]
    fn test_cancel_allocation_blocked_by_locked_side() {
        let (entity, party) = (EntityId::new(), PartyId::new());
        let s = settlement(entity, party, dec!(100));
        let ob = receivable(entity, party, "SF2025-000001", dec!(100), None);
        let allocation = Allocation {
            id: AllocationId::new(),
            entity_id: entity,
            settlement_id: s.settlement.id,
            obligation_id: ob.obligation.id,
            installment_id: None,
            amount: dec!(100),
            allocation_date: date(2025, 1, 20),
            status: AllocationStatus::Active,
            notes: None,
            cancel_reason: None,
            created_at: Utc::now(),
            cancelled_at: None,
        };
        assert!(
            AllocationEngine::validate_cancel(
                &allocation,
                &ob.obligation,
                PeriodStatus::Open,
                &s,
                PeriodStatus::Open,
                "wrong invoice"
            )
            .is_ok()
        );
        let err = AllocationEngine::validate_cancel(
            &allocation,
            &ob.obligation,
            PeriodStatus::Open,
            &s,
            PeriodStatus::Locked,
            "wrong invoice",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::LockedPeriod { ref record, .. } if record == "CI2025-000001"
        ));
    }
}
