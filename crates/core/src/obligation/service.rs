//! Obligation validation and status derivation.

use rust_decimal::Decimal;

use obligo_shared::types::money::{non_negative, round_money};
use obligo_shared::types::{
    ALLOCATION_TOLERANCE, InstallmentId, ObligationId, ObligationLineId, SETTLED_TOLERANCE,
};

use crate::error::{LedgerError, ensure_positive_amount};
use crate::obligation::types::{
    CreateObligationInput, Direction, Installment, InstallmentInput, NewObligation, Obligation,
    ObligationLine, ObligationLineInput, ObligationPatch, ObligationStatus, ObligationType,
};
use crate::party::Party;
use crate::period::{Mutation, PeriodStatus, assert_open_period};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Stateless service for obligation rules.
///
/// Storage reads (party, period status, allocation counts) are passed in; the
/// functions here only decide.
pub struct ObligationService;

impl ObligationService {
    /// Validates a create request and builds the record to insert.
    ///
    /// The period check is left to the caller, which knows the period status
    /// of `obligation_date`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad amounts, dates, direction, lines or
    /// installments, and for an unusable party.
    pub fn prepare_create(
        input: CreateObligationInput,
        party: &Party,
    ) -> Result<NewObligation, LedgerError> {
        ensure_positive_amount(input.total_amount)?;

        if party.id != input.party_id {
            return Err(LedgerError::MissingParty(format!(
                "{} obligation",
                input.obligation_type
            )));
        }
        party.ensure_usable(input.entity_id)?;

        if let Some(due_date) = input.due_date {
            if due_date < input.obligation_date {
                return Err(LedgerError::Validation(format!(
                    "due date {due_date} is before obligation date {}",
                    input.obligation_date
                )));
            }
        }

        let direction = Self::resolve_direction(input.obligation_type, input.direction)?;

        let id = ObligationId::new();
        let lines = input
            .lines
            .iter()
            .zip(1..)
            .map(|(line, line_no)| Self::compute_line(line_no, line))
            .collect::<Result<Vec<_>, _>>()?;
        let installments = Self::build_installments(
            id,
            input.obligation_date,
            input.total_amount,
            &input.installments,
        )?;

        Ok(NewObligation {
            id,
            entity_id: input.entity_id,
            branch_id: input.branch_id,
            obligation_type: input.obligation_type,
            direction,
            party_id: input.party_id,
            obligation_date: input.obligation_date,
            due_date: input.due_date,
            total_amount: input.total_amount,
            category_id: input.category_id,
            status: if input.as_draft {
                ObligationStatus::Draft
            } else {
                ObligationStatus::Pending
            },
            reversed_obligation_id: None,
            source: input.source,
            reference: input.reference,
            description: input.description,
            notes: input.notes,
            status_reason: None,
            lines,
            installments,
        })
    }

    /// Resolves the direction from the type default and the requested value.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DirectionMismatch`] when the request contradicts
    /// the type, or when the type has no default and none was given.
    pub fn resolve_direction(
        obligation_type: ObligationType,
        requested: Option<Direction>,
    ) -> Result<Direction, LedgerError> {
        match (obligation_type.default_direction(), requested) {
            (Some(default), None) => Ok(default),
            (Some(default), Some(requested)) if default == requested => Ok(default),
            (Some(default), Some(requested)) => Err(LedgerError::DirectionMismatch(format!(
                "{obligation_type} is {default}, not {requested}"
            ))),
            (None, Some(requested)) => Ok(requested),
            (None, None) => Err(LedgerError::DirectionMismatch(format!(
                "{obligation_type} requires an explicit direction"
            ))),
        }
    }

    /// Computes one itemized line.
    ///
    /// `subtotal = qty * price * (1 - discount% / 100)`, `tax = subtotal * tax% / 100`,
    /// both rounded to money scale; `total = subtotal + tax`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] for negative quantities or prices,
    /// or percentages out of range.
    pub fn compute_line(
        line_no: i32,
        input: &ObligationLineInput,
    ) -> Result<ObligationLine, LedgerError> {
        if input.quantity <= Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "line {line_no}: quantity must be positive"
            )));
        }
        if input.unit_price < Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "line {line_no}: unit price must not be negative"
            )));
        }
        if input.discount_percent < Decimal::ZERO || input.discount_percent > HUNDRED {
            return Err(LedgerError::Validation(format!(
                "line {line_no}: discount must be between 0 and 100"
            )));
        }
        if input.tax_percent < Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "line {line_no}: tax must not be negative"
            )));
        }

        let gross = input.quantity * input.unit_price;
        let subtotal = round_money(gross * (HUNDRED - input.discount_percent) / HUNDRED);
        let tax = round_money(subtotal * input.tax_percent / HUNDRED);

        Ok(ObligationLine {
            id: ObligationLineId::new(),
            line_no,
            description: input.description.clone(),
            quantity: input.quantity,
            unit_price: input.unit_price,
            discount_percent: input.discount_percent,
            tax_percent: input.tax_percent,
            subtotal,
            tax,
            total: subtotal + tax,
        })
    }

    /// Builds the installment schedule.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a part is not positive, falls due
    /// before the obligation date, or the parts do not sum to the total
    /// within 0.01.
    pub fn build_installments(
        obligation_id: ObligationId,
        obligation_date: chrono::NaiveDate,
        total_amount: Decimal,
        inputs: &[InstallmentInput],
    ) -> Result<Vec<Installment>, LedgerError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut installments = Vec::with_capacity(inputs.len());
        for (input, sequence_no) in inputs.iter().zip(1..) {
            ensure_positive_amount(input.amount)?;
            if input.due_date < obligation_date {
                return Err(LedgerError::Validation(format!(
                    "installment {sequence_no} falls due before the obligation date"
                )));
            }
            installments.push(Installment {
                id: InstallmentId::new(),
                obligation_id,
                sequence_no,
                due_date: input.due_date,
                amount: input.amount,
            });
        }

        let scheduled: Decimal = installments.iter().map(|i| i.amount).sum();
        if (scheduled - total_amount).abs() > ALLOCATION_TOLERANCE {
            return Err(LedgerError::Validation(format!(
                "installments sum to {scheduled}, expected {total_amount}"
            )));
        }

        Ok(installments)
    }

    /// Unpaid remainder, never negative.
    #[must_use]
    pub fn unpaid(total_amount: Decimal, allocated: Decimal) -> Decimal {
        non_negative(total_amount - allocated)
    }

    /// Status implied by the live sum of active allocations.
    ///
    /// Terminal statuses are kept. A draft stays draft until something is
    /// allocated to it.
    #[must_use]
    pub fn derive_status(
        current: ObligationStatus,
        total_amount: Decimal,
        allocated: Decimal,
    ) -> ObligationStatus {
        if current.is_terminal() {
            return current;
        }
        if allocated <= Decimal::ZERO {
            return if current == ObligationStatus::Draft {
                ObligationStatus::Draft
            } else {
                ObligationStatus::Pending
            };
        }
        if allocated >= total_amount - SETTLED_TOLERANCE {
            ObligationStatus::Settled
        } else {
            ObligationStatus::Partial
        }
    }

    /// Returns true if header fields may be changed right now.
    #[must_use]
    pub fn can_modify(
        obligation: &Obligation,
        active_allocations: u64,
        period_status: PeriodStatus,
    ) -> bool {
        obligation.status.is_editable() && active_allocations == 0 && period_status.is_open()
    }

    /// Validates a patch against the obligation's state.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] when the status or an
    /// active allocation forbids edits, [`LedgerError::LockedPeriod`] when the
    /// period is frozen, and [`LedgerError::Validation`] for a bad due date.
    pub fn validate_update(
        obligation: &Obligation,
        patch: &ObligationPatch,
        active_allocations: u64,
        period_status: PeriodStatus,
    ) -> Result<(), LedgerError> {
        if !obligation.status.is_editable() {
            return Err(LedgerError::transition(format!(
                "{} is {} and can no longer be edited",
                obligation.number, obligation.status
            )));
        }
        if active_allocations > 0 {
            return Err(LedgerError::transition(format!(
                "{} has active allocations and can no longer be edited",
                obligation.number
            )));
        }
        assert_open_period(
            &obligation.number,
            obligation.obligation_date,
            period_status,
            Mutation::Update,
        )?;
        if let Some(Some(due_date)) = patch.due_date {
            if due_date < obligation.obligation_date {
                return Err(LedgerError::Validation(format!(
                    "due date {due_date} is before obligation date {}",
                    obligation.obligation_date
                )));
            }
        }
        Ok(())
    }

    /// Applies a validated patch.
    pub fn apply_patch(obligation: &mut Obligation, patch: ObligationPatch) {
        if let Some(due_date) = patch.due_date {
            obligation.due_date = due_date;
        }
        if let Some(category_id) = patch.category_id {
            obligation.category_id = category_id;
        }
        if let Some(reference) = patch.reference {
            obligation.reference = reference;
        }
        if let Some(description) = patch.description {
            obligation.description = description;
        }
        if let Some(notes) = patch.notes {
            obligation.notes = notes;
        }
    }

    /// Validates cancellation. Allowed in any period.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] for terminal records or
    /// records with active allocations, [`LedgerError::Validation`] for an
    /// empty reason.
    pub fn validate_cancel(
        obligation: &Obligation,
        active_allocations: u64,
        reason: &str,
    ) -> Result<(), LedgerError> {
        if reason.trim().is_empty() {
            return Err(LedgerError::Validation(
                "a cancellation reason is required".to_string(),
            ));
        }
        if obligation.status.is_terminal() {
            return Err(LedgerError::transition(format!(
                "{} is already {}",
                obligation.number, obligation.status
            )));
        }
        if active_allocations > 0 {
            return Err(LedgerError::transition(format!(
                "{} has {active_allocations} active allocation(s); cancel them first",
                obligation.number
            )));
        }
        Ok(())
    }

    /// Validates draft → pending.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] unless the obligation
    /// is a draft, and [`LedgerError::LockedPeriod`] for a frozen period.
    pub fn validate_finalize(
        obligation: &Obligation,
        period_status: PeriodStatus,
    ) -> Result<(), LedgerError> {
        if obligation.status != ObligationStatus::Draft {
            return Err(LedgerError::transition(format!(
                "only drafts can be finalized; {} is {}",
                obligation.number, obligation.status
            )));
        }
        assert_open_period(
            &obligation.number,
            obligation.obligation_date,
            period_status,
            Mutation::Update,
        )
    }

    /// Validates physical deletion.
    ///
    /// `allocations` counts rows of any status: cancelled allocations are
    /// history too.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] for records with
    /// allocations or reversal links and [`LedgerError::LockedPeriod`] for a
    /// frozen period.
    pub fn validate_delete(
        obligation: &Obligation,
        allocations: u64,
        period_status: PeriodStatus,
    ) -> Result<(), LedgerError> {
        if obligation.is_reversal() || obligation.has_reversal() {
            return Err(LedgerError::transition(format!(
                "{} is part of a reversal pair and cannot be deleted",
                obligation.number
            )));
        }
        if allocations > 0 {
            return Err(LedgerError::transition(format!(
                "{} has allocation history and cannot be deleted",
                obligation.number
            )));
        }
        assert_open_period(
            &obligation.number,
            obligation.obligation_date,
            period_status,
            Mutation::Delete,
        )
    }

    /// Checks that allocations may target the obligation.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] for cancelled or
    /// reversed obligations.
    pub fn ensure_allocatable(obligation: &Obligation) -> Result<(), LedgerError> {
        if obligation.status.is_terminal() {
            return Err(LedgerError::transition(format!(
                "{} is {} and cannot receive allocations",
                obligation.number, obligation.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use obligo_shared::types::{EntityId, PartyId};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use crate::party::PartyType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn customer(entity_id: EntityId) -> Party {
        Party {
            id: PartyId::new(),
            entity_id,
            branch_id: None,
            party_type: PartyType::Customer,
            code: "C-001".to_string(),
            name: "Acme".to_string(),
            is_active: true,
        }
    }

    fn input(party: &Party, total: Decimal) -> CreateObligationInput {
        CreateObligationInput {
            entity_id: party.entity_id,
            branch_id: None,
            obligation_type: ObligationType::CustomerInvoice,
            direction: None,
            party_id: party.id,
            obligation_date: date(2025, 1, 10),
            due_date: Some(date(2025, 2, 10)),
            total_amount: total,
            category_id: None,
            source: None,
            reference: None,
            description: None,
            notes: None,
            as_draft: false,
            lines: Vec::new(),
            installments: Vec::new(),
        }
    }

    fn obligation(status: ObligationStatus) -> Obligation {
        Obligation {
            id: ObligationId::new(),
            entity_id: EntityId::new(),
            branch_id: None,
            number: "SF2025-000001".to_string(),
            obligation_type: ObligationType::CustomerInvoice,
            direction: Direction::Receivable,
            party_id: PartyId::new(),
            obligation_date: date(2025, 1, 10),
            due_date: None,
            total_amount: dec!(1000.00),
            category_id: None,
            status,
            reversed_obligation_id: None,
            reversal_obligation_id: None,
            source: None,
            reference: None,
            description: None,
            notes: None,
            status_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_prepare_create_defaults() {
        let party = customer(EntityId::new());
        let new = ObligationService::prepare_create(input(&party, dec!(1000.00)), &party).unwrap();
        assert_eq!(new.direction, Direction::Receivable);
        assert_eq!(new.status, ObligationStatus::Pending);
        assert_eq!(new.sequence_key().sub_type_scope(), "customer_invoice");
        assert_eq!(new.sequence_key().year, 2025);
        assert_eq!(new.prefix(), "SF");
    }

    #[test]
    fn test_prepare_create_as_draft() {
        let party = customer(EntityId::new());
        let mut req = input(&party, dec!(10));
        req.as_draft = true;
        let new = ObligationService::prepare_create(req, &party).unwrap();
        assert_eq!(new.status, ObligationStatus::Draft);
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-5))]
    #[case(dec!(10.001))]
    fn test_prepare_create_rejects_bad_amounts(#[case] total: Decimal) {
        let party = customer(EntityId::new());
        let err = ObligationService::prepare_create(input(&party, total), &party).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn test_prepare_create_rejects_due_before_date() {
        let party = customer(EntityId::new());
        let mut req = input(&party, dec!(10));
        req.due_date = Some(date(2025, 1, 9));
        assert!(matches!(
            ObligationService::prepare_create(req, &party),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_prepare_create_rejects_foreign_party() {
        let party = customer(EntityId::new());
        let mut req = input(&party, dec!(10));
        req.entity_id = EntityId::new();
        assert!(matches!(
            ObligationService::prepare_create(req, &party),
            Err(LedgerError::EntityMismatch { .. })
        ));
    }

    #[test]
    fn test_other_type_requires_direction() {
        assert!(matches!(
            ObligationService::resolve_direction(ObligationType::Other, None),
            Err(LedgerError::DirectionMismatch(_))
        ));
        assert_eq!(
            ObligationService::resolve_direction(ObligationType::Other, Some(Direction::Payable))
                .unwrap(),
            Direction::Payable
        );
        assert!(matches!(
            ObligationService::resolve_direction(
                ObligationType::SupplierInvoice,
                Some(Direction::Receivable)
            ),
            Err(LedgerError::DirectionMismatch(_))
        ));
    }

    #[test]
    fn test_compute_line() {
        let line = ObligationService::compute_line(
            1,
            &ObligationLineInput {
                description: "Widgets".to_string(),
                quantity: dec!(3),
                unit_price: dec!(33.35),
                discount_percent: dec!(10),
                tax_percent: dec!(11),
            },
        )
        .unwrap();
        // 3 * 33.35 = 100.05, less 10% = 90.045 -> 90.04 (banker's)
        assert_eq!(line.subtotal, dec!(90.04));
        assert_eq!(line.tax, dec!(9.90));
        assert_eq!(line.total, dec!(99.94));
    }

    #[test]
    fn test_compute_line_rejects_discount_over_hundred() {
        let result = ObligationService::compute_line(
            2,
            &ObligationLineInput {
                description: "Bad".to_string(),
                quantity: dec!(1),
                unit_price: dec!(1),
                discount_percent: dec!(101),
                tax_percent: dec!(0),
            },
        );
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_installments_must_sum_to_total() {
        let id = ObligationId::new();
        let ok = ObligationService::build_installments(
            id,
            date(2025, 1, 1),
            dec!(100.00),
            &[
                InstallmentInput { due_date: date(2025, 2, 1), amount: dec!(33.33) },
                InstallmentInput { due_date: date(2025, 3, 1), amount: dec!(33.33) },
                InstallmentInput { due_date: date(2025, 4, 1), amount: dec!(33.33) },
            ],
        )
        .unwrap();
        assert_eq!(ok.len(), 3);
        assert_eq!(ok[2].sequence_no, 3);

        let err = ObligationService::build_installments(
            id,
            date(2025, 1, 1),
            dec!(100.00),
            &[InstallmentInput { due_date: date(2025, 2, 1), amount: dec!(90.00) }],
        );
        assert!(matches!(err, Err(LedgerError::Validation(_))));
    }

    #[rstest]
    #[case(ObligationStatus::Pending, dec!(0), ObligationStatus::Pending)]
    #[case(ObligationStatus::Pending, dec!(600), ObligationStatus::Partial)]
    #[case(ObligationStatus::Partial, dec!(1000), ObligationStatus::Settled)]
    #[case(ObligationStatus::Partial, dec!(999.9995), ObligationStatus::Settled)]
    #[case(ObligationStatus::Partial, dec!(999.99), ObligationStatus::Partial)]
    #[case(ObligationStatus::Settled, dec!(0), ObligationStatus::Pending)]
    #[case(ObligationStatus::Draft, dec!(0), ObligationStatus::Draft)]
    #[case(ObligationStatus::Draft, dec!(100), ObligationStatus::Partial)]
    #[case(ObligationStatus::Cancelled, dec!(0), ObligationStatus::Cancelled)]
    #[case(ObligationStatus::Reversed, dec!(0), ObligationStatus::Reversed)]
    fn test_derive_status(
        #[case] current: ObligationStatus,
        #[case] allocated: Decimal,
        #[case] expected: ObligationStatus,
    ) {
        assert_eq!(
            ObligationService::derive_status(current, dec!(1000.00), allocated),
            expected
        );
    }

    #[test]
    fn test_unpaid_never_negative() {
        assert_eq!(ObligationService::unpaid(dec!(1000), dec!(600)), dec!(400));
        assert_eq!(ObligationService::unpaid(dec!(1000), dec!(1000.01)), dec!(0));
    }

    #[test]
    fn test_can_modify() {
        let pending = obligation(ObligationStatus::Pending);
        assert!(ObligationService::can_modify(&pending, 0, PeriodStatus::Open));
        assert!(!ObligationService::can_modify(&pending, 1, PeriodStatus::Open));
        assert!(!ObligationService::can_modify(&pending, 0, PeriodStatus::Locked));
        let partial = obligation(ObligationStatus::Partial);
        assert!(!ObligationService::can_modify(&partial, 0, PeriodStatus::Open));
    }

    #[test]
    fn test_update_in_locked_period_fails() {
        let pending = obligation(ObligationStatus::Pending);
        let err = ObligationService::validate_update(
            &pending,
            &ObligationPatch::default(),
            0,
            PeriodStatus::Locked,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::LockedPeriod { .. }));
    }

    #[test]
    fn test_apply_patch_clears_and_sets() {
        let mut ob = obligation(ObligationStatus::Pending);
        ob.reference = Some("PO-1".to_string());
        ObligationService::apply_patch(
            &mut ob,
            ObligationPatch {
                due_date: Some(Some(date(2025, 3, 1))),
                reference: Some(None),
                ..ObligationPatch::default()
            },
        );
        assert_eq!(ob.due_date, Some(date(2025, 3, 1)));
        assert_eq!(ob.reference, None);
    }

    #[test]
    fn test_cancel_rules() {
        let pending = obligation(ObligationStatus::Pending);
        assert!(ObligationService::validate_cancel(&pending, 0, "duplicate").is_ok());
        assert!(matches!(
            ObligationService::validate_cancel(&pending, 1, "duplicate"),
            Err(LedgerError::InvalidStateTransition(_))
        ));
        assert!(matches!(
            ObligationService::validate_cancel(&pending, 0, "  "),
            Err(LedgerError::Validation(_))
        ));
        let cancelled = obligation(ObligationStatus::Cancelled);
        assert!(matches!(
            ObligationService::validate_cancel(&cancelled, 0, "again"),
            Err(LedgerError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_finalize_only_from_draft() {
        let draft = obligation(ObligationStatus::Draft);
        assert!(ObligationService::validate_finalize(&draft, PeriodStatus::Open).is_ok());
        assert!(matches!(
            ObligationService::validate_finalize(&draft, PeriodStatus::Closed),
            Err(LedgerError::LockedPeriod { .. })
        ));
        let pending = obligation(ObligationStatus::Pending);
        assert!(matches!(
            ObligationService::validate_finalize(&pending, PeriodStatus::Open),
            Err(LedgerError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_delete_rules() {
        let mut ob = obligation(ObligationStatus::Cancelled);
        assert!(ObligationService::validate_delete(&ob, 0, PeriodStatus::Open).is_ok());
        assert!(ObligationService::validate_delete(&ob, 1, PeriodStatus::Open).is_err());
        assert!(matches!(
            ObligationService::validate_delete(&ob, 0, PeriodStatus::Locked),
            Err(LedgerError::LockedPeriod { .. })
        ));
        ob.reversal_obligation_id = Some(ObligationId::new());
        assert!(matches!(
            ObligationService::validate_delete(&ob, 0, PeriodStatus::Open),
            Err(LedgerError::InvalidStateTransition(_))
        ));
    }
}
