//! Settlement validation.

use rust_decimal::Decimal;

use obligo_shared::types::SettlementId;
use obligo_shared::types::money::{has_money_scale, non_negative};

use crate::error::{LedgerError, ensure_positive_amount};
use crate::party::Party;
use crate::period::{Mutation, PeriodStatus, assert_open_period};
use crate::settlement::types::{
    CreateSettlementInput, FlowDirection, NewSettlement, Settlement, SettlementPatch,
    SettlementStatus, SettlementType,
};

/// Stateless service for settlement rules.
pub struct SettlementService;

impl SettlementService {
    /// Validates a create request and builds the record to insert.
    ///
    /// `party` is the looked-up counterparty when the input names one.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad amounts, accounts, direction or
    /// party.
    pub fn prepare_create(
        input: CreateSettlementInput,
        party: Option<&Party>,
    ) -> Result<NewSettlement, LedgerError> {
        ensure_positive_amount(input.amount)?;
        let net_amount = Self::net_amount(input.amount, input.fee_amount, input.net_amount)?;

        Self::validate_accounts(&input)?;
        Self::validate_party(&input, party)?;
        let direction = Self::resolve_direction(input.settlement_type, input.direction)?;

        Ok(NewSettlement {
            id: SettlementId::new(),
            entity_id: input.entity_id,
            branch_id: input.branch_id,
            settlement_type: input.settlement_type,
            direction,
            party_id: input.party_id,
            account: input.account,
            destination: input.destination,
            settlement_date: input.settlement_date,
            amount: input.amount,
            fee_amount: input.fee_amount,
            net_amount,
            status: if input.confirm {
                SettlementStatus::Confirmed
            } else {
                SettlementStatus::Draft
            },
            reversed_settlement_id: None,
            reference: input.reference,
            description: input.description,
            notes: input.notes,
            status_reason: None,
        })
    }

    /// Computes `amount - fee`, checking a caller-supplied net amount.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] for a negative fee, a fee above the
    /// amount, or a mismatching net amount.
    pub fn net_amount(
        amount: Decimal,
        fee_amount: Decimal,
        supplied: Option<Decimal>,
    ) -> Result<Decimal, LedgerError> {
        if fee_amount < Decimal::ZERO {
            return Err(LedgerError::Validation(
                "fee must not be negative".to_string(),
            ));
        }
        if !has_money_scale(fee_amount) {
            return Err(LedgerError::ExcessivePrecision(fee_amount));
        }
        if fee_amount > amount {
            return Err(LedgerError::Validation(format!(
                "fee {fee_amount} exceeds amount {amount}"
            )));
        }
        let net = amount - fee_amount;
        if let Some(supplied) = supplied {
            if supplied != net {
                return Err(LedgerError::Validation(format!(
                    "net amount {supplied} does not equal amount minus fee ({net})"
                )));
            }
        }
        Ok(net)
    }

    fn validate_accounts(input: &CreateSettlementInput) -> Result<(), LedgerError> {
        if let Some(required) = input.settlement_type.required_account() {
            if input.account.kind() != required {
                return Err(LedgerError::InvalidAccount(format!(
                    "{} settlements must use a {required:?} account, got {}",
                    input.settlement_type, input.account
                )));
            }
        }

        match (input.settlement_type.is_transfer(), input.destination) {
            (true, None) => Err(LedgerError::InvalidAccount(
                "a transfer requires a destination account".to_string(),
            )),
            (true, Some(destination)) if destination == input.account => {
                Err(LedgerError::InvalidAccount(
                    "a transfer cannot move money to its own source account".to_string(),
                ))
            }
            (false, Some(_)) => Err(LedgerError::InvalidAccount(format!(
                "{} settlements take no destination account",
                input.settlement_type
            ))),
            _ => Ok(()),
        }
    }

    fn validate_party(
        input: &CreateSettlementInput,
        party: Option<&Party>,
    ) -> Result<(), LedgerError> {
        if input.settlement_type.is_transfer() {
            if input.party_id.is_some() {
                return Err(LedgerError::Validation(
                    "transfers have no counterparty".to_string(),
                ));
            }
            return Ok(());
        }

        match (input.party_id, party) {
            (Some(party_id), Some(party)) if party.id == party_id => {
                party.ensure_usable(input.entity_id)
            }
            _ => Err(LedgerError::MissingParty(format!(
                "{} settlement",
                input.settlement_type
            ))),
        }
    }

    /// Resolves the direction from the type default and the requested value.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DirectionMismatch`] when the request contradicts
    /// the type, or when the type has no default and none was given.
    pub fn resolve_direction(
        settlement_type: SettlementType,
        requested: Option<FlowDirection>,
    ) -> Result<FlowDirection, LedgerError> {
        match (settlement_type.default_direction(), requested) {
            (Some(default), None) => Ok(default),
            (Some(default), Some(requested)) if default == requested => Ok(default),
            (Some(default), Some(requested)) => Err(LedgerError::DirectionMismatch(format!(
                "{settlement_type} is {default}, not {requested}"
            ))),
            (None, Some(requested)) => Ok(requested),
            (None, None) => Err(LedgerError::DirectionMismatch(format!(
                "{settlement_type} requires an explicit direction"
            ))),
        }
    }

    /// Unallocated remainder, never negative.
    #[must_use]
    pub fn unallocated(amount: Decimal, allocated: Decimal) -> Decimal {
        non_negative(amount - allocated)
    }

    /// Validates a patch against the settlement's state.
    ///
    /// Only the current date's period is checked here; when the patch moves
    /// the settlement date the caller also checks the new date's period.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] for terminal records or
    /// a date change outside draft, [`LedgerError::LockedPeriod`] for a frozen
    /// period.
    pub fn validate_update(
        settlement: &Settlement,
        patch: &SettlementPatch,
        period_status: PeriodStatus,
    ) -> Result<(), LedgerError> {
        if settlement.status.is_terminal() {
            return Err(LedgerError::transition(format!(
                "{} is {} and can no longer be edited",
                settlement.number, settlement.status
            )));
        }
        if patch.settlement_date.is_some() && settlement.status != SettlementStatus::Draft {
            return Err(LedgerError::transition(format!(
                "the date of {} can only change while it is a draft",
                settlement.number
            )));
        }
        assert_open_period(
            &settlement.number,
            settlement.settlement_date,
            period_status,
            Mutation::Update,
        )
    }

    /// Applies a validated patch.
    pub fn apply_patch(settlement: &mut Settlement, patch: SettlementPatch) {
        if let Some(settlement_date) = patch.settlement_date {
            settlement.settlement_date = settlement_date;
        }
        if let Some(reference) = patch.reference {
            settlement.reference = reference;
        }
        if let Some(description) = patch.description {
            settlement.description = description;
        }
        if let Some(notes) = patch.notes {
            settlement.notes = notes;
        }
    }

    /// Validates draft → confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] unless the settlement
    /// is a draft, and [`LedgerError::LockedPeriod`] for a frozen period.
    pub fn validate_confirm(
        settlement: &Settlement,
        period_status: PeriodStatus,
    ) -> Result<(), LedgerError> {
        if settlement.status != SettlementStatus::Draft {
            return Err(LedgerError::transition(format!(
                "only drafts can be confirmed; {} is {}",
                settlement.number, settlement.status
            )));
        }
        assert_open_period(
            &settlement.number,
            settlement.settlement_date,
            period_status,
            Mutation::Update,
        )
    }

    /// Validates cancellation. Allowed in any period.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] for terminal records or
    /// records with active allocations, [`LedgerError::Validation`] for an
    /// empty reason.
    pub fn validate_cancel(
        settlement: &Settlement,
        active_allocations: u64,
        reason: &str,
    ) -> Result<(), LedgerError> {
        if reason.trim().is_empty() {
            return Err(LedgerError::Validation(
                "a cancellation reason is required".to_string(),
            ));
        }
        if settlement.status.is_terminal() {
            return Err(LedgerError::transition(format!(
                "{} is already {}",
                settlement.number, settlement.status
            )));
        }
        if active_allocations > 0 {
            return Err(LedgerError::transition(format!(
                "{} has {active_allocations} active allocation(s); cancel them first",
                settlement.number
            )));
        }
        Ok(())
    }

    /// Validates physical deletion.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] for records with
    /// allocations or reversal links and [`LedgerError::LockedPeriod`] for a
    /// frozen period.
    pub fn validate_delete(
        settlement: &Settlement,
        allocations: u64,
        period_status: PeriodStatus,
    ) -> Result<(), LedgerError> {
        if settlement.is_reversal() || settlement.has_reversal() {
            return Err(LedgerError::transition(format!(
                "{} is part of a reversal pair and cannot be deleted",
                settlement.number
            )));
        }
        if allocations > 0 {
            return Err(LedgerError::transition(format!(
                "{} has allocation history and cannot be deleted",
                settlement.number
            )));
        }
        assert_open_period(
            &settlement.number,
            settlement.settlement_date,
            period_status,
            Mutation::Delete,
        )
    }

    /// Checks that the settlement can fund allocations.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] unless confirmed.
    pub fn ensure_allocatable(settlement: &Settlement) -> Result<(), LedgerError> {
        if settlement.status != SettlementStatus::Confirmed {
            return Err(LedgerError::transition(format!(
                "{} is {}; only confirmed settlements can be allocated",
                settlement.number, settlement.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use obligo_shared::types::{BankAccountId, CashboxId, EntityId, PartyId};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use crate::party::PartyType;
    use crate::settlement::types::AccountRef;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()
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

    fn cash_in(party: &Party) -> CreateSettlementInput {
        CreateSettlementInput {
            entity_id: party.entity_id,
            branch_id: None,
            settlement_type: SettlementType::CashIn,
            direction: None,
            party_id: Some(party.id),
            account: AccountRef::Cashbox(CashboxId::new()),
            destination: None,
            settlement_date: date(),
            amount: dec!(600.00),
            fee_amount: Decimal::ZERO,
            net_amount: None,
            reference: None,
            description: None,
            notes: None,
            confirm: true,
        }
    }

    fn settlement(status: SettlementStatus) -> Settlement {
        Settlement {
            id: SettlementId::new(),
            entity_id: EntityId::new(),
            branch_id: None,
            number: "CI2025-000001".to_string(),
            settlement_type: SettlementType::CashIn,
            direction: FlowDirection::In,
            party_id: Some(PartyId::new()),
            account: AccountRef::Cashbox(CashboxId::new()),
            destination: None,
            settlement_date: date(),
            amount: dec!(600.00),
            fee_amount: Decimal::ZERO,
            net_amount: dec!(600.00),
            status,
            reversed_settlement_id: None,
            reversal_settlement_id: None,
            reference: None,
            description: None,
            notes: None,
            status_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_prepare_cash_in() {
        let party = customer(EntityId::new());
        let new = SettlementService::prepare_create(cash_in(&party), Some(&party)).unwrap();
        assert_eq!(new.direction, FlowDirection::In);
        assert_eq!(new.status, SettlementStatus::Confirmed);
        assert_eq!(new.net_amount, dec!(600.00));
        assert_eq!(new.prefix(), "CI");
        assert_eq!(new.sequence_key().sub_type_scope(), "cash_in");
    }

    #[test]
    fn test_cash_type_requires_cashbox() {
        let party = customer(EntityId::new());
        let mut input = cash_in(&party);
        input.account = AccountRef::Bank(BankAccountId::new());
        assert!(matches!(
            SettlementService::prepare_create(input, Some(&party)),
            Err(LedgerError::InvalidAccount(_))
        ));
    }

    #[test]
    fn test_party_required_except_transfer() {
        let party = customer(EntityId::new());
        let mut input = cash_in(&party);
        input.party_id = None;
        assert!(matches!(
            SettlementService::prepare_create(input, None),
            Err(LedgerError::MissingParty(_))
        ));

        let source = AccountRef::Cashbox(CashboxId::new());
        let transfer = CreateSettlementInput {
            settlement_type: SettlementType::Transfer,
            party_id: None,
            account: source,
            destination: Some(AccountRef::Bank(BankAccountId::new())),
            ..cash_in(&party)
        };
        let new = SettlementService::prepare_create(transfer, None).unwrap();
        assert_eq!(new.direction, FlowDirection::Out);
        assert_eq!(new.party_id, None);
    }

    #[test]
    fn test_transfer_destination_rules() {
        let party = customer(EntityId::new());
        let source = AccountRef::Cashbox(CashboxId::new());
        let base = CreateSettlementInput {
            settlement_type: SettlementType::Transfer,
            party_id: None,
            account: source,
            destination: None,
            ..cash_in(&party)
        };
        assert!(matches!(
            SettlementService::prepare_create(base.clone(), None),
            Err(LedgerError::InvalidAccount(_))
        ));
        let to_self = CreateSettlementInput {
            destination: Some(source),
            ..base
        };
        assert!(matches!(
            SettlementService::prepare_create(to_self, None),
            Err(LedgerError::InvalidAccount(_))
        ));

        let mut with_destination = cash_in(&party);
        with_destination.destination = Some(AccountRef::Cashbox(CashboxId::new()));
        assert!(matches!(
            SettlementService::prepare_create(with_destination, Some(&party)),
            Err(LedgerError::InvalidAccount(_))
        ));
    }

    #[rstest]
    #[case(dec!(100), dec!(2.50), None, Ok(dec!(97.50)))]
    #[case(dec!(100), dec!(0), Some(dec!(100)), Ok(dec!(100)))]
    #[case(dec!(100), dec!(-1), None, Err(()))]
    #[case(dec!(100), dec!(100.01), None, Err(()))]
    #[case(dec!(100), dec!(1), Some(dec!(98)), Err(()))]
    fn test_net_amount(
        #[case] amount: Decimal,
        #[case] fee: Decimal,
        #[case] supplied: Option<Decimal>,
        #[case] expected: Result<Decimal, ()>,
    ) {
        let result = SettlementService::net_amount(amount, fee, supplied).map_err(|_| ());
        assert_eq!(result, expected);
    }

    #[test]
    fn test_internal_offset_requires_direction() {
        assert!(SettlementService::resolve_direction(SettlementType::InternalOffset, None).is_err());
        assert_eq!(
            SettlementService::resolve_direction(
                SettlementType::InternalOffset,
                Some(FlowDirection::In)
            )
            .unwrap(),
            FlowDirection::In
        );
    }

    #[test]
    fn test_date_change_only_in_draft() {
        let patch = SettlementPatch {
            settlement_date: Some(date()),
            ..SettlementPatch::default()
        };
        assert!(
            SettlementService::validate_update(
                &settlement(SettlementStatus::Draft),
                &patch,
                PeriodStatus::Open
            )
            .is_ok()
        );
        assert!(matches!(
            SettlementService::validate_update(
                &settlement(SettlementStatus::Confirmed),
                &patch,
                PeriodStatus::Open
            ),
            Err(LedgerError::InvalidStateTransition(_))
        ));
        assert!(
            SettlementService::validate_update(
                &settlement(SettlementStatus::Confirmed),
                &SettlementPatch::default(),
                PeriodStatus::Open
            )
            .is_ok()
        );
    }

    #[test]
    fn test_confirm_and_allocatable() {
        let draft = settlement(SettlementStatus::Draft);
        assert!(SettlementService::validate_confirm(&draft, PeriodStatus::Open).is_ok());
        assert!(SettlementService::ensure_allocatable(&draft).is_err());
        let confirmed = settlement(SettlementStatus::Confirmed);
        assert!(SettlementService::validate_confirm(&confirmed, PeriodStatus::Open).is_err());
        assert!(SettlementService::ensure_allocatable(&confirmed).is_ok());
    }

    #[test]
    fn test_cancel_blocked_by_active_allocation() {
        let confirmed = settlement(SettlementStatus::Confirmed);
        assert!(matches!(
            SettlementService::validate_cancel(&confirmed, 2, "wrong account"),
            Err(LedgerError::InvalidStateTransition(_))
        ));
        assert!(SettlementService::validate_cancel(&confirmed, 0, "wrong account").is_ok());
    }

    #[test]
    fn test_unallocated_never_negative() {
        assert_eq!(SettlementService::unallocated(dec!(500), dec!(500.01)), dec!(0));
        assert_eq!(SettlementService::unallocated(dec!(500), dec!(100)), dec!(400));
    }
}
