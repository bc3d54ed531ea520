//! Conversions between database models and domain types.

use chrono::Utc;

use obligo_core::allocation::{Allocation, AllocationStatus};
use obligo_core::balance::CashAccount;
use obligo_core::error::LedgerError;
use obligo_core::obligation::{
    Direction, Installment, Obligation, ObligationLine, ObligationStatus, ObligationType,
    SourceKind, SourceRef,
};
use obligo_core::party::{Party, PartyType};
use obligo_core::period::{AccountingPeriod, PeriodStatus};
use obligo_core::settlement::{AccountRef, FlowDirection, Settlement, SettlementStatus, SettlementType};
use obligo_shared::types::{
    AccountingPeriodId, AllocationId, BankAccountId, BranchId, CashboxId, CategoryId, EntityId,
    InstallmentId, ObligationId, ObligationLineId, PartyId, SettlementId, UserId,
};

use crate::entities::sea_orm_active_enums as db;
use crate::entities::{
    accounting_periods, allocations, bank_accounts, cashboxes, obligation_installments,
    obligation_lines, obligations, parties, settlements,
};

/// Generates `From` impls both ways between a database enum and its domain twin.
macro_rules! bridge_enum {
    ($db:ident => $domain:ident { $($variant:ident),+ $(,)? }) => {
        impl From<db::$db> for $domain {
            fn from(value: db::$db) -> Self {
                match value {
                    $(db::$db::$variant => Self::$variant,)+
                }
            }
        }

        impl From<$domain> for db::$db {
            fn from(value: $domain) -> Self {
                match value {
                    $($domain::$variant => Self::$variant,)+
                }
            }
        }
    };
}

bridge_enum!(PartyType => PartyType { Customer, Supplier, Employee, Other });
bridge_enum!(ObligationType => ObligationType {
    CustomerInvoice,
    SupplierInvoice,
    PayrollDue,
    OvertimeDue,
    AdvanceGiven,
    AdvanceReceived,
    ExpenseDue,
    IncomeDue,
    Other,
});
bridge_enum!(ObligationDirection => Direction { Receivable, Payable });
bridge_enum!(ObligationStatus => ObligationStatus {
    Draft,
    Pending,
    Partial,
    Settled,
    Cancelled,
    Reversed,
});
bridge_enum!(SettlementType => SettlementType {
    CashIn,
    CashOut,
    BankIn,
    BankOut,
    Transfer,
    ChequeIn,
    ChequeOut,
    InternalOffset,
    Other,
});
bridge_enum!(SettlementDirection => FlowDirection { In, Out });
bridge_enum!(SettlementStatus => SettlementStatus { Draft, Confirmed, Cancelled, Reversed });
bridge_enum!(AllocationStatus => AllocationStatus { Active, Cancelled });
bridge_enum!(PeriodStatus => PeriodStatus { Open, Locked, Closed });

pub(crate) fn party(model: parties::Model) -> Party {
    Party {
        id: PartyId::from_uuid(model.id),
        entity_id: EntityId::from_uuid(model.entity_id),
        branch_id: model.branch_id.map(BranchId::from_uuid),
        party_type: model.party_type.into(),
        code: model.code,
        name: model.name,
        is_active: model.is_active,
    }
}

pub(crate) fn period(model: accounting_periods::Model) -> Result<AccountingPeriod, LedgerError> {
    let month = u32::try_from(model.month)
        .map_err(|_| LedgerError::Internal(format!("period {} has month {}", model.id, model.month)))?;
    Ok(AccountingPeriod {
        id: AccountingPeriodId::from_uuid(model.id),
        entity_id: EntityId::from_uuid(model.entity_id),
        year: model.year,
        month,
        start_date: model.start_date,
        end_date: model.end_date,
        status: model.status.into(),
        locked_by: model.locked_by.map(UserId::from_uuid),
        locked_at: model.locked_at.map(|at| at.with_timezone(&Utc)),
        closed_by: model.closed_by.map(UserId::from_uuid),
        closed_at: model.closed_at.map(|at| at.with_timezone(&Utc)),
        notes: model.notes,
    })
}

pub(crate) fn obligation(model: obligations::Model) -> Obligation {
    let source = match (model.source_kind, model.source_id) {
        (Some(kind), Some(id)) => Some(SourceRef {
            kind: SourceKind::parse(&kind),
            id,
        }),
        _ => None,
    };

    Obligation {
        id: ObligationId::from_uuid(model.id),
        entity_id: EntityId::from_uuid(model.entity_id),
        branch_id: model.branch_id.map(BranchId::from_uuid),
        number: model.number,
        obligation_type: model.obligation_type.into(),
        direction: model.direction.into(),
        party_id: PartyId::from_uuid(model.party_id),
        obligation_date: model.obligation_date,
        due_date: model.due_date,
        total_amount: model.total_amount,
        category_id: model.category_id.map(CategoryId::from_uuid),
        status: model.status.into(),
        reversed_obligation_id: model.reversed_obligation_id.map(ObligationId::from_uuid),
        reversal_obligation_id: model.reversal_obligation_id.map(ObligationId::from_uuid),
        source,
        reference: model.reference,
        description: model.description,
        notes: model.notes,
        status_reason: model.status_reason,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn line(model: obligation_lines::Model) -> ObligationLine {
    ObligationLine {
        id: ObligationLineId::from_uuid(model.id),
        line_no: model.line_no,
        description: model.description,
        quantity: model.quantity,
        unit_price: model.unit_price,
        discount_percent: model.discount_percent,
        tax_percent: model.tax_percent,
        subtotal: model.subtotal,
        tax: model.tax,
        total: model.total,
    }
}

pub(crate) fn installment(model: obligation_installments::Model) -> Installment {
    Installment {
        id: InstallmentId::from_uuid(model.id),
        obligation_id: ObligationId::from_uuid(model.obligation_id),
        sequence_no: model.sequence_no,
        due_date: model.due_date,
        amount: model.amount,
    }
}

pub(crate) fn settlement(model: settlements::Model) -> Result<Settlement, LedgerError> {
    let account = AccountRef::from_columns(
        model.cashbox_id.map(CashboxId::from_uuid),
        model.bank_account_id.map(BankAccountId::from_uuid),
    )?
    .ok_or_else(|| LedgerError::Internal(format!("settlement {} has no account", model.number)))?;
    let destination = AccountRef::from_columns(
        model.destination_cashbox_id.map(CashboxId::from_uuid),
        model.destination_bank_account_id.map(BankAccountId::from_uuid),
    )?;

    Ok(Settlement {
        id: SettlementId::from_uuid(model.id),
        entity_id: EntityId::from_uuid(model.entity_id),
        branch_id: model.branch_id.map(BranchId::from_uuid),
        number: model.number,
        settlement_type: model.settlement_type.into(),
        direction: model.direction.into(),
        party_id: model.party_id.map(PartyId::from_uuid),
        account,
        destination,
        settlement_date: model.settlement_date,
        amount: model.amount,
        fee_amount: model.fee_amount,
        net_amount: model.net_amount,
        status: model.status.into(),
        reversed_settlement_id: model.reversed_settlement_id.map(SettlementId::from_uuid),
        reversal_settlement_id: model.reversal_settlement_id.map(SettlementId::from_uuid),
        reference: model.reference,
        description: model.description,
        notes: model.notes,
        status_reason: model.status_reason,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub(crate) fn allocation(model: allocations::Model) -> Allocation {
    Allocation {
        id: AllocationId::from_uuid(model.id),
        entity_id: EntityId::from_uuid(model.entity_id),
        settlement_id: SettlementId::from_uuid(model.settlement_id),
        obligation_id: ObligationId::from_uuid(model.obligation_id),
        installment_id: model.installment_id.map(InstallmentId::from_uuid),
        amount: model.amount,
        allocation_date: model.allocation_date,
        status: model.status.into(),
        notes: model.notes,
        cancel_reason: model.cancel_reason,
        created_at: model.created_at.with_timezone(&Utc),
        cancelled_at: model.cancelled_at.map(|at| at.with_timezone(&Utc)),
    }
}

pub(crate) fn cashbox(model: cashboxes::Model) -> CashAccount {
    CashAccount {
        account: AccountRef::Cashbox(CashboxId::from_uuid(model.id)),
        entity_id: EntityId::from_uuid(model.entity_id),
        branch_id: model.branch_id.map(BranchId::from_uuid),
        name: model.name,
        opening_balance: model.opening_balance,
        opening_balance_date: model.opening_balance_date,
        is_active: model.is_active,
    }
}

pub(crate) fn bank_account(model: bank_accounts::Model) -> CashAccount {
    CashAccount {
        account: AccountRef::Bank(BankAccountId::from_uuid(model.id)),
        entity_id: EntityId::from_uuid(model.entity_id),
        branch_id: model.branch_id.map(BranchId::from_uuid),
        name: model.name,
        opening_balance: model.opening_balance,
        opening_balance_date: model.opening_balance_date,
        is_active: model.is_active,
    }
}
