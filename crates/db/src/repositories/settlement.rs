//! Settlement repository.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use obligo_core::error::LedgerError;
use obligo_core::period::{Mutation, assert_open_period};
use obligo_core::settlement::{
    AccountRef, CreateSettlementInput, FlowDirection, NewSettlement, Settlement, SettlementPatch,
    SettlementPosition, SettlementService, SettlementStatus, SettlementType,
};
use obligo_shared::types::{
    BankAccountId, BranchId, CashboxId, EntityId, PageRequest, PageResponse, PartyId,
    SettlementId,
};

use crate::convert;
use crate::entities::{allocations, sea_orm_active_enums as db, settlements};
use crate::error::RepositoryError;
use crate::repositories::cash_account::CashAccountRepository;
use crate::repositories::party::PartyRepository;
use crate::repositories::period::PeriodRepository;
use crate::repositories::sequence::SequenceRepository;
use crate::repositories::sums;

/// Filter for settlement listings.
#[derive(Debug, Clone, Default)]
pub struct SettlementFilter {
    /// Restrict to one party.
    pub party_id: Option<PartyId>,
    /// Restrict to one type.
    pub settlement_type: Option<SettlementType>,
    /// Restrict to one direction.
    pub direction: Option<FlowDirection>,
    /// Restrict to these statuses; empty means all.
    pub statuses: Vec<SettlementStatus>,
    /// Restrict to settlements moving money through this account, as source
    /// or destination.
    pub account: Option<AccountRef>,
    /// Earliest settlement date.
    pub date_from: Option<NaiveDate>,
    /// Latest settlement date.
    pub date_to: Option<NaiveDate>,
}

/// Settlement repository.
#[derive(Debug, Clone)]
pub struct SettlementRepository {
    db: DatabaseConnection,
}

impl SettlementRepository {
    /// Creates a new settlement repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records a settlement, as a draft or directly confirmed.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input or accounts, a locked-period
    /// error for a frozen date, or a database error.
    pub async fn create(
        &self,
        input: CreateSettlementInput,
    ) -> Result<SettlementPosition, RepositoryError> {
        let txn = self.db.begin().await?;

        let party = match input.party_id {
            Some(party_id) => Some(PartyRepository::get_in(&txn, party_id).await?),
            None => None,
        };
        let new = SettlementService::prepare_create(input, party.as_ref())?;

        CashAccountRepository::ensure_usable_in(&txn, new.entity_id, new.account).await?;
        if let Some(destination) = new.destination {
            CashAccountRepository::ensure_usable_in(&txn, new.entity_id, destination).await?;
        }

        let status = PeriodRepository::status_in(&txn, new.entity_id, new.settlement_date).await?;
        assert_open_period(
            &format!("new {}", new.settlement_type),
            new.settlement_date,
            status,
            Mutation::Create,
        )
        .inspect_err(|err| tracing::warn!(error = %err, "Settlement creation rejected"))?;

        let settlement = Self::insert_new_in(&txn, &new).await?;
        txn.commit().await?;

        tracing::info!(
            settlement_id = %settlement.id,
            number = %settlement.number,
            direction = %settlement.direction,
            amount = %settlement.amount,
            status = %settlement.status,
            "Settlement created"
        );
        Ok(position(settlement, Decimal::ZERO))
    }

    /// Updates the editable fields of a draft or confirmed settlement.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error for terminal settlements or a date
    /// change outside draft, and a locked-period error when either the
    /// current or the new date is frozen.
    pub async fn update(
        &self,
        entity_id: EntityId,
        id: SettlementId,
        patch: SettlementPatch,
    ) -> Result<SettlementPosition, RepositoryError> {
        let txn = self.db.begin().await?;
        let mut settlement = Self::lock_in(&txn, entity_id, id).await?;

        let period = PeriodRepository::status_in(&txn, entity_id, settlement.settlement_date).await?;
        SettlementService::validate_update(&settlement, &patch, period)
            .inspect_err(|err| tracing::warn!(settlement_id = %id, error = %err, "Settlement update rejected"))?;
        if let Some(new_date) = patch.settlement_date {
            let target = PeriodRepository::status_in(&txn, entity_id, new_date).await?;
            assert_open_period(&settlement.number, new_date, target, Mutation::Update)
                .inspect_err(|err| tracing::warn!(settlement_id = %id, error = %err, "Settlement update rejected"))?;
        }

        SettlementService::apply_patch(&mut settlement, patch);
        let updated = settlements::ActiveModel {
            id: Set(id.into_inner()),
            settlement_date: Set(settlement.settlement_date),
            reference: Set(settlement.reference.clone()),
            description: Set(settlement.description.clone()),
            notes: Set(settlement.notes.clone()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&txn)
        .await?;
        let allocated =
            sums::allocated_for(&txn, allocations::Column::SettlementId, id.into_inner()).await?;
        txn.commit().await?;

        tracing::info!(settlement_id = %id, number = %updated.number, "Settlement updated");
        Ok(position(convert::settlement(updated)?, allocated))
    }

    /// Confirms a draft settlement.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error unless the settlement is a draft, and a
    /// locked-period error for a frozen date.
    pub async fn confirm(
        &self,
        entity_id: EntityId,
        id: SettlementId,
    ) -> Result<SettlementPosition, RepositoryError> {
        let txn = self.db.begin().await?;
        let settlement = Self::lock_in(&txn, entity_id, id).await?;

        let period = PeriodRepository::status_in(&txn, entity_id, settlement.settlement_date).await?;
        SettlementService::validate_confirm(&settlement, period)
            .inspect_err(|err| tracing::warn!(settlement_id = %id, error = %err, "Settlement confirm rejected"))?;

        let updated = Self::set_status_in(&txn, id, db::SettlementStatus::Confirmed, None).await?;
        txn.commit().await?;

        tracing::info!(settlement_id = %id, number = %updated.number, "Settlement confirmed");
        Ok(position(updated, Decimal::ZERO))
    }

    /// Cancels a settlement without active allocations. Allowed in locked
    /// periods.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error for terminal settlements or while
    /// allocations are active.
    pub async fn cancel(
        &self,
        entity_id: EntityId,
        id: SettlementId,
        reason: &str,
    ) -> Result<SettlementPosition, RepositoryError> {
        let txn = self.db.begin().await?;
        let settlement = Self::lock_in(&txn, entity_id, id).await?;

        let active = sums::count_allocations(&txn, allocations::Column::SettlementId, id.into_inner(), true).await?;
        SettlementService::validate_cancel(&settlement, active, reason)
            .inspect_err(|err| tracing::warn!(settlement_id = %id, error = %err, "Settlement cancel rejected"))?;

        let updated = Self::set_status_in(
            &txn,
            id,
            db::SettlementStatus::Cancelled,
            Some(reason.to_string()),
        )
        .await?;
        txn.commit().await?;

        tracing::info!(settlement_id = %id, number = %updated.number, reason, "Settlement cancelled");
        Ok(position(updated, Decimal::ZERO))
    }

    /// Physically deletes a draft settlement that never had allocations.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error for anything but an untouched draft,
    /// and a locked-period error for a non-open period.
    pub async fn delete(&self, entity_id: EntityId, id: SettlementId) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;
        let settlement = Self::lock_in(&txn, entity_id, id).await?;

        let any = sums::count_allocations(&txn, allocations::Column::SettlementId, id.into_inner(), false).await?;
        let period = PeriodRepository::status_in(&txn, entity_id, settlement.settlement_date).await?;
        SettlementService::validate_delete(&settlement, any, period)
            .inspect_err(|err| tracing::warn!(settlement_id = %id, error = %err, "Settlement delete rejected"))?;

        settlements::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await?;
        txn.commit().await?;

        tracing::info!(settlement_id = %id, number = %settlement.number, "Settlement deleted");
        Ok(())
    }

    /// Re-reads the live allocated sum of a settlement.
    ///
    /// # Errors
    ///
    /// Returns not-found or a database error.
    pub async fn recalculate_allocated(
        &self,
        entity_id: EntityId,
        id: SettlementId,
    ) -> Result<SettlementPosition, RepositoryError> {
        let settlement = Self::find_in(&self.db, entity_id, id).await?;
        Self::position_in(&self.db, settlement).await
    }

    /// Gets a settlement with its allocated/unallocated split.
    ///
    /// # Errors
    ///
    /// Returns not-found or a database error.
    pub async fn get(
        &self,
        entity_id: EntityId,
        id: SettlementId,
    ) -> Result<SettlementPosition, RepositoryError> {
        self.recalculate_allocated(entity_id, id).await
    }

    /// Lists settlements of an entity, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        entity_id: EntityId,
        filter: &SettlementFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<SettlementPosition>, RepositoryError> {
        let mut query = settlements::Entity::find()
            .filter(settlements::Column::EntityId.eq(entity_id.into_inner()));
        if let Some(party_id) = filter.party_id {
            query = query.filter(settlements::Column::PartyId.eq(party_id.into_inner()));
        }
        if let Some(settlement_type) = filter.settlement_type {
            query = query.filter(settlements::Column::SettlementType.eq(db::SettlementType::from(settlement_type)));
        }
        if let Some(direction) = filter.direction {
            query = query.filter(settlements::Column::Direction.eq(db::SettlementDirection::from(direction)));
        }
        if !filter.statuses.is_empty() {
            let statuses: Vec<db::SettlementStatus> =
                filter.statuses.iter().map(|s| (*s).into()).collect();
            query = query.filter(settlements::Column::Status.is_in(statuses));
        }
        if let Some(account) = filter.account {
            query = query.filter(touches_account(account));
        }
        if let Some(from) = filter.date_from {
            query = query.filter(settlements::Column::SettlementDate.gte(from));
        }
        if let Some(to) = filter.date_to {
            query = query.filter(settlements::Column::SettlementDate.lte(to));
        }

        let total = query.clone().count(&self.db).await?;
        let models = query
            .order_by_desc(settlements::Column::SettlementDate)
            .order_by_desc(settlements::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;

        let mut data = Vec::with_capacity(models.len());
        let ids = models.iter().map(|m| m.id).collect();
        let allocated = sums::allocated_by(&self.db, allocations::Column::SettlementId, ids).await?;
        for model in models {
            let paid = allocated.get(&model.id).copied().unwrap_or(Decimal::ZERO);
            data.push(position(convert::settlement(model)?, paid));
        }
        Ok(PageResponse::new(data, page, total))
    }

    // ========== Transaction helpers ==========

    /// Numbers and inserts a validated settlement.
    pub(crate) async fn insert_new_in<C: ConnectionTrait>(
        conn: &C,
        new: &NewSettlement,
    ) -> Result<Settlement, RepositoryError> {
        let number =
            SequenceRepository::next_number_in(conn, &new.sequence_key(), new.prefix()).await?;
        let now = Utc::now().into();
        let (cashbox_id, bank_account_id) = new.account.to_columns();
        let (destination_cashbox_id, destination_bank_account_id) =
            new.destination.map_or((None, None), AccountRef::to_columns);

        let model = settlements::ActiveModel {
            id: Set(new.id.into_inner()),
            entity_id: Set(new.entity_id.into_inner()),
            branch_id: Set(new.branch_id.map(BranchId::into_inner)),
            number: Set(number),
            settlement_type: Set(new.settlement_type.into()),
            direction: Set(new.direction.into()),
            party_id: Set(new.party_id.map(PartyId::into_inner)),
            cashbox_id: Set(cashbox_id.map(CashboxId::into_inner)),
            bank_account_id: Set(bank_account_id.map(BankAccountId::into_inner)),
            destination_cashbox_id: Set(destination_cashbox_id.map(CashboxId::into_inner)),
            destination_bank_account_id: Set(
                destination_bank_account_id.map(BankAccountId::into_inner),
            ),
            settlement_date: Set(new.settlement_date),
            amount: Set(new.amount),
            fee_amount: Set(new.fee_amount),
            net_amount: Set(new.net_amount),
            status: Set(new.status.into()),
            reversed_settlement_id: Set(new.reversed_settlement_id.map(SettlementId::into_inner)),
            reversal_settlement_id: Set(None),
            reference: Set(new.reference.clone()),
            description: Set(new.description.clone()),
            notes: Set(new.notes.clone()),
            status_reason: Set(new.status_reason.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;

        Ok(convert::settlement(model)?)
    }

    /// Loads a settlement of an entity and locks its row.
    pub(crate) async fn lock_in<C: ConnectionTrait>(
        conn: &C,
        entity_id: EntityId,
        id: SettlementId,
    ) -> Result<Settlement, RepositoryError> {
        let model = settlements::Entity::find_by_id(id.into_inner())
            .filter(settlements::Column::EntityId.eq(entity_id.into_inner()))
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| LedgerError::not_found("settlement", id))?;
        Ok(convert::settlement(model)?)
    }

    /// Loads a settlement of an entity without locking it.
    pub(crate) async fn find_in<C: ConnectionTrait>(
        conn: &C,
        entity_id: EntityId,
        id: SettlementId,
    ) -> Result<Settlement, RepositoryError> {
        let model = settlements::Entity::find_by_id(id.into_inner())
            .filter(settlements::Column::EntityId.eq(entity_id.into_inner()))
            .one(conn)
            .await?
            .ok_or_else(|| LedgerError::not_found("settlement", id))?;
        Ok(convert::settlement(model)?)
    }

    /// Attaches the live allocated sum to a settlement.
    pub(crate) async fn position_in<C: ConnectionTrait>(
        conn: &C,
        settlement: Settlement,
    ) -> Result<SettlementPosition, RepositoryError> {
        let allocated = sums::allocated_for(
            conn,
            allocations::Column::SettlementId,
            settlement.id.into_inner(),
        )
        .await?;
        Ok(position(settlement, allocated))
    }

    /// Writes a status (and optionally its reason) and returns the fresh row.
    pub(crate) async fn set_status_in<C: ConnectionTrait>(
        conn: &C,
        id: SettlementId,
        status: db::SettlementStatus,
        reason: Option<String>,
    ) -> Result<Settlement, RepositoryError> {
        let mut active = settlements::ActiveModel {
            id: Set(id.into_inner()),
            status: Set(status),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        if reason.is_some() {
            active.status_reason = Set(reason);
        }
        Ok(convert::settlement(active.update(conn).await?)?)
    }
}

/// Condition matching settlements whose source or destination is `account`.
pub(crate) fn touches_account(account: AccountRef) -> sea_orm::Condition {
    use sea_orm::Condition;

    match account {
        AccountRef::Cashbox(id) => Condition::any()
            .add(settlements::Column::CashboxId.eq(id.into_inner()))
            .add(settlements::Column::DestinationCashboxId.eq(id.into_inner())),
        AccountRef::Bank(id) => Condition::any()
            .add(settlements::Column::BankAccountId.eq(id.into_inner()))
            .add(settlements::Column::DestinationBankAccountId.eq(id.into_inner())),
    }
}

fn position(settlement: Settlement, allocated: Decimal) -> SettlementPosition {
    let unallocated = SettlementService::unallocated(settlement.amount, allocated);
    SettlementPosition {
        settlement,
        allocated,
        unallocated,
    }
}
