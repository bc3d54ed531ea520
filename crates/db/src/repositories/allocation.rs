//! Allocation repository.
//!
//! Lock order is settlement first, then obligations by ascending id. Every
//! path that touches both sides follows it.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

use obligo_core::allocation::{
    Allocation, AllocationEngine, AllocationRequest, AllocationSuggestion, InstallmentPosition,
    OpenObligation, PlannedAllocation,
};
use obligo_core::error::LedgerError;
use obligo_core::obligation::{
    Direction, Obligation, ObligationPosition, ObligationService, ObligationStatus,
};
use obligo_core::period::{Mutation, assert_open_period, governing_date};
use obligo_core::settlement::SettlementPosition;
use obligo_shared::types::{
    AllocationId, EntityId, InstallmentId, ObligationId, PartyId, SettlementId,
};

use crate::convert;
use crate::entities::{
    allocations, obligation_installments, obligations, sea_orm_active_enums as db,
};
use crate::error::RepositoryError;
use crate::repositories::obligation::ObligationRepository;
use crate::repositories::party::PartyRepository;
use crate::repositories::period::PeriodRepository;
use crate::repositories::settlement::SettlementRepository;
use crate::repositories::sums;

/// Result of absorbing a settlement's excess into an advance obligation.
#[derive(Debug, Clone)]
pub struct OverpaymentOutcome {
    /// The advance obligation, already settled by the settlement.
    pub obligation: ObligationPosition,
    /// The allocation linking the two.
    pub allocation: Allocation,
}

/// Allocation repository.
#[derive(Debug, Clone)]
pub struct AllocationRepository {
    db: DatabaseConnection,
}

impl AllocationRepository {
    /// Creates a new allocation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Applies a manual batch of allocations from one settlement.
    ///
    /// The batch is all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns an over-allocation error when any cumulative check fails, a
    /// locked-period error when a governing date is frozen, or a database
    /// error.
    pub async fn allocate(
        &self,
        entity_id: EntityId,
        settlement_id: SettlementId,
        requests: Vec<AllocationRequest>,
    ) -> Result<Vec<Allocation>, RepositoryError> {
        let txn = self.db.begin().await?;

        let settlement = SettlementRepository::lock_in(&txn, entity_id, settlement_id).await?;
        let settlement = SettlementRepository::position_in(&txn, settlement).await?;

        let ids = requests.iter().map(|r| r.obligation_id).collect();
        let locked = ObligationRepository::lock_many_in(&txn, ids).await?;
        let open = open_obligations_in(&txn, locked).await?;

        let installment_ids: Vec<InstallmentId> =
            requests.iter().filter_map(|r| r.installment_id).collect();
        let installments = installment_positions_in(&txn, installment_ids).await?;

        let plan = AllocationEngine::plan_manual(&settlement, &requests, &open, &installments)
            .inspect_err(|err| {
                tracing::warn!(settlement_id = %settlement_id, error = %err, "Allocation rejected");
            })?;

        let created = apply_plan_in(&txn, &settlement, &open, plan).await?;
        txn.commit().await?;

        tracing::info!(
            settlement_id = %settlement_id,
            count = created.len(),
            "Allocations created"
        );
        Ok(created)
    }

    /// Fills the settlement's unallocated amount into the party's open
    /// obligations, oldest due first.
    ///
    /// Returns an empty list when nothing is eligible.
    ///
    /// # Errors
    ///
    /// Returns a missing-party error when neither the override nor the
    /// settlement names a party, an invalid-state error for an unconfirmed
    /// settlement, or a locked-period error.
    pub async fn auto_allocate(
        &self,
        entity_id: EntityId,
        settlement_id: SettlementId,
        party_override: Option<PartyId>,
    ) -> Result<Vec<Allocation>, RepositoryError> {
        let txn = self.db.begin().await?;

        let settlement = SettlementRepository::lock_in(&txn, entity_id, settlement_id).await?;
        let settlement = SettlementRepository::position_in(&txn, settlement).await?;
        let party_id = AllocationEngine::resolve_party(&settlement, party_override)?;

        let candidates = candidates_in(&txn, &settlement, party_id, true).await?;
        let plan = AllocationEngine::plan_auto(
            &settlement,
            party_id,
            candidates.values().cloned().collect(),
        )
        .inspect_err(|err| {
            tracing::warn!(settlement_id = %settlement_id, error = %err, "Auto-allocation rejected");
        })?;

        if plan.is_empty() {
            txn.commit().await?;
            tracing::info!(settlement_id = %settlement_id, party_id = %party_id, "Nothing to auto-allocate");
            return Ok(Vec::new());
        }

        let created = apply_plan_in(&txn, &settlement, &candidates, plan).await?;
        txn.commit().await?;

        tracing::info!(
            settlement_id = %settlement_id,
            party_id = %party_id,
            count = created.len(),
            "Auto-allocation applied"
        );
        Ok(created)
    }

    /// Previews what auto-allocation would do, without writing.
    ///
    /// # Errors
    ///
    /// Returns not-found, a missing-party error, or a database error.
    pub async fn get_suggestions(
        &self,
        entity_id: EntityId,
        settlement_id: SettlementId,
        limit: usize,
    ) -> Result<Vec<AllocationSuggestion>, RepositoryError> {
        let settlement = SettlementRepository::find_in(&self.db, entity_id, settlement_id).await?;
        let settlement = SettlementRepository::position_in(&self.db, settlement).await?;
        let party_id = AllocationEngine::resolve_party(&settlement, None)?;

        let candidates = candidates_in(&self.db, &settlement, party_id, false).await?;
        Ok(AllocationEngine::suggestions(
            &settlement,
            party_id,
            candidates.into_values().collect(),
            limit,
        ))
    }

    /// Cancels an active allocation and re-derives the obligation status.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error for a cancelled allocation and a
    /// locked-period error when either side is dated in a frozen period.
    pub async fn cancel_allocation(
        &self,
        entity_id: EntityId,
        allocation_id: AllocationId,
        reason: &str,
    ) -> Result<Allocation, RepositoryError> {
        let txn = self.db.begin().await?;

        let peek = find_in(&txn, entity_id, allocation_id, false).await?;
        let settlement = SettlementRepository::lock_in(&txn, entity_id, peek.settlement_id).await?;
        let obligation = ObligationRepository::lock_in(&txn, entity_id, peek.obligation_id).await?;
        let allocation = find_in(&txn, entity_id, allocation_id, true).await?;

        let settlement_period =
            PeriodRepository::status_in(&txn, entity_id, settlement.settlement_date).await?;
        let obligation_period =
            PeriodRepository::status_in(&txn, entity_id, obligation.obligation_date).await?;
        let settlement = SettlementRepository::position_in(&txn, settlement).await?;
        AllocationEngine::validate_cancel(
            &allocation,
            &obligation,
            obligation_period,
            &settlement,
            settlement_period,
            reason,
        )
        .inspect_err(|err| {
            tracing::warn!(allocation_id = %allocation_id, error = %err, "Allocation cancel rejected");
        })?;

        let updated = allocations::ActiveModel {
            id: Set(allocation_id.into_inner()),
            status: Set(db::AllocationStatus::Cancelled),
            cancel_reason: Set(Some(reason.to_string())),
            cancelled_at: Set(Some(Utc::now().into())),
            ..Default::default()
        }
        .update(&txn)
        .await?;
        let position = ObligationRepository::recalculate_in(&txn, obligation.id).await?;
        txn.commit().await?;

        tracing::info!(
            allocation_id = %allocation_id,
            obligation = %obligation.number,
            settlement = %settlement.settlement.number,
            status = %position.obligation.status,
            reason,
            "Allocation cancelled"
        );
        Ok(convert::allocation(updated))
    }

    /// Turns `amount` of a settlement's unallocated money into an advance
    /// obligation for its party, fully allocated.
    ///
    /// # Errors
    ///
    /// Returns an over-allocation error when `amount` exceeds what is left,
    /// a missing-party error for a settlement without party, or a
    /// locked-period error.
    pub async fn handle_overpayment(
        &self,
        entity_id: EntityId,
        settlement_id: SettlementId,
        amount: Decimal,
    ) -> Result<OverpaymentOutcome, RepositoryError> {
        let txn = self.db.begin().await?;

        let settlement = SettlementRepository::lock_in(&txn, entity_id, settlement_id).await?;
        let settlement = SettlementRepository::position_in(&txn, settlement).await?;
        let plan = AllocationEngine::plan_overpayment(&settlement, amount).inspect_err(|err| {
            tracing::warn!(settlement_id = %settlement_id, error = %err, "Overpayment rejected");
        })?;

        let party = PartyRepository::get_in(&txn, plan.obligation.party_id).await?;
        let new = ObligationService::prepare_create(plan.obligation, &party)?;
        let period = PeriodRepository::status_in(&txn, entity_id, new.obligation_date).await?;
        assert_open_period(
            &format!("new {}", new.obligation_type),
            new.obligation_date,
            period,
            Mutation::Create,
        )?;
        let advance = ObligationRepository::insert_new_in(&txn, &new).await?;

        let allocation = insert_in(
            &txn,
            entity_id,
            settlement_id,
            &PlannedAllocation {
                obligation_id: advance.id,
                installment_id: None,
                amount,
                allocation_date: plan.allocation_date,
                notes: Some(format!("overpayment of {}", settlement.settlement.number)),
            },
        )
        .await?;
        let obligation = ObligationRepository::recalculate_in(&txn, advance.id).await?;
        txn.commit().await?;

        tracing::info!(
            settlement_id = %settlement_id,
            obligation = %obligation.obligation.number,
            amount = %amount,
            "Overpayment recorded as advance"
        );
        Ok(OverpaymentOutcome {
            obligation,
            allocation,
        })
    }

    /// Allocations of an obligation, oldest first, cancelled ones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_obligation(
        &self,
        entity_id: EntityId,
        obligation_id: ObligationId,
    ) -> Result<Vec<Allocation>, RepositoryError> {
        self.list_by(entity_id, allocations::Column::ObligationId, obligation_id.into_inner())
            .await
    }

    /// Allocations of a settlement, oldest first, cancelled ones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_settlement(
        &self,
        entity_id: EntityId,
        settlement_id: SettlementId,
    ) -> Result<Vec<Allocation>, RepositoryError> {
        self.list_by(entity_id, allocations::Column::SettlementId, settlement_id.into_inner())
            .await
    }

    async fn list_by(
        &self,
        entity_id: EntityId,
        column: allocations::Column,
        id: uuid::Uuid,
    ) -> Result<Vec<Allocation>, RepositoryError> {
        let models = allocations::Entity::find()
            .filter(allocations::Column::EntityId.eq(entity_id.into_inner()))
            .filter(column.eq(id))
            .order_by_asc(allocations::Column::CreatedAt)
            .order_by_asc(allocations::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(convert::allocation).collect())
    }
}

/// Checks each planned allocation against its governing period, inserts the
/// plan and re-derives every touched obligation.
async fn apply_plan_in<C: ConnectionTrait>(
    conn: &C,
    settlement: &SettlementPosition,
    obligations: &HashMap<ObligationId, OpenObligation>,
    plan: Vec<PlannedAllocation>,
) -> Result<Vec<Allocation>, RepositoryError> {
    let record = &settlement.settlement;
    let mut created = Vec::with_capacity(plan.len());
    let mut touched = BTreeSet::new();

    for planned in &plan {
        let obligation = obligations
            .get(&planned.obligation_id)
            .map(|open| &open.obligation)
            .ok_or_else(|| LedgerError::not_found("obligation", planned.obligation_id))?;
        let date = governing_date(obligation.obligation_date, record.settlement_date);
        let status = PeriodRepository::status_in(conn, record.entity_id, date).await?;
        assert_open_period(
            &format!("allocation of {} to {}", record.number, obligation.number),
            date,
            status,
            Mutation::Create,
        )
        .inspect_err(|err| tracing::warn!(error = %err, "Allocation rejected"))?;

        created.push(insert_in(conn, record.entity_id, record.id, planned).await?);
        touched.insert(planned.obligation_id);
    }

    for obligation_id in touched {
        ObligationRepository::recalculate_in(conn, obligation_id).await?;
    }
    Ok(created)
}

async fn insert_in<C: ConnectionTrait>(
    conn: &C,
    entity_id: EntityId,
    settlement_id: SettlementId,
    planned: &PlannedAllocation,
) -> Result<Allocation, RepositoryError> {
    let model = allocations::ActiveModel {
        id: Set(AllocationId::new().into_inner()),
        entity_id: Set(entity_id.into_inner()),
        settlement_id: Set(settlement_id.into_inner()),
        obligation_id: Set(planned.obligation_id.into_inner()),
        installment_id: Set(planned.installment_id.map(InstallmentId::into_inner)),
        amount: Set(planned.amount),
        allocation_date: Set(planned.allocation_date),
        status: Set(db::AllocationStatus::Active),
        notes: Set(planned.notes.clone()),
        cancel_reason: Set(None),
        created_at: Set(Utc::now().into()),
        cancelled_at: Set(None),
    }
    .insert(conn)
    .await?;
    Ok(convert::allocation(model))
}

async fn find_in<C: ConnectionTrait>(
    conn: &C,
    entity_id: EntityId,
    id: AllocationId,
    for_update: bool,
) -> Result<Allocation, RepositoryError> {
    let mut query = allocations::Entity::find_by_id(id.into_inner())
        .filter(allocations::Column::EntityId.eq(entity_id.into_inner()));
    if for_update {
        query = query.lock_exclusive();
    }
    let model = query
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("allocation", id))?;
    Ok(convert::allocation(model))
}

/// Pairs obligations with their live allocated sums.
async fn open_obligations_in<C: ConnectionTrait>(
    conn: &C,
    obligations: Vec<Obligation>,
) -> Result<HashMap<ObligationId, OpenObligation>, RepositoryError> {
    let paid = ObligationRepository::paid_by_obligation_in(conn, &obligations).await?;
    Ok(obligations
        .into_iter()
        .map(|obligation| {
            let allocated = paid.get(&obligation.id).copied().unwrap_or(Decimal::ZERO);
            (
                obligation.id,
                OpenObligation {
                    obligation,
                    allocated,
                },
            )
        })
        .collect())
}

async fn installment_positions_in<C: ConnectionTrait>(
    conn: &C,
    ids: Vec<InstallmentId>,
) -> Result<HashMap<InstallmentId, InstallmentPosition>, RepositoryError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let raw: Vec<uuid::Uuid> = ids.into_iter().map(InstallmentId::into_inner).collect();
    let models = obligation_installments::Entity::find()
        .filter(obligation_installments::Column::Id.is_in(raw.clone()))
        .all(conn)
        .await?;
    let allocated = sums::allocated_by(conn, allocations::Column::InstallmentId, raw).await?;

    Ok(models
        .into_iter()
        .map(|model| {
            let sum = allocated.get(&model.id).copied().unwrap_or(Decimal::ZERO);
            let installment = convert::installment(model);
            (
                installment.id,
                InstallmentPosition {
                    installment,
                    allocated: sum,
                },
            )
        })
        .collect())
}

/// Open obligations of a party in the direction the settlement pays down,
/// optionally locked in id order.
async fn candidates_in<C: ConnectionTrait>(
    conn: &C,
    settlement: &SettlementPosition,
    party_id: PartyId,
    lock: bool,
) -> Result<HashMap<ObligationId, OpenObligation>, RepositoryError> {
    let direction: Direction = settlement.settlement.direction.settles();
    let statuses: Vec<db::ObligationStatus> = [ObligationStatus::Pending, ObligationStatus::Partial]
        .into_iter()
        .map(Into::into)
        .collect();

    let mut query = obligations::Entity::find()
        .filter(obligations::Column::EntityId.eq(settlement.settlement.entity_id.into_inner()))
        .filter(obligations::Column::PartyId.eq(party_id.into_inner()))
        .filter(obligations::Column::Direction.eq(db::ObligationDirection::from(direction)))
        .filter(obligations::Column::Status.is_in(statuses))
        .order_by_asc(obligations::Column::Id);
    if lock {
        query = query.lock_exclusive();
    }
    let models = query.all(conn).await?;

    open_obligations_in(conn, models.into_iter().map(convert::obligation).collect()).await
}
