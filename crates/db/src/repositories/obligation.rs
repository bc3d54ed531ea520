//! Obligation repository.
//!
//! Every mutating operation runs in one transaction: the obligation row is
//! locked, the live allocation sum and the period status are read, the core
//! rules decide, and only then is anything written.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use obligo_core::error::LedgerError;
use obligo_core::obligation::{
    CreateObligationInput, Installment, NewObligation, Obligation, ObligationFilter,
    ObligationLine, ObligationPatch, ObligationPosition, ObligationService,
};
use obligo_core::period::{Mutation, assert_open_period};
use obligo_shared::types::{
    BranchId, CategoryId, EntityId, ObligationId, PageRequest, PageResponse,
};

use crate::convert;
use crate::entities::{
    allocations, obligation_installments, obligation_lines, obligations,
    sea_orm_active_enums as db,
};
use crate::error::RepositoryError;
use crate::repositories::party::PartyRepository;
use crate::repositories::period::PeriodRepository;
use crate::repositories::sequence::SequenceRepository;
use crate::repositories::sums;

/// Obligation repository.
#[derive(Debug, Clone)]
pub struct ObligationRepository {
    db: DatabaseConnection,
}

impl ObligationRepository {
    /// Creates a new obligation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an obligation, numbering it from the entity's document counter.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, a locked-period error when
    /// the obligation date is frozen, or a database error.
    pub async fn create(
        &self,
        input: CreateObligationInput,
    ) -> Result<ObligationPosition, RepositoryError> {
        let txn = self.db.begin().await?;

        let party = PartyRepository::get_in(&txn, input.party_id).await?;
        let new = ObligationService::prepare_create(input, &party)?;

        let status = PeriodRepository::status_in(&txn, new.entity_id, new.obligation_date).await?;
        assert_open_period(
            &format!("new {}", new.obligation_type),
            new.obligation_date,
            status,
            Mutation::Create,
        )
        .inspect_err(|err| tracing::warn!(error = %err, "Obligation creation rejected"))?;

        let obligation = Self::insert_new_in(&txn, &new).await?;
        txn.commit().await?;

        tracing::info!(
            obligation_id = %obligation.id,
            number = %obligation.number,
            direction = %obligation.direction,
            amount = %obligation.total_amount,
            "Obligation created"
        );
        Ok(position(obligation, Decimal::ZERO))
    }

    /// Updates the editable fields of a draft or pending obligation.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error once the obligation has allocations or
    /// left `draft`/`pending`, and a locked-period error for a frozen date.
    pub async fn update(
        &self,
        entity_id: EntityId,
        id: ObligationId,
        patch: ObligationPatch,
    ) -> Result<ObligationPosition, RepositoryError> {
        let txn = self.db.begin().await?;
        let mut obligation = Self::lock_in(&txn, entity_id, id).await?;

        let active = sums::count_allocations(&txn, allocations::Column::ObligationId, id.into_inner(), true).await?;
        let period = PeriodRepository::status_in(&txn, entity_id, obligation.obligation_date).await?;
        ObligationService::validate_update(&obligation, &patch, active, period)
            .inspect_err(|err| tracing::warn!(obligation_id = %id, error = %err, "Obligation update rejected"))?;

        ObligationService::apply_patch(&mut obligation, patch);
        let updated = obligations::ActiveModel {
            id: Set(id.into_inner()),
            due_date: Set(obligation.due_date),
            category_id: Set(obligation.category_id.map(CategoryId::into_inner)),
            reference: Set(obligation.reference.clone()),
            description: Set(obligation.description.clone()),
            notes: Set(obligation.notes.clone()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(obligation_id = %id, number = %updated.number, "Obligation updated");
        Ok(position(convert::obligation(updated), Decimal::ZERO))
    }

    /// Moves a draft to `pending`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error unless the obligation is a draft, and a
    /// locked-period error for a frozen date.
    pub async fn finalize(
        &self,
        entity_id: EntityId,
        id: ObligationId,
    ) -> Result<ObligationPosition, RepositoryError> {
        let txn = self.db.begin().await?;
        let obligation = Self::lock_in(&txn, entity_id, id).await?;

        let period = PeriodRepository::status_in(&txn, entity_id, obligation.obligation_date).await?;
        ObligationService::validate_finalize(&obligation, period)
            .inspect_err(|err| tracing::warn!(obligation_id = %id, error = %err, "Obligation finalize rejected"))?;

        Self::set_status_in(&txn, id, db::ObligationStatus::Pending, None).await?;
        let position = Self::recalculate_in(&txn, id).await?;
        txn.commit().await?;

        tracing::info!(obligation_id = %id, number = %obligation.number, "Obligation finalized");
        Ok(position)
    }

    /// Cancels an obligation without active allocations. Allowed in locked
    /// periods.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error for terminal obligations or while
    /// allocations are active.
    pub async fn cancel(
        &self,
        entity_id: EntityId,
        id: ObligationId,
        reason: &str,
    ) -> Result<ObligationPosition, RepositoryError> {
        let txn = self.db.begin().await?;
        let obligation = Self::lock_in(&txn, entity_id, id).await?;

        let active = sums::count_allocations(&txn, allocations::Column::ObligationId, id.into_inner(), true).await?;
        ObligationService::validate_cancel(&obligation, active, reason)
            .inspect_err(|err| tracing::warn!(obligation_id = %id, error = %err, "Obligation cancel rejected"))?;

        let updated =
            Self::set_status_in(&txn, id, db::ObligationStatus::Cancelled, Some(reason.to_string()))
                .await?;
        txn.commit().await?;

        tracing::info!(obligation_id = %id, number = %obligation.number, reason, "Obligation cancelled");
        Ok(position(updated, Decimal::ZERO))
    }

    /// Physically deletes an obligation that never had allocations.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error for reversal pairs or allocation
    /// history, and a locked-period error for a non-open period.
    pub async fn delete(&self, entity_id: EntityId, id: ObligationId) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;
        let obligation = Self::lock_in(&txn, entity_id, id).await?;

        let any = sums::count_allocations(&txn, allocations::Column::ObligationId, id.into_inner(), false).await?;
        let period = PeriodRepository::status_in(&txn, entity_id, obligation.obligation_date).await?;
        ObligationService::validate_delete(&obligation, any, period)
            .inspect_err(|err| tracing::warn!(obligation_id = %id, error = %err, "Obligation delete rejected"))?;

        obligations::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await?;
        txn.commit().await?;

        tracing::info!(obligation_id = %id, number = %obligation.number, "Obligation deleted");
        Ok(())
    }

    /// Re-derives the status from the live allocation sum.
    ///
    /// # Errors
    ///
    /// Returns not-found or a database error.
    pub async fn recalculate_status(
        &self,
        entity_id: EntityId,
        id: ObligationId,
    ) -> Result<ObligationPosition, RepositoryError> {
        let txn = self.db.begin().await?;
        Self::lock_in(&txn, entity_id, id).await?;
        let position = Self::recalculate_in(&txn, id).await?;
        txn.commit().await?;
        Ok(position)
    }

    /// Returns true if the obligation may still be edited.
    ///
    /// # Errors
    ///
    /// Returns not-found or a database error.
    pub async fn can_modify(
        &self,
        entity_id: EntityId,
        id: ObligationId,
    ) -> Result<bool, RepositoryError> {
        let obligation = Self::find_in(&self.db, entity_id, id).await?;
        let active = sums::count_allocations(&self.db, allocations::Column::ObligationId, id.into_inner(), true).await?;
        let period =
            PeriodRepository::status_in(&self.db, entity_id, obligation.obligation_date).await?;
        Ok(ObligationService::can_modify(&obligation, active, period))
    }

    /// Gets an obligation with its paid/unpaid split.
    ///
    /// # Errors
    ///
    /// Returns not-found or a database error.
    pub async fn get(
        &self,
        entity_id: EntityId,
        id: ObligationId,
    ) -> Result<ObligationPosition, RepositoryError> {
        let obligation = Self::find_in(&self.db, entity_id, id).await?;
        let paid =
            sums::allocated_for(&self.db, allocations::Column::ObligationId, id.into_inner()).await?;
        Ok(position(obligation, paid))
    }

    /// Itemized lines of an obligation.
    ///
    /// # Errors
    ///
    /// Returns not-found or a database error.
    pub async fn lines(
        &self,
        entity_id: EntityId,
        id: ObligationId,
    ) -> Result<Vec<ObligationLine>, RepositoryError> {
        Self::find_in(&self.db, entity_id, id).await?;
        let models = obligation_lines::Entity::find()
            .filter(obligation_lines::Column::ObligationId.eq(id.into_inner()))
            .order_by_asc(obligation_lines::Column::LineNo)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(convert::line).collect())
    }

    /// Payment schedule of an obligation.
    ///
    /// # Errors
    ///
    /// Returns not-found or a database error.
    pub async fn installments(
        &self,
        entity_id: EntityId,
        id: ObligationId,
    ) -> Result<Vec<Installment>, RepositoryError> {
        Self::find_in(&self.db, entity_id, id).await?;
        let models = obligation_installments::Entity::find()
            .filter(obligation_installments::Column::ObligationId.eq(id.into_inner()))
            .order_by_asc(obligation_installments::Column::SequenceNo)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(convert::installment).collect())
    }

    /// Lists obligations of an entity, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        entity_id: EntityId,
        filter: &ObligationFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<ObligationPosition>, RepositoryError> {
        let mut query = obligations::Entity::find()
            .filter(obligations::Column::EntityId.eq(entity_id.into_inner()));
        if let Some(party_id) = filter.party_id {
            query = query.filter(obligations::Column::PartyId.eq(party_id.into_inner()));
        }
        if let Some(direction) = filter.direction {
            query = query.filter(obligations::Column::Direction.eq(db::ObligationDirection::from(direction)));
        }
        if !filter.statuses.is_empty() {
            let statuses: Vec<db::ObligationStatus> =
                filter.statuses.iter().map(|s| (*s).into()).collect();
            query = query.filter(obligations::Column::Status.is_in(statuses));
        }
        if let Some(from) = filter.date_from {
            query = query.filter(obligations::Column::ObligationDate.gte(from));
        }
        if let Some(to) = filter.date_to {
            query = query.filter(obligations::Column::ObligationDate.lte(to));
        }

        let total = query.clone().count(&self.db).await?;
        let models = query
            .order_by_desc(obligations::Column::ObligationDate)
            .order_by_desc(obligations::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;

        let data = Self::positions_in(&self.db, models.into_iter().map(convert::obligation).collect()).await?;
        Ok(PageResponse::new(data, page, total))
    }

    // ========== Transaction helpers ==========

    /// Numbers and inserts a validated obligation with its lines and
    /// installments.
    pub(crate) async fn insert_new_in<C: ConnectionTrait>(
        conn: &C,
        new: &NewObligation,
    ) -> Result<Obligation, RepositoryError> {
        let number =
            SequenceRepository::next_number_in(conn, &new.sequence_key(), new.prefix()).await?;
        let now = Utc::now().into();
        let (source_kind, source_id) = match &new.source {
            Some(source) => (Some(source.kind.as_str().to_string()), Some(source.id)),
            None => (None, None),
        };

        let model = obligations::ActiveModel {
            id: Set(new.id.into_inner()),
            entity_id: Set(new.entity_id.into_inner()),
            branch_id: Set(new.branch_id.map(BranchId::into_inner)),
            number: Set(number),
            obligation_type: Set(new.obligation_type.into()),
            direction: Set(new.direction.into()),
            party_id: Set(new.party_id.into_inner()),
            obligation_date: Set(new.obligation_date),
            due_date: Set(new.due_date),
            total_amount: Set(new.total_amount),
            category_id: Set(new.category_id.map(CategoryId::into_inner)),
            status: Set(new.status.into()),
            reversed_obligation_id: Set(new.reversed_obligation_id.map(ObligationId::into_inner)),
            reversal_obligation_id: Set(None),
            source_kind: Set(source_kind),
            source_id: Set(source_id),
            reference: Set(new.reference.clone()),
            description: Set(new.description.clone()),
            notes: Set(new.notes.clone()),
            status_reason: Set(new.status_reason.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;

        for line in &new.lines {
            obligation_lines::ActiveModel {
                id: Set(line.id.into_inner()),
                obligation_id: Set(model.id),
                line_no: Set(line.line_no),
                description: Set(line.description.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                discount_percent: Set(line.discount_percent),
                tax_percent: Set(line.tax_percent),
                subtotal: Set(line.subtotal),
                tax: Set(line.tax),
                total: Set(line.total),
            }
            .insert(conn)
            .await?;
        }

        for installment in &new.installments {
            obligation_installments::ActiveModel {
                id: Set(installment.id.into_inner()),
                obligation_id: Set(model.id),
                sequence_no: Set(installment.sequence_no),
                due_date: Set(installment.due_date),
                amount: Set(installment.amount),
            }
            .insert(conn)
            .await?;
        }

        Ok(convert::obligation(model))
    }

    /// Loads an obligation of an entity and locks its row.
    pub(crate) async fn lock_in<C: ConnectionTrait>(
        conn: &C,
        entity_id: EntityId,
        id: ObligationId,
    ) -> Result<Obligation, RepositoryError> {
        let model = obligations::Entity::find_by_id(id.into_inner())
            .filter(obligations::Column::EntityId.eq(entity_id.into_inner()))
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| LedgerError::not_found("obligation", id))?;
        Ok(convert::obligation(model))
    }

    /// Locks several obligations in id order.
    ///
    /// Obligations of other entities are left out; the allocation engine
    /// reports them as unknown.
    pub(crate) async fn lock_many_in<C: ConnectionTrait>(
        conn: &C,
        mut ids: Vec<ObligationId>,
    ) -> Result<Vec<Obligation>, RepositoryError> {
        ids.sort_unstable();
        ids.dedup();
        let models = obligations::Entity::find()
            .filter(obligations::Column::Id.is_in(ids.into_iter().map(ObligationId::into_inner)))
            .order_by_asc(obligations::Column::Id)
            .lock_exclusive()
            .all(conn)
            .await?;
        Ok(models.into_iter().map(convert::obligation).collect())
    }

    async fn find_in<C: ConnectionTrait>(
        conn: &C,
        entity_id: EntityId,
        id: ObligationId,
    ) -> Result<Obligation, RepositoryError> {
        let model = obligations::Entity::find_by_id(id.into_inner())
            .filter(obligations::Column::EntityId.eq(entity_id.into_inner()))
            .one(conn)
            .await?
            .ok_or_else(|| LedgerError::not_found("obligation", id))?;
        Ok(convert::obligation(model))
    }

    /// Re-derives and stores the status of a locked obligation.
    pub(crate) async fn recalculate_in<C: ConnectionTrait>(
        conn: &C,
        id: ObligationId,
    ) -> Result<ObligationPosition, RepositoryError> {
        let model = obligations::Entity::find_by_id(id.into_inner())
            .one(conn)
            .await?
            .ok_or_else(|| LedgerError::not_found("obligation", id))?;
        let obligation = convert::obligation(model);
        let paid = sums::allocated_for(conn, allocations::Column::ObligationId, id.into_inner()).await?;

        let derived = ObligationService::derive_status(obligation.status, obligation.total_amount, paid);
        if derived == obligation.status {
            return Ok(position(obligation, paid));
        }

        let updated = Self::set_status_in(conn, id, derived.into(), None).await?;
        tracing::info!(
            obligation_id = %id,
            number = %updated.number,
            from = %obligation.status,
            to = %derived,
            paid = %paid,
            "Obligation status recalculated"
        );
        Ok(position(updated, paid))
    }

    /// Attaches live paid amounts to a batch of obligations.
    pub(crate) async fn positions_in<C: ConnectionTrait>(
        conn: &C,
        obligations: Vec<Obligation>,
    ) -> Result<Vec<ObligationPosition>, RepositoryError> {
        let paid = Self::paid_by_obligation_in(conn, &obligations).await?;
        Ok(obligations
            .into_iter()
            .map(|obligation| {
                let paid = paid.get(&obligation.id).copied().unwrap_or(Decimal::ZERO);
                position(obligation, paid)
            })
            .collect())
    }

    pub(crate) async fn paid_by_obligation_in<C: ConnectionTrait>(
        conn: &C,
        obligations: &[Obligation],
    ) -> Result<HashMap<ObligationId, Decimal>, RepositoryError> {
        let sums = sums::allocated_by(
            conn,
            allocations::Column::ObligationId,
            obligations.iter().map(|o| o.id.into_inner()).collect(),
        )
        .await?;
        Ok(sums
            .into_iter()
            .map(|(id, paid)| (ObligationId::from_uuid(id), paid))
            .collect())
    }

    /// Writes a status (and optionally its reason) and returns the fresh row.
    pub(crate) async fn set_status_in<C: ConnectionTrait>(
        conn: &C,
        id: ObligationId,
        status: db::ObligationStatus,
        reason: Option<String>,
    ) -> Result<Obligation, RepositoryError> {
        let mut active = obligations::ActiveModel {
            id: Set(id.into_inner()),
            status: Set(status),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        if reason.is_some() {
            active.status_reason = Set(reason);
        }
        Ok(convert::obligation(active.update(conn).await?))
    }
}

fn position(obligation: Obligation, paid: Decimal) -> ObligationPosition {
    let unpaid = ObligationService::unpaid(obligation.total_amount, paid);
    ObligationPosition {
        obligation,
        paid,
        unpaid,
    }
}
