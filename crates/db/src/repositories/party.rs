//! Party repository.
//!
//! Counterparty maintenance belongs to the host system; the ledger needs
//! lookups, a way to register parties and the active flag.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use obligo_core::error::LedgerError;
use obligo_core::party::{Party, PartyType};
use obligo_shared::types::{BranchId, EntityId, PartyId};

use crate::convert;
use crate::entities::{parties, sea_orm_active_enums as db};
use crate::error::RepositoryError;

/// Input for registering a party.
#[derive(Debug, Clone)]
pub struct CreatePartyInput {
    /// Owning entity.
    pub entity_id: EntityId,
    /// Optional branch.
    pub branch_id: Option<BranchId>,
    /// Kind of counterparty.
    pub party_type: PartyType,
    /// Code, unique per entity and type.
    pub code: String,
    /// Display name.
    pub name: String,
}

/// Party repository.
#[derive(Debug, Clone)]
pub struct PartyRepository {
    db: DatabaseConnection,
}

impl PartyRepository {
    /// Creates a new party repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Registers a party.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank or duplicate code.
    pub async fn create(&self, input: CreatePartyInput) -> Result<Party, RepositoryError> {
        if input.code.trim().is_empty() {
            return Err(LedgerError::Validation("party code is required".to_string()).into());
        }

        let now = Utc::now().into();
        let model = parties::ActiveModel {
            id: Set(PartyId::new().into_inner()),
            entity_id: Set(input.entity_id.into_inner()),
            branch_id: Set(input.branch_id.map(BranchId::into_inner)),
            party_type: Set(input.party_type.into()),
            code: Set(input.code),
            name: Set(input.name),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        tracing::info!(party_id = %model.id, code = %model.code, "Party created");
        Ok(convert::party(model))
    }

    /// Gets a party of an entity.
    ///
    /// # Errors
    ///
    /// Returns not-found if the party does not exist in the entity.
    pub async fn get(&self, entity_id: EntityId, id: PartyId) -> Result<Party, RepositoryError> {
        let party = Self::get_in(&self.db, id).await?;
        if party.entity_id != entity_id {
            return Err(LedgerError::not_found("party", id).into());
        }
        Ok(party)
    }

    /// Lists the parties of an entity by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        entity_id: EntityId,
        party_type: Option<PartyType>,
    ) -> Result<Vec<Party>, RepositoryError> {
        let mut query =
            parties::Entity::find().filter(parties::Column::EntityId.eq(entity_id.into_inner()));
        if let Some(party_type) = party_type {
            query = query.filter(parties::Column::PartyType.eq(db::PartyType::from(party_type)));
        }
        let models = query
            .order_by_asc(parties::Column::Code)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(convert::party).collect())
    }

    /// Activates or deactivates a party. Inactive parties keep their history
    /// but cannot be used by new records.
    ///
    /// # Errors
    ///
    /// Returns not-found if the party does not exist in the entity.
    pub async fn set_active(
        &self,
        entity_id: EntityId,
        id: PartyId,
        is_active: bool,
    ) -> Result<Party, RepositoryError> {
        let model = parties::Entity::find_by_id(id.into_inner())
            .filter(parties::Column::EntityId.eq(entity_id.into_inner()))
            .one(&self.db)
            .await?
            .ok_or_else(|| LedgerError::not_found("party", id))?;

        let mut active: parties::ActiveModel = model.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&self.db).await?;

        tracing::info!(party_id = %id, is_active, "Party active flag changed");
        Ok(convert::party(updated))
    }

    /// Loads a party regardless of entity; callers check scoping through
    /// [`Party::ensure_usable`].
    pub(crate) async fn get_in<C: ConnectionTrait>(
        conn: &C,
        id: PartyId,
    ) -> Result<Party, RepositoryError> {
        let model = parties::Entity::find_by_id(id.into_inner())
            .one(conn)
            .await?
            .ok_or_else(|| LedgerError::not_found("party", id))?;
        Ok(convert::party(model))
    }
}
