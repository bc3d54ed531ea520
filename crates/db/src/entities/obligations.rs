//! `SeaORM` Entity for obligations table.

use super::sea_orm_active_enums::{ObligationDirection, ObligationStatus, ObligationType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "obligations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entity_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub number: String,
    pub obligation_type: ObligationType,
    pub direction: ObligationDirection,
    pub party_id: Uuid,
    pub obligation_date: Date,
    pub due_date: Option<Date>,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub total_amount: Decimal,
    pub category_id: Option<Uuid>,
    pub status: ObligationStatus,
    pub reversed_obligation_id: Option<Uuid>,
    pub reversal_obligation_id: Option<Uuid>,
    pub source_kind: Option<String>,
    pub source_id: Option<Uuid>,
    pub reference: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub status_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::parties::Entity",
        from = "Column::PartyId",
        to = "super::parties::Column::Id"
    )]
    Parties,
    #[sea_orm(has_many = "super::obligation_lines::Entity")]
    ObligationLines,
    #[sea_orm(has_many = "super::obligation_installments::Entity")]
    ObligationInstallments,
    #[sea_orm(has_many = "super::allocations::Entity")]
    Allocations,
}

impl Related<super::parties::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parties.def()
    }
}

impl Related<super::obligation_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ObligationLines.def()
    }
}

impl Related<super::obligation_installments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ObligationInstallments.def()
    }
}

impl Related<super::allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
