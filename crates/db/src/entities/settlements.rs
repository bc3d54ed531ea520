//! `SeaORM` Entity for settlements table.

use super::sea_orm_active_enums::{SettlementDirection, SettlementStatus, SettlementType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entity_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub number: String,
    pub settlement_type: SettlementType,
    pub direction: SettlementDirection,
    pub party_id: Option<Uuid>,
    pub cashbox_id: Option<Uuid>,
    pub bank_account_id: Option<Uuid>,
    pub destination_cashbox_id: Option<Uuid>,
    pub destination_bank_account_id: Option<Uuid>,
    pub settlement_date: Date,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub fee_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub net_amount: Decimal,
    pub status: SettlementStatus,
    pub reversed_settlement_id: Option<Uuid>,
    pub reversal_settlement_id: Option<Uuid>,
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
    #[sea_orm(has_many = "super::allocations::Entity")]
    Allocations,
}

impl Related<super::parties::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parties.def()
    }
}

impl Related<super::allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
