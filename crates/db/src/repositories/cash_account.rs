//! Cashbox and bank account repository.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Set};

use obligo_core::balance::CashAccount;
use obligo_core::error::LedgerError;
use obligo_core::settlement::AccountRef;
use obligo_shared::types::money::has_money_scale;
use obligo_shared::types::{BankAccountId, BranchId, CashboxId, EntityId};

use crate::convert;
use crate::entities::{bank_accounts, cashboxes};
use crate::error::RepositoryError;

/// Input for opening a cashbox or bank account.
#[derive(Debug, Clone)]
pub struct CreateCashAccountInput {
    /// Owning entity.
    pub entity_id: EntityId,
    /// Optional branch.
    pub branch_id: Option<BranchId>,
    /// Display name.
    pub name: String,
    /// Bank account number; ignored for cashboxes.
    pub account_number: Option<String>,
    /// Balance before the first settlement.
    pub opening_balance: Decimal,
    /// Date the opening balance is effective from.
    pub opening_balance_date: Option<NaiveDate>,
}

/// Cashbox and bank account repository.
#[derive(Debug, Clone)]
pub struct CashAccountRepository {
    db: DatabaseConnection,
}

impl CashAccountRepository {
    /// Creates a new cash account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Opens a cashbox.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an opening balance with more than two
    /// decimals, or a database error.
    pub async fn create_cashbox(
        &self,
        input: CreateCashAccountInput,
    ) -> Result<CashAccount, RepositoryError> {
        ensure_opening_balance(input.opening_balance)?;
        let now = Utc::now().into();
        let model = cashboxes::ActiveModel {
            id: Set(CashboxId::new().into_inner()),
            entity_id: Set(input.entity_id.into_inner()),
            branch_id: Set(input.branch_id.map(BranchId::into_inner)),
            name: Set(input.name),
            opening_balance: Set(input.opening_balance),
            opening_balance_date: Set(input.opening_balance_date),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        tracing::info!(cashbox_id = %model.id, name = %model.name, "Cashbox created");
        Ok(convert::cashbox(model))
    }

    /// Opens a bank account.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an opening balance with more than two
    /// decimals, or a database error.
    pub async fn create_bank_account(
        &self,
        input: CreateCashAccountInput,
    ) -> Result<CashAccount, RepositoryError> {
        ensure_opening_balance(input.opening_balance)?;
        let now = Utc::now().into();
        let model = bank_accounts::ActiveModel {
            id: Set(BankAccountId::new().into_inner()),
            entity_id: Set(input.entity_id.into_inner()),
            branch_id: Set(input.branch_id.map(BranchId::into_inner)),
            name: Set(input.name),
            account_number: Set(input.account_number),
            opening_balance: Set(input.opening_balance),
            opening_balance_date: Set(input.opening_balance_date),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        tracing::info!(bank_account_id = %model.id, name = %model.name, "Bank account created");
        Ok(convert::bank_account(model))
    }

    /// Gets an account of an entity.
    ///
    /// # Errors
    ///
    /// Returns not-found if the account does not exist in the entity.
    pub async fn get(
        &self,
        entity_id: EntityId,
        account: AccountRef,
    ) -> Result<CashAccount, RepositoryError> {
        let found = Self::get_in(&self.db, account).await?;
        if found.entity_id != entity_id {
            return Err(not_found(account).into());
        }
        Ok(found)
    }

    pub(crate) async fn get_in<C: ConnectionTrait>(
        conn: &C,
        account: AccountRef,
    ) -> Result<CashAccount, RepositoryError> {
        let found = match account {
            AccountRef::Cashbox(id) => cashboxes::Entity::find_by_id(id.into_inner())
                .one(conn)
                .await?
                .map(convert::cashbox),
            AccountRef::Bank(id) => bank_accounts::Entity::find_by_id(id.into_inner())
                .one(conn)
                .await?
                .map(convert::bank_account),
        };
        found.ok_or_else(|| not_found(account).into())
    }

    /// Checks that a new settlement of `entity_id` may move money through
    /// `account`.
    pub(crate) async fn ensure_usable_in<C: ConnectionTrait>(
        conn: &C,
        entity_id: EntityId,
        account: AccountRef,
    ) -> Result<(), RepositoryError> {
        let found = Self::get_in(conn, account).await?;
        if found.entity_id != entity_id {
            return Err(LedgerError::EntityMismatch {
                kind: "account",
                id: account_uuid(account),
                entity_id: entity_id.into_inner(),
            }
            .into());
        }
        if !found.is_active {
            return Err(LedgerError::InvalidAccount(format!("{account} is inactive")).into());
        }
        Ok(())
    }
}

fn ensure_opening_balance(amount: Decimal) -> Result<(), LedgerError> {
    if has_money_scale(amount) {
        Ok(())
    } else {
        Err(LedgerError::ExcessivePrecision(amount))
    }
}

fn account_uuid(account: AccountRef) -> uuid::Uuid {
    match account {
        AccountRef::Cashbox(id) => id.into_inner(),
        AccountRef::Bank(id) => id.into_inner(),
    }
}

fn not_found(account: AccountRef) -> LedgerError {
    match account {
        AccountRef::Cashbox(id) => LedgerError::not_found("cashbox", id),
        AccountRef::Bank(id) => LedgerError::not_found("bank account", id),
    }
}
