//! Development data seeder for Obligo.
//!
//! Seeds the configured demo entity with two parties, a cashbox, a bank
//! account and a few open obligations, then receives one payment and lets
//! auto-allocation apply it. Running it twice is a no-op.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::{Datelike, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use obligo_core::obligation::{CreateObligationInput, ObligationLineInput, ObligationType};
use obligo_core::party::PartyType;
use obligo_core::settlement::{CreateSettlementInput, SettlementType};
use obligo_db::repositories::{
    AllocationRepository, BalanceRepository, CashAccountRepository, CreateCashAccountInput,
    CreatePartyInput, ObligationRepository, PartyRepository, SettlementRepository,
};
use obligo_shared::AppConfig;
use obligo_shared::config::LoggingConfig;
use obligo_shared::types::EntityId;

const CUSTOMER_CODE: &str = "DEMO-C1";

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    let db = obligo_db::connect_with(&config.database)
        .await
        .context("failed to connect to database")?;
    info!("Connected to database");

    let entity_id = EntityId::from_uuid(config.ledger.demo_entity_id);
    let parties = PartyRepository::new(db.clone());
    if parties
        .list(entity_id, Some(PartyType::Customer))
        .await?
        .iter()
        .any(|p| p.code == CUSTOMER_CODE)
    {
        info!(entity_id = %entity_id, "Demo data already present, skipping");
        return Ok(());
    }

    let customer = parties
        .create(CreatePartyInput {
            entity_id,
            branch_id: None,
            party_type: PartyType::Customer,
            code: CUSTOMER_CODE.to_string(),
            name: "Demo Customer".to_string(),
        })
        .await?;
    let supplier = parties
        .create(CreatePartyInput {
            entity_id,
            branch_id: None,
            party_type: PartyType::Supplier,
            code: "DEMO-S1".to_string(),
            name: "Demo Supplier".to_string(),
        })
        .await?;

    let accounts = CashAccountRepository::new(db.clone());
    let today = Utc::now().date_naive();
    let year_start = today.with_ordinal(1).unwrap_or(today);
    let cashbox = accounts
        .create_cashbox(CreateCashAccountInput {
            entity_id,
            branch_id: None,
            name: "Front desk".to_string(),
            account_number: None,
            opening_balance: dec!(250.00),
            opening_balance_date: Some(year_start),
        })
        .await?;
    let bank = accounts
        .create_bank_account(CreateCashAccountInput {
            entity_id,
            branch_id: None,
            name: "Operating account".to_string(),
            account_number: Some("DE00 0000 0000 0000".to_string()),
            opening_balance: dec!(10000.00),
            opening_balance_date: Some(year_start),
        })
        .await?;

    let obligations = ObligationRepository::new(db.clone());
    let invoice = |amount: Decimal, age_days: i64, lines: Vec<ObligationLineInput>| {
        CreateObligationInput {
            entity_id,
            branch_id: None,
            obligation_type: ObligationType::CustomerInvoice,
            direction: None,
            party_id: customer.id,
            obligation_date: today - Duration::days(age_days),
            due_date: Some(today - Duration::days(age_days - 30)),
            total_amount: amount,
            category_id: None,
            source: None,
            reference: None,
            description: Some("Demo invoice".to_string()),
            notes: None,
            as_draft: false,
            lines,
            installments: Vec::new(),
        }
    };
    obligations
        .create(invoice(
            dec!(1190.00),
            75,
            vec![ObligationLineInput {
                description: "Consulting, 10h".to_string(),
                quantity: dec!(10),
                unit_price: dec!(100.00),
                discount_percent: Decimal::ZERO,
                tax_percent: dec!(19),
            }],
        ))
        .await?;
    obligations.create(invoice(dec!(480.00), 20, Vec::new())).await?;
    obligations
        .create(CreateObligationInput {
            obligation_type: ObligationType::SupplierInvoice,
            party_id: supplier.id,
            description: Some("Office supplies".to_string()),
            ..invoice(dec!(320.00), 10, Vec::new())
        })
        .await?;

    let payment = SettlementRepository::new(db.clone())
        .create(CreateSettlementInput {
            entity_id,
            branch_id: None,
            settlement_type: SettlementType::BankIn,
            direction: None,
            party_id: Some(customer.id),
            account: bank.account,
            destination: None,
            settlement_date: today,
            amount: dec!(1500.00),
            fee_amount: dec!(2.50),
            net_amount: None,
            reference: Some("Demo transfer".to_string()),
            description: None,
            notes: None,
            confirm: true,
        })
        .await?;
    let applied = AllocationRepository::new(db.clone())
        .auto_allocate(entity_id, payment.settlement.id, None)
        .await?;

    let balances = BalanceRepository::with_config(db.clone(), &config.ledger);
    let statement = balances.party_statement(entity_id, customer.id).await?;
    let cash = balances
        .account_balance_as_of(entity_id, cashbox.account, today)
        .await?;
    info!(
        entity_id = %entity_id,
        allocations = applied.len(),
        receivable = %statement.receivable,
        cashbox_balance = %cash,
        "Seeding complete"
    );
    Ok(())
}
