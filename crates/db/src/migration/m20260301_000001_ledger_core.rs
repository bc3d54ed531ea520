//! Initial ledger migration.
//!
//! Creates the enums, counterparty and cash account registries, accounting
//! periods, sequence counters, obligations, settlements and allocations.
//! Entities and branches are referenced by id only and have no tables here.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: REGISTRIES
        // ============================================================
        db.execute_unprepared(PARTIES_SQL).await?;
        db.execute_unprepared(CASH_ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: PERIODS & NUMBERING
        // ============================================================
        db.execute_unprepared(ACCOUNTING_PERIODS_SQL).await?;
        db.execute_unprepared(SEQUENCE_COUNTERS_SQL).await?;

        // ============================================================
        // PART 4: OBLIGATIONS
        // ============================================================
        db.execute_unprepared(OBLIGATIONS_SQL).await?;
        db.execute_unprepared(OBLIGATION_LINES_SQL).await?;
        db.execute_unprepared(OBLIGATION_INSTALLMENTS_SQL).await?;

        // ============================================================
        // PART 5: SETTLEMENTS & ALLOCATIONS
        // ============================================================
        db.execute_unprepared(SETTLEMENTS_SQL).await?;
        db.execute_unprepared(ALLOCATIONS_SQL).await?;

        // ============================================================
        // PART 6: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE party_type AS ENUM ('customer', 'supplier', 'employee', 'other');

CREATE TYPE obligation_type AS ENUM (
    'customer_invoice',
    'supplier_invoice',
    'payroll_due',
    'overtime_due',
    'advance_given',
    'advance_received',
    'expense_due',
    'income_due',
    'other'
);

CREATE TYPE obligation_direction AS ENUM ('receivable', 'payable');

CREATE TYPE obligation_status AS ENUM (
    'draft',
    'pending',
    'partial',
    'settled',
    'cancelled',
    'reversed'
);

CREATE TYPE settlement_type AS ENUM (
    'cash_in',
    'cash_out',
    'bank_in',
    'bank_out',
    'transfer',
    'cheque_in',
    'cheque_out',
    'internal_offset',
    'other'
);

CREATE TYPE settlement_direction AS ENUM ('in', 'out');

CREATE TYPE settlement_status AS ENUM ('draft', 'confirmed', 'cancelled', 'reversed');

CREATE TYPE allocation_status AS ENUM ('active', 'cancelled');

CREATE TYPE period_status AS ENUM ('open', 'locked', 'closed');

CREATE TYPE sequence_family AS ENUM ('document', 'payment');
";

const PARTIES_SQL: &str = r"
CREATE TABLE parties (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL,
    branch_id UUID,
    party_type party_type NOT NULL,
    code VARCHAR(50) NOT NULL,
    name VARCHAR(255) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (entity_id, party_type, code)
);

CREATE INDEX idx_parties_entity ON parties(entity_id) WHERE is_active = true;
";

const CASH_ACCOUNTS_SQL: &str = r"
CREATE TABLE cashboxes (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL,
    branch_id UUID,
    name VARCHAR(255) NOT NULL,
    opening_balance NUMERIC(19, 2) NOT NULL DEFAULT 0,
    opening_balance_date DATE,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_cashboxes_entity ON cashboxes(entity_id);

CREATE TABLE bank_accounts (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL,
    branch_id UUID,
    name VARCHAR(255) NOT NULL,
    account_number VARCHAR(64),
    opening_balance NUMERIC(19, 2) NOT NULL DEFAULT 0,
    opening_balance_date DATE,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_bank_accounts_entity ON bank_accounts(entity_id);
";

const ACCOUNTING_PERIODS_SQL: &str = r"
CREATE TABLE accounting_periods (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL,
    year INTEGER NOT NULL,
    month SMALLINT NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    status period_status NOT NULL DEFAULT 'open',
    locked_by UUID,
    locked_at TIMESTAMPTZ,
    closed_by UUID,
    closed_at TIMESTAMPTZ,
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_period_month CHECK (month BETWEEN 1 AND 12),
    CONSTRAINT chk_period_dates CHECK (end_date >= start_date),
    UNIQUE (entity_id, year, month)
);

CREATE INDEX idx_accounting_periods_frozen ON accounting_periods(entity_id, start_date)
    WHERE status <> 'open';
";

const SEQUENCE_COUNTERS_SQL: &str = r"
-- branch_scope is the nil uuid and sub_type the empty string when absent,
-- so that the unique key covers entity-wide counters too.
CREATE TABLE sequence_counters (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    entity_id UUID NOT NULL,
    branch_scope UUID NOT NULL DEFAULT '00000000-0000-0000-0000-000000000000',
    family sequence_family NOT NULL,
    sub_type VARCHAR(50) NOT NULL DEFAULT '',
    year INTEGER NOT NULL,
    last_value BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_sequence_non_negative CHECK (last_value >= 0),
    UNIQUE (entity_id, branch_scope, family, sub_type, year)
);
";

const OBLIGATIONS_SQL: &str = r"
CREATE TABLE obligations (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL,
    branch_id UUID,
    number VARCHAR(32) NOT NULL,
    obligation_type obligation_type NOT NULL,
    direction obligation_direction NOT NULL,
    party_id UUID NOT NULL REFERENCES parties(id) ON DELETE RESTRICT,
    obligation_date DATE NOT NULL,
    due_date DATE,
    total_amount NUMERIC(19, 2) NOT NULL,
    category_id UUID,
    status obligation_status NOT NULL DEFAULT 'pending',
    reversed_obligation_id UUID REFERENCES obligations(id) ON DELETE RESTRICT,
    reversal_obligation_id UUID REFERENCES obligations(id) ON DELETE RESTRICT,
    source_kind VARCHAR(50),
    source_id UUID,
    reference VARCHAR(255),
    description TEXT,
    notes TEXT,
    status_reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_obligation_amount CHECK (total_amount >= 0),
    CONSTRAINT chk_obligation_due CHECK (due_date IS NULL OR due_date >= obligation_date),
    CONSTRAINT chk_obligation_reversal_links CHECK (
        reversed_obligation_id IS NULL OR reversal_obligation_id IS NULL
    ),
    CONSTRAINT chk_obligation_source CHECK ((source_kind IS NULL) = (source_id IS NULL)),
    UNIQUE (entity_id, number)
);

CREATE INDEX idx_obligations_party_open ON obligations(party_id, direction, due_date)
    WHERE status IN ('pending', 'partial');
CREATE INDEX idx_obligations_entity_date ON obligations(entity_id, obligation_date);
CREATE INDEX idx_obligations_source ON obligations(source_kind, source_id)
    WHERE source_id IS NOT NULL;
";

const OBLIGATION_LINES_SQL: &str = r"
CREATE TABLE obligation_lines (
    id UUID PRIMARY KEY,
    obligation_id UUID NOT NULL REFERENCES obligations(id) ON DELETE CASCADE,
    line_no INTEGER NOT NULL,
    description TEXT NOT NULL,
    quantity NUMERIC(19, 4) NOT NULL,
    unit_price NUMERIC(19, 4) NOT NULL,
    discount_percent NUMERIC(7, 4) NOT NULL DEFAULT 0,
    tax_percent NUMERIC(7, 4) NOT NULL DEFAULT 0,
    subtotal NUMERIC(19, 2) NOT NULL,
    tax NUMERIC(19, 2) NOT NULL,
    total NUMERIC(19, 2) NOT NULL,
    CONSTRAINT chk_line_total CHECK (total = subtotal + tax),
    UNIQUE (obligation_id, line_no)
);
";

const OBLIGATION_INSTALLMENTS_SQL: &str = r"
CREATE TABLE obligation_installments (
    id UUID PRIMARY KEY,
    obligation_id UUID NOT NULL REFERENCES obligations(id) ON DELETE CASCADE,
    sequence_no INTEGER NOT NULL,
    due_date DATE NOT NULL,
    amount NUMERIC(19, 2) NOT NULL,
    CONSTRAINT chk_installment_amount CHECK (amount > 0),
    UNIQUE (obligation_id, sequence_no)
);
";

const SETTLEMENTS_SQL: &str = r"
CREATE TABLE settlements (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL,
    branch_id UUID,
    number VARCHAR(32) NOT NULL,
    settlement_type settlement_type NOT NULL,
    direction settlement_direction NOT NULL,
    party_id UUID REFERENCES parties(id) ON DELETE RESTRICT,
    cashbox_id UUID REFERENCES cashboxes(id) ON DELETE RESTRICT,
    bank_account_id UUID REFERENCES bank_accounts(id) ON DELETE RESTRICT,
    destination_cashbox_id UUID REFERENCES cashboxes(id) ON DELETE RESTRICT,
    destination_bank_account_id UUID REFERENCES bank_accounts(id) ON DELETE RESTRICT,
    settlement_date DATE NOT NULL,
    amount NUMERIC(19, 2) NOT NULL,
    fee_amount NUMERIC(19, 2) NOT NULL DEFAULT 0,
    net_amount NUMERIC(19, 2) NOT NULL,
    status settlement_status NOT NULL DEFAULT 'draft',
    reversed_settlement_id UUID REFERENCES settlements(id) ON DELETE RESTRICT,
    reversal_settlement_id UUID REFERENCES settlements(id) ON DELETE RESTRICT,
    reference VARCHAR(255),
    description TEXT,
    notes TEXT,
    status_reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_settlement_amount CHECK (amount > 0),
    CONSTRAINT chk_settlement_fee CHECK (fee_amount >= 0 AND fee_amount <= amount),
    CONSTRAINT chk_settlement_net CHECK (net_amount = amount - fee_amount),
    CONSTRAINT chk_settlement_account CHECK ((cashbox_id IS NULL) <> (bank_account_id IS NULL)),
    CONSTRAINT chk_settlement_destination CHECK (
        destination_cashbox_id IS NULL OR destination_bank_account_id IS NULL
    ),
    CONSTRAINT chk_settlement_reversal_links CHECK (
        reversed_settlement_id IS NULL OR reversal_settlement_id IS NULL
    ),
    UNIQUE (entity_id, number)
);

CREATE INDEX idx_settlements_entity_date ON settlements(entity_id, settlement_date);
CREATE INDEX idx_settlements_party ON settlements(party_id) WHERE party_id IS NOT NULL;
CREATE INDEX idx_settlements_cashbox ON settlements(cashbox_id, settlement_date)
    WHERE cashbox_id IS NOT NULL;
CREATE INDEX idx_settlements_bank ON settlements(bank_account_id, settlement_date)
    WHERE bank_account_id IS NOT NULL;
";

const ALLOCATIONS_SQL: &str = r"
CREATE TABLE allocations (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL,
    settlement_id UUID NOT NULL REFERENCES settlements(id) ON DELETE RESTRICT,
    obligation_id UUID NOT NULL REFERENCES obligations(id) ON DELETE RESTRICT,
    installment_id UUID REFERENCES obligation_installments(id) ON DELETE RESTRICT,
    amount NUMERIC(19, 2) NOT NULL,
    allocation_date DATE NOT NULL,
    status allocation_status NOT NULL DEFAULT 'active',
    notes TEXT,
    cancel_reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    cancelled_at TIMESTAMPTZ,
    CONSTRAINT chk_allocation_amount CHECK (amount > 0),
    CONSTRAINT chk_allocation_cancel CHECK ((status = 'cancelled') = (cancelled_at IS NOT NULL))
);

CREATE INDEX idx_allocations_obligation ON allocations(obligation_id) WHERE status = 'active';
CREATE INDEX idx_allocations_settlement ON allocations(settlement_id) WHERE status = 'active';
CREATE INDEX idx_allocations_installment ON allocations(installment_id)
    WHERE installment_id IS NOT NULL AND status = 'active';
";

const TRIGGERS_SQL: &str = r"
CREATE OR REPLACE FUNCTION touch_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_parties_touch BEFORE UPDATE ON parties
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
CREATE TRIGGER trg_cashboxes_touch BEFORE UPDATE ON cashboxes
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
CREATE TRIGGER trg_bank_accounts_touch BEFORE UPDATE ON bank_accounts
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
CREATE TRIGGER trg_accounting_periods_touch BEFORE UPDATE ON accounting_periods
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
CREATE TRIGGER trg_sequence_counters_touch BEFORE UPDATE ON sequence_counters
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
CREATE TRIGGER trg_obligations_touch BEFORE UPDATE ON obligations
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
CREATE TRIGGER trg_settlements_touch BEFORE UPDATE ON settlements
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

DROP TABLE IF EXISTS allocations CASCADE;
DROP TABLE IF EXISTS settlements CASCADE;
DROP TABLE IF EXISTS obligation_installments CASCADE;
DROP TABLE IF EXISTS obligation_lines CASCADE;
DROP TABLE IF EXISTS obligations CASCADE;
DROP TABLE IF EXISTS sequence_counters CASCADE;
DROP TABLE IF EXISTS accounting_periods CASCADE;
DROP TABLE IF EXISTS bank_accounts CASCADE;
DROP TABLE IF EXISTS cashboxes CASCADE;
DROP TABLE IF EXISTS parties CASCADE;

DROP FUNCTION IF EXISTS touch_updated_at();

DROP TYPE IF EXISTS sequence_family;
DROP TYPE IF EXISTS period_status;
DROP TYPE IF EXISTS allocation_status;
DROP TYPE IF EXISTS settlement_status;
DROP TYPE IF EXISTS settlement_direction;
DROP TYPE IF EXISTS settlement_type;
DROP TYPE IF EXISTS obligation_status;
DROP TYPE IF EXISTS obligation_direction;
DROP TYPE IF EXISTS obligation_type;
DROP TYPE IF EXISTS party_type;
";
