//! PostgreSQL schema for the ledger
//!
//! Idempotent DDL applied at startup. `organizations` and `products` belong to
//! the catalog services; they are created here only so a fresh database is
//! usable in dev.

use sqlx::PgPool;

use crate::error::StoreResult;

pub const CREATE_DIRECTORY_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS organizations (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    org_type        TEXT NOT NULL,
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    expiry_months   INTEGER
);

CREATE TABLE IF NOT EXISTS products (
    id                   TEXT PRIMARY KEY,
    name                 TEXT NOT NULL,
    owner_org_id         TEXT NOT NULL REFERENCES organizations(id),
    is_active            BOOLEAN NOT NULL DEFAULT TRUE,
    deactivation_reason  TEXT
);
"#;

pub const CREATE_LEDGER_TABLES: &str = r#"
CREATE SEQUENCE IF NOT EXISTS virtual_code_seq;

CREATE TABLE IF NOT EXISTS lots (
    id                UUID PRIMARY KEY,
    product_id        TEXT NOT NULL,
    issuer_org_id     TEXT NOT NULL,
    lot_number        TEXT NOT NULL,
    quantity          INTEGER NOT NULL CHECK (quantity > 0),
    manufacture_date  DATE NOT NULL,
    expiry_date       DATE NOT NULL,
    created_at        TIMESTAMPTZ NOT NULL,
    CONSTRAINT lots_product_lot_number_key UNIQUE (product_id, lot_number)
);

CREATE TABLE IF NOT EXISTS virtual_codes (
    id          UUID PRIMARY KEY,
    lot_id      UUID NOT NULL REFERENCES lots(id),
    code        TEXT NOT NULL,
    status      TEXT NOT NULL CHECK (status IN ('IN_STOCK', 'USED', 'DISPOSED')),
    owner_type  TEXT NOT NULL CHECK (owner_type IN ('ORGANIZATION', 'PATIENT')),
    owner_id    TEXT NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT virtual_codes_code_key UNIQUE (code),
    CONSTRAINT virtual_codes_in_stock_owner_check
        CHECK (status <> 'IN_STOCK' OR owner_type = 'ORGANIZATION')
);

CREATE INDEX IF NOT EXISTS idx_virtual_codes_owner
    ON virtual_codes (owner_type, owner_id, status);
CREATE INDEX IF NOT EXISTS idx_virtual_codes_lot ON virtual_codes (lot_id);

CREATE TABLE IF NOT EXISTS shipment_batches (
    id               UUID PRIMARY KEY,
    from_org_id      TEXT NOT NULL,
    to_org_id        TEXT NOT NULL,
    to_org_type      TEXT NOT NULL,
    shipment_date    TIMESTAMPTZ NOT NULL,
    is_recalled      BOOLEAN NOT NULL DEFAULT FALSE,
    recall_reason    TEXT,
    recall_date      TIMESTAMPTZ,
    is_return_batch  BOOLEAN NOT NULL DEFAULT FALSE,
    parent_batch_id  UUID REFERENCES shipment_batches(id),
    CONSTRAINT shipment_batches_no_self_check CHECK (from_org_id <> to_org_id),
    CONSTRAINT shipment_batches_return_parent_check
        CHECK (NOT is_return_batch OR parent_batch_id IS NOT NULL)
);

CREATE TABLE IF NOT EXISTS shipment_details (
    shipment_batch_id  UUID NOT NULL REFERENCES shipment_batches(id),
    virtual_code_id    UUID NOT NULL REFERENCES virtual_codes(id),
    PRIMARY KEY (shipment_batch_id, virtual_code_id)
);

CREATE TABLE IF NOT EXISTS patients (
    phone       TEXT PRIMARY KEY,
    created_at  TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS treatment_records (
    id              UUID PRIMARY KEY,
    hospital_id     TEXT NOT NULL,
    patient_phone   TEXT NOT NULL REFERENCES patients(phone),
    treatment_date  DATE NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS treatment_details (
    treatment_id     UUID NOT NULL REFERENCES treatment_records(id) ON DELETE CASCADE,
    virtual_code_id  UUID NOT NULL REFERENCES virtual_codes(id),
    PRIMARY KEY (treatment_id, virtual_code_id)
);

CREATE TABLE IF NOT EXISTS disposal_records (
    id             UUID PRIMARY KEY,
    hospital_id    TEXT NOT NULL,
    disposal_date  DATE NOT NULL,
    reason_type    TEXT NOT NULL,
    reason_custom  TEXT,
    created_at     TIMESTAMPTZ NOT NULL,
    CONSTRAINT disposal_records_reason_check
        CHECK (reason_type <> 'OTHER' OR length(trim(coalesce(reason_custom, ''))) > 0)
);

CREATE TABLE IF NOT EXISTS disposal_details (
    disposal_id      UUID NOT NULL REFERENCES disposal_records(id),
    virtual_code_id  UUID NOT NULL REFERENCES virtual_codes(id),
    PRIMARY KEY (disposal_id, virtual_code_id)
);

CREATE TABLE IF NOT EXISTS history (
    id                 UUID PRIMARY KEY,
    virtual_code_id    UUID NOT NULL REFERENCES virtual_codes(id),
    lot_id             UUID NOT NULL,
    product_id         TEXT NOT NULL,
    action_type        TEXT NOT NULL,
    from_owner_type    TEXT NOT NULL,
    from_owner_id      TEXT NOT NULL,
    to_owner_type      TEXT NOT NULL,
    to_owner_id        TEXT NOT NULL,
    shipment_batch_id  UUID,
    treatment_id       UUID,
    disposal_id        UUID,
    is_recall          BOOLEAN NOT NULL DEFAULT FALSE,
    recall_reason      TEXT,
    created_at         TIMESTAMPTZ NOT NULL,
    CONSTRAINT history_recall_reason_check CHECK (NOT is_recall OR recall_reason IS NOT NULL)
);

CREATE INDEX IF NOT EXISTS idx_history_from ON history (from_owner_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_history_to ON history (to_owner_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_history_unit ON history (virtual_code_id, created_at);

CREATE TABLE IF NOT EXISTS organization_alerts (
    id                UUID PRIMARY KEY,
    recipient_org_id  TEXT NOT NULL,
    alert_type        TEXT NOT NULL,
    title             TEXT NOT NULL,
    content           TEXT NOT NULL,
    metadata          JSONB NOT NULL DEFAULT '{}'::jsonb,
    is_read           BOOLEAN NOT NULL DEFAULT FALSE,
    read_at           TIMESTAMPTZ,
    created_at        TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_alerts_recipient
    ON organization_alerts (recipient_org_id, created_at DESC);

CREATE TABLE IF NOT EXISTS inactive_product_usage_logs (
    id                   UUID PRIMARY KEY,
    usage_type           TEXT NOT NULL,
    usage_id             UUID NOT NULL,
    product_id           TEXT NOT NULL,
    organization_id      TEXT NOT NULL,
    quantity             INTEGER NOT NULL,
    deactivation_reason  TEXT,
    created_at           TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_outbox (
    id                 UUID PRIMARY KEY,
    notification_type  TEXT NOT NULL,
    patient_phone      TEXT NOT NULL,
    content            TEXT NOT NULL,
    created_at         TIMESTAMPTZ NOT NULL,
    dispatched_at      TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS idx_outbox_pending
    ON notification_outbox (created_at) WHERE dispatched_at IS NULL;
"#;

/// Apply the schema
pub async fn init_schema(pool: &PgPool) -> StoreResult<()> {
    tracing::info!("Initializing ledger schema...");

    sqlx::raw_sql(CREATE_DIRECTORY_TABLES).execute(pool).await?;
    sqlx::raw_sql(CREATE_LEDGER_TABLES).execute(pool).await?;

    tracing::info!("Ledger schema ready");
    Ok(())
}
