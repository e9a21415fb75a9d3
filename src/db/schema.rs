use sqlx::PgPool;

pub const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id      BIGSERIAL PRIMARY KEY,
    name    TEXT   NOT NULL CHECK (name <> ''),
    balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0)
)
"#;

pub const CREATE_TRANSFERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfers (
    seq        BIGSERIAL PRIMARY KEY,
    from_id    BIGINT NOT NULL REFERENCES accounts (id),
    to_id      BIGINT NOT NULL REFERENCES accounts (id),
    amount     BIGINT NOT NULL CHECK (amount > 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// Create the ledger tables if they do not exist yet.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Initializing ledger schema...");

    sqlx::query(CREATE_ACCOUNTS_TABLE).execute(pool).await?;
    sqlx::query(CREATE_TRANSFERS_TABLE).execute(pool).await?;

    tracing::info!("Ledger schema initialized successfully");
    Ok(())
}
