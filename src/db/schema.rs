//! Ledger DDL
//!
//! Constraint names are part of the store contract: `From<sqlx::Error>`
//! classifies violations by them, see [`crate::store`].

pub const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id          BIGSERIAL PRIMARY KEY,
    owner       VARCHAR(255) NOT NULL,
    balance     BIGINT NOT NULL,
    currency    VARCHAR(16) NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT balance_nonnegative CHECK (balance >= 0)
)
"#;

pub const CREATE_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id          BIGSERIAL PRIMARY KEY,
    account_id  BIGINT NOT NULL,
    amount      BIGINT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT entries_account_fk FOREIGN KEY (account_id) REFERENCES accounts (id)
)
"#;

pub const CREATE_TRANSFERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfers (
    id               BIGSERIAL PRIMARY KEY,
    from_account_id  BIGINT NOT NULL,
    to_account_id    BIGINT NOT NULL,
    amount           BIGINT NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT transfers_amount_positive CHECK (amount > 0),
    CONSTRAINT transfers_from_account_fk FOREIGN KEY (from_account_id) REFERENCES accounts (id),
    CONSTRAINT transfers_to_account_fk FOREIGN KEY (to_account_id) REFERENCES accounts (id)
)
"#;

pub const CREATE_INDEXES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts (owner)",
    "CREATE INDEX IF NOT EXISTS idx_entries_account_id ON entries (account_id)",
    "CREATE INDEX IF NOT EXISTS idx_transfers_from_account_id ON transfers (from_account_id)",
    "CREATE INDEX IF NOT EXISTS idx_transfers_to_account_id ON transfers (to_account_id)",
];

/// Every statement in execution order; tables before the indexes on them
pub fn statements() -> impl Iterator<Item = &'static str> {
    [
        CREATE_ACCOUNTS_TABLE,
        CREATE_ENTRIES_TABLE,
        CREATE_TRANSFERS_TABLE,
    ]
    .into_iter()
    .chain(CREATE_INDEXES)
}
