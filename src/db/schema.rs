//! SQL DDL for initializing the database schema.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema includes:
/// - `account` table (one identity + credential per row, keyed by the
///   email-derived id)
/// - `usage_log` table (append-only request log)
/// - `model_alias` table (source_model -> target_model overrides)
pub const SQLITE_INIT: &str = r#"
-- ---------------------------------------------------------------------------
-- Accounts (identity + credential, one row each)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS account (
    id TEXT PRIMARY KEY NOT NULL,
    email TEXT NOT NULL,
    name TEXT NULL,
    access_token TEXT NULL,
    refresh_token TEXT NOT NULL,
    expiry TEXT NOT NULL, -- RFC3339
    project_id TEXT NULL,
    session_id TEXT NULL,
    subscription_tier TEXT NULL,
    quota_score REAL NULL,
    created_at TEXT NOT NULL, -- RFC3339
    last_used TEXT NOT NULL -- RFC3339
);

-- ---------------------------------------------------------------------------
-- Usage log (append-only, best-effort)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS usage_log (
    id INTEGER PRIMARY KEY NOT NULL,
    timestamp TEXT NOT NULL, -- RFC3339
    protocol TEXT NOT NULL,
    model TEXT NOT NULL,
    account_email TEXT NOT NULL,
    success INTEGER NOT NULL,
    status_code INTEGER NOT NULL,
    elapsed_ms INTEGER NOT NULL,
    error_kind TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_usage_log_protocol ON usage_log(protocol);

-- ---------------------------------------------------------------------------
-- Model aliases (source_model is the unique key)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS model_alias (
    id INTEGER PRIMARY KEY NOT NULL,
    source_model TEXT NOT NULL UNIQUE,
    target_model TEXT NOT NULL,
    description TEXT NULL
);
"#;
