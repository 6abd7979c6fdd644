use crate::db::models::{DbAccount, DbModelAlias, UsageSummaryRow};
use crate::db::patch::{AccountCreate, AccountPatch, AliasCreate, UsageRecordCreate};
use crate::db::schema::SQLITE_INIT;
use crate::error::CastorError;
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::info;

#[derive(Debug)]
pub enum DbActorMessage {
    /// List all stored accounts.
    ListAccounts(RpcReplyPort<Result<Vec<DbAccount>, CastorError>>),

    /// Get one account by id.
    GetAccount(String, RpcReplyPort<Result<Option<DbAccount>, CastorError>>),

    /// Create or update an account; returns its id.
    UpsertAccount(AccountCreate, RpcReplyPort<Result<String, CastorError>>),

    /// Delete an account by id; returns whether a row existed.
    DeleteAccount(String, RpcReplyPort<Result<bool, CastorError>>),

    /// Partial credential update by id.
    PatchAccount(
        String,
        AccountPatch,
        RpcReplyPort<Result<(), CastorError>>,
    ),

    /// Store a freshly polled quota score.
    UpdateQuotaScore(String, f64, RpcReplyPort<Result<(), CastorError>>),

    /// Append one usage record (no reply; best-effort).
    InsertUsage(UsageRecordCreate),

    ListAliases(RpcReplyPort<Result<Vec<DbModelAlias>, CastorError>>),

    /// Look up the alias target for a source model.
    GetAlias(String, RpcReplyPort<Result<Option<String>, CastorError>>),

    UpsertAlias(AliasCreate, RpcReplyPort<Result<(), CastorError>>),

    DeleteAlias(String, RpcReplyPort<Result<bool, CastorError>>),

    UsageSummary(RpcReplyPort<Result<Vec<UsageSummaryRow>, CastorError>>),
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

impl DbActorHandle {
    pub async fn list_accounts(&self) -> Result<Vec<DbAccount>, CastorError> {
        ractor::call!(self.actor, DbActorMessage::ListAccounts)
            .map_err(|e| CastorError::Actor(format!("DbActor ListAccounts RPC failed: {e}")))?
    }

    pub async fn get_account(&self, id: &str) -> Result<Option<DbAccount>, CastorError> {
        ractor::call!(self.actor, DbActorMessage::GetAccount, id.to_string())
            .map_err(|e| CastorError::Actor(format!("DbActor GetAccount RPC failed: {e}")))?
    }

    pub async fn upsert_account(&self, create: AccountCreate) -> Result<String, CastorError> {
        ractor::call!(self.actor, DbActorMessage::UpsertAccount, create)
            .map_err(|e| CastorError::Actor(format!("DbActor UpsertAccount RPC failed: {e}")))?
    }

    pub async fn delete_account(&self, id: &str) -> Result<bool, CastorError> {
        ractor::call!(self.actor, DbActorMessage::DeleteAccount, id.to_string())
            .map_err(|e| CastorError::Actor(format!("DbActor DeleteAccount RPC failed: {e}")))?
    }

    pub async fn patch_account(&self, id: &str, patch: AccountPatch) -> Result<(), CastorError> {
        ractor::call!(
            self.actor,
            DbActorMessage::PatchAccount,
            id.to_string(),
            patch
        )
        .map_err(|e| CastorError::Actor(format!("DbActor PatchAccount RPC failed: {e}")))?
    }

    pub async fn update_quota_score(&self, id: &str, score: f64) -> Result<(), CastorError> {
        ractor::call!(
            self.actor,
            DbActorMessage::UpdateQuotaScore,
            id.to_string(),
            score
        )
        .map_err(|e| CastorError::Actor(format!("DbActor UpdateQuotaScore RPC failed: {e}")))?
    }

    /// Fire-and-forget usage logging; a closed mailbox is ignored.
    pub fn insert_usage(&self, record: UsageRecordCreate) {
        let _ = self.actor.cast(DbActorMessage::InsertUsage(record));
    }

    pub async fn list_aliases(&self) -> Result<Vec<DbModelAlias>, CastorError> {
        ractor::call!(self.actor, DbActorMessage::ListAliases)
            .map_err(|e| CastorError::Actor(format!("DbActor ListAliases RPC failed: {e}")))?
    }

    pub async fn get_alias(&self, source_model: &str) -> Result<Option<String>, CastorError> {
        ractor::call!(
            self.actor,
            DbActorMessage::GetAlias,
            source_model.to_string()
        )
        .map_err(|e| CastorError::Actor(format!("DbActor GetAlias RPC failed: {e}")))?
    }

    pub async fn upsert_alias(&self, create: AliasCreate) -> Result<(), CastorError> {
        ractor::call!(self.actor, DbActorMessage::UpsertAlias, create)
            .map_err(|e| CastorError::Actor(format!("DbActor UpsertAlias RPC failed: {e}")))?
    }

    pub async fn delete_alias(&self, source_model: &str) -> Result<bool, CastorError> {
        ractor::call!(
            self.actor,
            DbActorMessage::DeleteAlias,
            source_model.to_string()
        )
        .map_err(|e| CastorError::Actor(format!("DbActor DeleteAlias RPC failed: {e}")))?
    }

    pub async fn usage_summary(&self) -> Result<Vec<UsageSummaryRow>, CastorError> {
        ractor::call!(self.actor, DbActorMessage::UsageSummary)
            .map_err(|e| CastorError::Actor(format!("DbActor UsageSummary RPC failed: {e}")))?
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DbActorMessage::ListAccounts(reply) => {
                let _ = reply.send(list_accounts(&state.pool).await);
            }
            DbActorMessage::GetAccount(id, reply) => {
                let _ = reply.send(get_account(&state.pool, &id).await);
            }
            DbActorMessage::UpsertAccount(create, reply) => {
                let _ = reply.send(upsert_account(&state.pool, create).await);
            }
            DbActorMessage::DeleteAccount(id, reply) => {
                let _ = reply.send(delete_account(&state.pool, &id).await);
            }
            DbActorMessage::PatchAccount(id, patch, reply) => {
                let _ = reply.send(patch_account(&state.pool, &id, patch).await);
            }
            DbActorMessage::UpdateQuotaScore(id, score, reply) => {
                let _ = reply.send(update_quota_score(&state.pool, &id, score).await);
            }
            DbActorMessage::InsertUsage(record) => {
                if let Err(e) = insert_usage(&state.pool, record).await {
                    tracing::warn!("usage log write failed: {e}");
                }
            }
            DbActorMessage::ListAliases(reply) => {
                let _ = reply.send(list_aliases(&state.pool).await);
            }
            DbActorMessage::GetAlias(source, reply) => {
                let _ = reply.send(get_alias(&state.pool, &source).await);
            }
            DbActorMessage::UpsertAlias(create, reply) => {
                let _ = reply.send(upsert_alias(&state.pool, create).await);
            }
            DbActorMessage::DeleteAlias(source, reply) => {
                let _ = reply.send(delete_alias(&state.pool, &source).await);
            }
            DbActorMessage::UsageSummary(reply) => {
                let _ = reply.send(usage_summary(&state.pool).await);
            }
        }
        Ok(())
    }
}

async fn list_accounts(pool: &SqlitePool) -> Result<Vec<DbAccount>, CastorError> {
    let rows = sqlx::query_as::<_, DbAccount>(
        r#"
    SELECT id, email, name, access_token, refresh_token, expiry, project_id,
           session_id, subscription_tier, quota_score, created_at, last_used
    FROM account
    ORDER BY id
    "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn get_account(pool: &SqlitePool, id: &str) -> Result<Option<DbAccount>, CastorError> {
    let row = sqlx::query_as::<_, DbAccount>(
        r#"
    SELECT id, email, name, access_token, refresh_token, expiry, project_id,
           session_id, subscription_tier, quota_score, created_at, last_used
    FROM account
    WHERE id = ?
    "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

async fn upsert_account(pool: &SqlitePool, c: AccountCreate) -> Result<String, CastorError> {
    if c.refresh_token.trim().is_empty() {
        return Err(CastorError::BadRequest(
            "account is missing a refresh_token".to_string(),
        ));
    }

    let now = Utc::now();
    let id: String = sqlx::query_scalar(
        r#"
    INSERT INTO account (
        id, email, name, access_token, refresh_token, expiry, project_id,
        session_id, subscription_tier, created_at, last_used
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        email = excluded.email,
        name = COALESCE(excluded.name, name),
        access_token = excluded.access_token,
        refresh_token = excluded.refresh_token,
        expiry = excluded.expiry,
        project_id = COALESCE(excluded.project_id, project_id),
        session_id = COALESCE(excluded.session_id, session_id),
        subscription_tier = COALESCE(excluded.subscription_tier, subscription_tier),
        last_used = excluded.last_used
    RETURNING id
    "#,
    )
    .bind(c.id)
    .bind(c.email)
    .bind(c.name)
    .bind(c.access_token)
    .bind(c.refresh_token)
    .bind(c.expiry)
    .bind(c.project_id)
    .bind(c.session_id)
    .bind(c.subscription_tier)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

async fn delete_account(pool: &SqlitePool, id: &str) -> Result<bool, CastorError> {
    let result = sqlx::query("DELETE FROM account WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn patch_account(
    pool: &SqlitePool,
    id: &str,
    patch: AccountPatch,
) -> Result<(), CastorError> {
    if patch.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
    UPDATE account SET
        access_token = COALESCE(?, access_token),
        refresh_token = COALESCE(?, refresh_token),
        expiry = COALESCE(?, expiry),
        project_id = COALESCE(?, project_id),
        subscription_tier = COALESCE(?, subscription_tier)
    WHERE id = ?
    "#,
    )
    .bind(patch.access_token)
    .bind(patch.refresh_token)
    .bind(patch.expiry)
    .bind(patch.project_id)
    .bind(patch.subscription_tier)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn update_quota_score(pool: &SqlitePool, id: &str, score: f64) -> Result<(), CastorError> {
    sqlx::query("UPDATE account SET quota_score = ? WHERE id = ?")
        .bind(score)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn insert_usage(pool: &SqlitePool, r: UsageRecordCreate) -> Result<(), CastorError> {
    sqlx::query(
        r#"
    INSERT INTO usage_log (
        timestamp, protocol, model, account_email, success, status_code,
        elapsed_ms, error_kind
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    "#,
    )
    .bind(Utc::now())
    .bind(r.protocol)
    .bind(r.model)
    .bind(r.account_email)
    .bind(r.success)
    .bind(i64::from(r.status_code))
    .bind(r.elapsed_ms)
    .bind(r.error_kind)
    .execute(pool)
    .await?;
    Ok(())
}

async fn list_aliases(pool: &SqlitePool) -> Result<Vec<DbModelAlias>, CastorError> {
    let rows = sqlx::query_as::<_, DbModelAlias>(
        "SELECT source_model, target_model, description FROM model_alias ORDER BY source_model",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn get_alias(pool: &SqlitePool, source: &str) -> Result<Option<String>, CastorError> {
    let target: Option<String> =
        sqlx::query_scalar("SELECT target_model FROM model_alias WHERE source_model = ?")
            .bind(source)
            .fetch_optional(pool)
            .await?;
    Ok(target)
}

async fn upsert_alias(pool: &SqlitePool, c: AliasCreate) -> Result<(), CastorError> {
    sqlx::query(
        r#"
    INSERT INTO model_alias (source_model, target_model, description)
    VALUES (?, ?, ?)
    ON CONFLICT(source_model) DO UPDATE SET
        target_model = excluded.target_model,
        description = excluded.description
    "#,
    )
    .bind(c.source_model)
    .bind(c.target_model)
    .bind(c.description)
    .execute(pool)
    .await?;
    Ok(())
}

async fn delete_alias(pool: &SqlitePool, source: &str) -> Result<bool, CastorError> {
    let result = sqlx::query("DELETE FROM model_alias WHERE source_model = ?")
        .bind(source)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn usage_summary(pool: &SqlitePool) -> Result<Vec<UsageSummaryRow>, CastorError> {
    let rows = sqlx::query_as::<_, UsageSummaryRow>(
        r#"
    SELECT protocol,
           COUNT(*) AS total,
           COALESCE(SUM(success), 0) AS succeeded,
           COALESCE(AVG(elapsed_ms), 0.0) AS avg_elapsed_ms
    FROM usage_log
    GROUP BY protocol
    ORDER BY protocol
    "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), CastorError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}

/// Spawn the database actor and return a cloneable handle.
pub async fn spawn(database_url: &str) -> DbActorHandle {
    let (actor, _jh) = ractor::Actor::spawn(None, DbActor, database_url.to_string())
        .await
        .expect("failed to spawn DbActor");

    DbActorHandle { actor }
}
