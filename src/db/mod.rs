//! Database module: durable store for accounts, usage records, and model
//! aliases.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `patch.rs`: create/patch payloads
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `actor.rs`: ractor actor serializing all access to the pool

pub mod actor;
pub mod models;
pub mod patch;
pub mod schema;

pub use actor::{DbActorHandle, spawn};
pub use models::{DbAccount, DbModelAlias, UsageSummaryRow};
pub use patch::{AccountCreate, AccountPatch, AliasCreate, UsageRecordCreate};
pub use schema::SQLITE_INIT;
