//! # Storage Module
//!
//! Durable state for a vault running as a conventional server. The ledger
//! itself lives in memory; every committed operation is mirrored to disk in
//! one atomic batch so a crash can never leave a claim updated without the
//! matching aggregate, or either without its event.
//!
//! ```text
//! db.rs — sled persistence: claims, aggregate, event log, vault metadata
//! ```

pub mod db;

use std::fmt;

pub use db::{DbError, DbResult, LedgerCommit, LedgerDb};

/// Where a vault mirrors its committed operations.
///
/// [`LedgerDb`] is the production log. A failed commit must leave nothing
/// behind; the vault undoes its in-memory change when this returns `Err`.
pub trait CommitLog: fmt::Debug + Send + Sync {
    fn commit(&self, commit: LedgerCommit<'_>) -> DbResult<()>;
}

impl CommitLog for LedgerDb {
    fn commit(&self, commit: LedgerCommit<'_>) -> DbResult<()> {
        LedgerDb::commit(self, commit)
    }
}
