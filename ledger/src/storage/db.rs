//! # LedgerDb — Persistent Vault State
//!
//! Built on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                   | Value                     |
//! |------------|-----------------------|---------------------------|
//! | `vault`    | `bal:` + address      | claim (16B BE u128)       |
//! | `vault`    | `total`               | aggregate (16B BE u128)   |
//! | `vault`    | `evt:` + seq (8B BE)  | `bincode(EventRecord)`    |
//! | `metadata` | `owner`               | `bincode(Address)`        |
//! | `metadata` | `asset`               | `bincode(AssetKind)`      |
//!
//! Sequence numbers are big-endian so that sled's lexicographic ordering
//! matches numeric ordering and a prefix scan yields the log in order.
//!
//! ## Atomicity
//!
//! Claims, aggregate and events share the `vault` tree so that one
//! operation's writes go through a single `Batch`. Either all of them land
//! or none do.

use sled::{Batch, Db, Tree};
use std::path::Path;

use crate::events::EventRecord;
use crate::types::{Address, Amount, AssetKind};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt record under key {0}")]
    Corrupt(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

const BALANCE_PREFIX: &[u8] = b"bal:";
const EVENT_PREFIX: &[u8] = b"evt:";
const TOTAL_KEY: &[u8] = b"total";
const META_OWNER: &[u8] = b"owner";
const META_ASSET: &[u8] = b"asset";

fn balance_key(depositor: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(BALANCE_PREFIX.len() + depositor.as_bytes().len());
    key.extend_from_slice(BALANCE_PREFIX);
    key.extend_from_slice(depositor.as_bytes());
    key
}

fn event_key(seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(EVENT_PREFIX.len() + 8);
    key.extend_from_slice(EVENT_PREFIX);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn decode_amount(key: &[u8], bytes: &[u8]) -> DbResult<Amount> {
    let raw: [u8; 16] = bytes
        .try_into()
        .map_err(|_| DbError::Corrupt(String::from_utf8_lossy(key).into_owned()))?;
    Ok(u128::from_be_bytes(raw))
}

// ---------------------------------------------------------------------------
// LedgerCommit
// ---------------------------------------------------------------------------

/// Everything one committed operation changes on disk.
#[derive(Debug, Clone, Copy)]
pub struct LedgerCommit<'a> {
    pub depositor: &'a Address,
    /// The depositor's claim after the operation. Zero removes the entry.
    pub balance: Amount,
    /// The aggregate after the operation.
    pub total: Amount,
    pub record: &'a EventRecord,
}

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Persistent storage for one vault.
///
/// sled is thread-safe, so a `LedgerDb` can be cloned and shared. The vault
/// still serializes its own writes.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    vault: Tree,
    metadata: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a database that lives in memory and disappears on drop.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let vault = db.open_tree("vault")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            vault,
            metadata,
        })
    }

    // -- Metadata -----------------------------------------------------------

    /// Records which owner and asset this database belongs to.
    pub fn put_metadata(&self, owner: &Address, asset: &AssetKind) -> DbResult<()> {
        let owner_bytes =
            bincode::serialize(owner).map_err(|e| DbError::Serialization(e.to_string()))?;
        let asset_bytes =
            bincode::serialize(asset).map_err(|e| DbError::Serialization(e.to_string()))?;

        let mut batch = Batch::default();
        batch.insert(META_OWNER, owner_bytes);
        batch.insert(META_ASSET, asset_bytes);
        self.metadata.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    /// The owner and asset recorded by [`put_metadata`](Self::put_metadata),
    /// or `None` for a fresh database.
    pub fn get_metadata(&self) -> DbResult<Option<(Address, AssetKind)>> {
        let owner = match self.metadata.get(META_OWNER)? {
            Some(bytes) => bincode::deserialize::<Address>(&bytes)
                .map_err(|e| DbError::Serialization(e.to_string()))?,
            None => return Ok(None),
        };
        let asset = match self.metadata.get(META_ASSET)? {
            Some(bytes) => bincode::deserialize::<AssetKind>(&bytes)
                .map_err(|e| DbError::Serialization(e.to_string()))?,
            None => return Err(DbError::Corrupt("asset".to_string())),
        };
        Ok(Some((owner, asset)))
    }

    // -- Commits ------------------------------------------------------------

    /// Persist one committed operation atomically and flush it to disk.
    pub fn commit(&self, commit: LedgerCommit<'_>) -> DbResult<()> {
        let record_bytes = bincode::serialize(commit.record)
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        let mut batch = Batch::default();
        let key = balance_key(commit.depositor);
        if commit.balance == 0 {
            batch.remove(key);
        } else {
            batch.insert(key, &commit.balance.to_be_bytes()[..]);
        }
        batch.insert(TOTAL_KEY, &commit.total.to_be_bytes()[..]);
        batch.insert(event_key(commit.record.seq), record_bytes);

        self.vault.apply_batch(batch)?;
        self.db.flush()?;

        tracing::debug!(
            depositor = %commit.depositor,
            seq = commit.record.seq,
            total = %commit.total,
            "ledger commit persisted"
        );
        Ok(())
    }

    // -- Reads --------------------------------------------------------------

    /// Every persisted `(depositor, claim)` pair.
    pub fn load_entries(&self) -> DbResult<Vec<(Address, Amount)>> {
        let mut entries = Vec::new();
        for item in self.vault.scan_prefix(BALANCE_PREFIX) {
            let (key, value) = item?;
            let address = std::str::from_utf8(&key[BALANCE_PREFIX.len()..])
                .map_err(|_| DbError::Corrupt(String::from_utf8_lossy(&key).into_owned()))?;
            entries.push((Address::new(address), decode_amount(&key, &value)?));
        }
        Ok(entries)
    }

    /// The persisted aggregate, or `None` if nothing was ever committed.
    pub fn load_total(&self) -> DbResult<Option<Amount>> {
        match self.vault.get(TOTAL_KEY)? {
            Some(bytes) => Ok(Some(decode_amount(TOTAL_KEY, &bytes)?)),
            None => Ok(None),
        }
    }

    /// The persisted event log in sequence order.
    pub fn load_events(&self) -> DbResult<Vec<EventRecord>> {
        let mut events = Vec::new();
        for item in self.vault.scan_prefix(EVENT_PREFIX) {
            let (_key, value) = item?;
            let record: EventRecord = bincode::deserialize(&value)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            events.push(record);
        }
        Ok(events)
    }

    /// Number of persisted events.
    pub fn event_count(&self) -> usize {
        self.vault.scan_prefix(EVENT_PREFIX).count()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
