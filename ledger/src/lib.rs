// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Custody Ledger — Core Library
//!
//! The bookkeeping half of the custody vault: who is owed what, who is
//! allowed to ask, and how assets move in and out of custody.
//!
//! ## Architecture
//!
//! - **types** — Account addresses, amounts, and the asset a vault holds.
//! - **access** — The single-owner access policy.
//! - **balance** — Per-depositor claims and the custodied aggregate.
//! - **events** — Lifecycle events and their sequenced records.
//! - **error** — The vault error taxonomy.
//! - **asset** — The transfer seam plus reference token and native ledgers.
//! - **storage** — sled persistence with atomic per-operation commits.
//! - **config** — Constants and defaults.
//!
//! ## Design Principles
//!
//! 1. Money arithmetic is checked. Overflow aborts, it never wraps.
//! 2. The ledger, not the asset ledger, is the source of truth for claims.
//! 3. Every rejected operation surfaces a distinct, matchable error.
//! 4. If it touches money, it has tests. Plural.

pub mod access;
pub mod asset;
pub mod balance;
pub mod config;
pub mod error;
pub mod events;
pub mod storage;
pub mod types;

pub use access::AccessControl;
pub use balance::{BalanceLedger, LedgerError, LedgerSnapshot};
pub use error::{TransferError, VaultError};
pub use events::{EventRecord, VaultEvent};
pub use types::{Address, Amount, AssetKind};
