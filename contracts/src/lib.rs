//! # Custody Vault Contracts
//!
//! The orchestration layer of the custody vault. A [`Vault`] validates each
//! call, updates its ledger, moves the asset through a borrowed
//! [`TransferAdapter`](custody_ledger::asset::TransferAdapter), and emits an
//! event. Two sibling variants share this one implementation:
//!
//! - **Native vault** (`Vault::native`) — custodies the platform currency.
//! - **Token vault** (`Vault::token`) — custodies one ERC-20 shaped token;
//!   depositors approve the vault before depositing.
//!
//! [`SharedVault`] packages a vault with its adapter behind a lock for
//! multi-threaded hosts and refuses re-entrant calls.
//!
//! ## Design Principles
//!
//! 1. Checks, then effects, then interactions. A withdrawal is debited
//!    before the asset leaves, and re-credited if it fails to leave.
//! 2. An operation is all-or-nothing. No partial credit, no partial debit,
//!    no event for anything that did not commit.
//! 3. The owner is a custodian, never a depositor.

pub mod shared;
pub mod vault;

pub use shared::SharedVault;
pub use vault::{OperationReceipt, Reconciliation, Vault};
