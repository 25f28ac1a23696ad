//! # Vault Error Taxonomy
//!
//! One enum for everything a vault operation can reject with. Every variant
//! is distinct so off-chain callers can branch on the cause (re-approve and
//! retry on `TransferFailed`, give up on `InsufficientBalance`). Nothing here
//! is retried automatically.

use thiserror::Error;

use crate::asset::native::BankError;
use crate::asset::token::TokenError;
use crate::balance::LedgerError;
use crate::storage::db::DbError;
use crate::types::{Address, Amount, AssetKind};

// ---------------------------------------------------------------------------
// TransferError
// ---------------------------------------------------------------------------

/// An external asset movement did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The token ledger refused the transfer (allowance, balance, overflow).
    #[error("token ledger: {0}")]
    Token(#[from] TokenError),

    /// The native value platform refused the transfer.
    #[error("native transfer: {0}")]
    Native(#[from] BankError),

    /// A custom adapter failed for its own reasons.
    #[error("{0}")]
    Adapter(String),
}

// ---------------------------------------------------------------------------
// VaultError
// ---------------------------------------------------------------------------

/// Errors returned by vault operations. Every error aborts the operation
/// with no partial state change.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The owner tried to use a depositor-only operation.
    #[error("operation not permitted for the owner ({caller})")]
    NotPermittedForOwner { caller: Address },

    /// The vault's own custodian account tried to deposit or withdraw.
    /// Moving assets from the custodian to itself backs nothing.
    #[error("operation not permitted for the custodian account ({caller})")]
    NotPermittedForCustodian { caller: Address },

    /// Deposit or withdraw of zero.
    #[error("zero-value operations are not allowed")]
    ZeroValueNotAllowed,

    /// Withdrawal exceeds the caller's recorded claim.
    #[error("insufficient balance: {depositor} has {available}, requested {requested}")]
    InsufficientBalance {
        depositor: Address,
        available: Amount,
        requested: Amount,
    },

    /// The external asset movement did not complete.
    #[error("transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    /// Accounting would exceed the representable range.
    #[error("overflow: {depositor} at {current}, amount {amount}")]
    Overflow {
        depositor: Address,
        current: Amount,
        amount: Amount,
    },

    /// A non-owner tried to use an owner-only operation.
    #[error("operation restricted to the owner ({caller})")]
    OwnerOnly { caller: Address },

    /// The adapter moves a different asset than the vault custodies.
    #[error("asset mismatch: vault holds {expected}, adapter moves {actual}")]
    AssetMismatch {
        expected: AssetKind,
        actual: AssetKind,
    },

    /// The calling thread is already inside an operation on this vault.
    #[error("re-entrant call from {caller}")]
    ReentrantCall { caller: Address },

    /// Persisting a committed operation failed.
    #[error("storage: {0}")]
    Storage(#[from] DbError),

    /// A reopened store belongs to a different vault.
    #[error("store mismatch: {0}")]
    StoreMismatch(String),

    /// The aggregate no longer equals the sum of claims.
    #[error("ledger inconsistent: {0}")]
    Inconsistent(String),
}

impl VaultError {
    /// Stable snake_case identifier for wire responses and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::NotPermittedForOwner { .. } => "not_permitted_for_owner",
            VaultError::NotPermittedForCustodian { .. } => "not_permitted_for_custodian",
            VaultError::ZeroValueNotAllowed => "zero_value_not_allowed",
            VaultError::InsufficientBalance { .. } => "insufficient_balance",
            VaultError::TransferFailed(_) => "transfer_failed",
            VaultError::Overflow { .. } => "overflow",
            VaultError::OwnerOnly { .. } => "owner_only",
            VaultError::AssetMismatch { .. } => "asset_mismatch",
            VaultError::ReentrantCall { .. } => "reentrant_call",
            VaultError::Storage(_) => "storage",
            VaultError::StoreMismatch(_) => "store_mismatch",
            VaultError::Inconsistent(_) => "inconsistent",
        }
    }
}

impl From<LedgerError> for VaultError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                depositor,
                available,
                requested,
            } => VaultError::InsufficientBalance {
                depositor,
                available,
                requested,
            },
            LedgerError::Overflow {
                depositor,
                current,
                amount,
            } => VaultError::Overflow {
                depositor,
                current,
                amount,
            },
            LedgerError::AggregateUnderflow { total, amount } => VaultError::Inconsistent(
                format!("aggregate {} smaller than debit {}", total, amount),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_to_top_level_variants() {
        let err: VaultError = LedgerError::InsufficientBalance {
            depositor: Address::new("alice"),
            available: 5,
            requested: 6,
        }
        .into();
        assert!(matches!(
            err,
            VaultError::InsufficientBalance {
                available: 5,
                requested: 6,
                ..
            }
        ));

        let err: VaultError = LedgerError::Overflow {
            depositor: Address::new("alice"),
            current: u128::MAX,
            amount: 1,
        }
        .into();
        assert_eq!(err.code(), "overflow");

        let err: VaultError = LedgerError::AggregateUnderflow { total: 1, amount: 2 }.into();
        assert_eq!(err.code(), "inconsistent");
    }

    #[test]
    fn transfer_errors_wrap_their_source() {
        let err: VaultError = TransferError::from(TokenError::InsufficientAllowance {
            holder: Address::new("alice"),
            spender: Address::new("vault"),
            allowance: 0,
            requested: 10,
        })
        .into();
        assert_eq!(err.code(), "transfer_failed");
        assert!(err.to_string().contains("allowance"));
    }
}
