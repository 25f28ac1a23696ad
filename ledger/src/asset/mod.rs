//! # Asset Movement
//!
//! The vault never moves assets itself. It borrows a [`TransferAdapter`]
//! for the duration of one call and asks it to pull value into custody or
//! push value back out. Both adapters in this module sit on top of an
//! external ledger the vault does not control:
//!
//! ```text
//! token.rs   — ERC-20 shaped token ledger + TokenCustody adapter
//! native.rs  — native value bank        + NativeCustody adapter
//! ```
//!
//! The external ledger is never trusted for claims. `custody_balance` is
//! there for reconciliation only.

pub mod native;
pub mod token;

use crate::error::TransferError;
use crate::types::{Address, Amount, AssetKind};

pub use native::{BankError, NativeBank, NativeCustody};
pub use token::{InMemoryToken, TokenCustody, TokenError, TokenLedger};

/// Pull/push capability over an external asset ledger.
///
/// Implementations must be all-or-nothing: a failed `pull` or `push` leaves
/// the external ledger unchanged.
pub trait TransferAdapter {
    /// The asset this adapter moves.
    fn asset(&self) -> AssetKind;

    /// The vault's own account on the external ledger.
    fn custodian(&self) -> &Address;

    /// Moves `amount` from `from` into the custodian account.
    fn pull(&mut self, from: &Address, amount: Amount) -> Result<(), TransferError>;

    /// Moves `amount` from the custodian account to `to`.
    fn push(&mut self, to: &Address, amount: Amount) -> Result<(), TransferError>;

    /// What the external ledger says the custodian holds.
    fn custody_balance(&self) -> Amount;
}
