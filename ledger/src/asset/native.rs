//! # Native Value Platform
//!
//! Native currency has no allowance step: value arrives with the call. The
//! [`NativeBank`] models the platform's account balances, and
//! [`NativeCustody`] adapts it to the vault's transfer seam. Accounts can
//! be flagged as rejecting incoming value, which is how a recipient that
//! "cannot accept the asset" shows up during a withdrawal.

use std::borrow::{Borrow, BorrowMut};
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::TransferAdapter;
use crate::error::TransferError;
use crate::types::{Address, Amount, AssetKind};

/// Errors returned by the native value platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("insufficient funds: {account} has {balance}, requested {requested}")]
    InsufficientFunds {
        account: Address,
        balance: Amount,
        requested: Amount,
    },

    /// The recipient refuses incoming value.
    #[error("recipient {0} rejected the transfer")]
    RecipientRejected(Address),

    #[error("balance overflow for {0}")]
    Overflow(Address),
}

/// Account balances of the native currency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativeBank {
    balances: HashMap<Address, Amount>,
    rejecting: HashSet<Address>,
    issued: Amount,
}

impl NativeBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues fresh value to `account` (genesis allocations, faucets).
    pub fn fund(&mut self, account: &Address, amount: Amount) -> Result<(), BankError> {
        let issued = self
            .issued
            .checked_add(amount)
            .ok_or_else(|| BankError::Overflow(account.clone()))?;
        let balance = self.balance_of(account);
        let new_balance = balance
            .checked_add(amount)
            .ok_or_else(|| BankError::Overflow(account.clone()))?;
        self.balances.insert(account.clone(), new_balance);
        self.issued = issued;
        Ok(())
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Total value ever issued through [`fund`](Self::fund).
    pub fn issued(&self) -> Amount {
        self.issued
    }

    /// Marks `account` as refusing (or accepting again) incoming value.
    pub fn set_rejects_value(&mut self, account: &Address, rejects: bool) {
        if rejects {
            self.rejecting.insert(account.clone());
        } else {
            self.rejecting.remove(account);
        }
    }

    /// Moves `amount` from `from` to `to`. All-or-nothing.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), BankError> {
        if self.rejecting.contains(to) {
            return Err(BankError::RecipientRejected(to.clone()));
        }
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(BankError::InsufficientFunds {
                account: from.clone(),
                balance: from_balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| BankError::Overflow(to.clone()))?;

        self.balances.insert(from.clone(), from_balance - amount);
        self.balances.insert(to.clone(), to_balance);
        Ok(())
    }
}

/// [`TransferAdapter`] over a [`NativeBank`], either owned or borrowed.
#[derive(Debug)]
pub struct NativeCustody<B> {
    bank: B,
    custodian: Address,
}

impl<B: BorrowMut<NativeBank>> NativeCustody<B> {
    pub fn new(bank: B, custodian: Address) -> Self {
        Self { bank, custodian }
    }

    pub fn bank(&self) -> &NativeBank {
        self.bank.borrow()
    }

    pub fn bank_mut(&mut self) -> &mut NativeBank {
        self.bank.borrow_mut()
    }

    pub fn into_inner(self) -> B {
        self.bank
    }
}

impl<B: BorrowMut<NativeBank>> TransferAdapter for NativeCustody<B> {
    fn asset(&self) -> AssetKind {
        AssetKind::Native
    }

    fn custodian(&self) -> &Address {
        &self.custodian
    }

    fn pull(&mut self, from: &Address, amount: Amount) -> Result<(), TransferError> {
        let custodian = self.custodian.clone();
        self.bank
            .borrow_mut()
            .transfer(from, &custodian, amount)
            .map_err(TransferError::from)
    }

    fn push(&mut self, to: &Address, amount: Amount) -> Result<(), TransferError> {
        let custodian = self.custodian.clone();
        self.bank
            .borrow_mut()
            .transfer(&custodian, to, amount)
            .map_err(TransferError::from)
    }

    fn custody_balance(&self) -> Amount {
        self.bank.borrow().balance_of(&self.custodian)
    }
}
