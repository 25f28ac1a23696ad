//! # Token Ledger
//!
//! The ERC-20 shaped contract the token vault pulls from and pushes to.
//! [`TokenLedger`] is the seam; [`InMemoryToken`] is a faithful reference
//! implementation used by tests and the devnet node. Depositors must
//! `approve` the vault's custodian account before a deposit can pull.
//!
//! ## Semantics
//!
//! - Balances and supply are checked on every operation.
//! - `transfer_from` checks the allowance first, then the balance, and only
//!   consumes allowance once the transfer is certain to succeed.
//! - An allowance of `u128::MAX` is treated as unlimited and never consumed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::TransferAdapter;
use crate::error::TransferError;
use crate::types::{Address, Amount, AssetKind};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by a token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The sender does not hold enough tokens.
    #[error("insufficient balance: {holder} has {balance}, requested {requested}")]
    InsufficientBalance {
        holder: Address,
        balance: Amount,
        requested: Amount,
    },

    /// The spender has not been approved for enough tokens.
    #[error("insufficient allowance: {spender} may spend {allowance} of {holder}, requested {requested}")]
    InsufficientAllowance {
        holder: Address,
        spender: Address,
        allowance: Amount,
        requested: Amount,
    },

    /// Minting would overflow the total supply.
    #[error("supply overflow: minting {amount} would exceed u128::MAX")]
    SupplyOverflow { amount: Amount },

    /// Crediting the recipient would overflow its balance.
    #[error("balance overflow for {holder}")]
    BalanceOverflow { holder: Address },
}

// ---------------------------------------------------------------------------
// TokenLedger
// ---------------------------------------------------------------------------

/// The standard allowance/transfer contract of a fungible token.
pub trait TokenLedger {
    /// Address identifying this token.
    fn token_address(&self) -> &Address;

    fn balance_of(&self, holder: &Address) -> Amount;

    fn allowance(&self, holder: &Address, spender: &Address) -> Amount;

    /// Sets (not adds to) the amount `spender` may pull from `holder`.
    fn approve(&mut self, holder: &Address, spender: &Address, amount: Amount);

    /// Moves tokens from `from` to `to`, authorized by `from`.
    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount)
        -> Result<(), TokenError>;

    /// Moves tokens from `from` to `to`, authorized by `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError>;
}

impl<T: TokenLedger + ?Sized> TokenLedger for &mut T {
    fn token_address(&self) -> &Address {
        (**self).token_address()
    }

    fn balance_of(&self, holder: &Address) -> Amount {
        (**self).balance_of(holder)
    }

    fn allowance(&self, holder: &Address, spender: &Address) -> Amount {
        (**self).allowance(holder, spender)
    }

    fn approve(&mut self, holder: &Address, spender: &Address, amount: Amount) {
        (**self).approve(holder, spender, amount)
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        (**self).transfer(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        (**self).transfer_from(spender, from, to, amount)
    }
}

// ---------------------------------------------------------------------------
// InMemoryToken
// ---------------------------------------------------------------------------

/// Metadata and supply of a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    /// Human-readable name (e.g., "Custody Test Token").
    pub name: String,
    pub symbol: String,
    /// Display precision only.
    pub decimals: u8,
    pub total_supply: Amount,
    pub created_at: DateTime<Utc>,
}

/// Reference token ledger held entirely in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryToken {
    info: TokenInfo,
    balances: HashMap<Address, Amount>,
    /// `holder -> (spender -> allowance)`.
    allowances: HashMap<Address, HashMap<Address, Amount>>,
}

impl InMemoryToken {
    /// Registers a token with zero supply.
    pub fn new(address: Address, name: &str, symbol: &str, decimals: u8) -> Self {
        Self {
            info: TokenInfo {
                address,
                name: name.to_string(),
                symbol: symbol.to_uppercase(),
                decimals,
                total_supply: 0,
                created_at: Utc::now(),
            },
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    /// Registers a token and mints `supply` to `deployer`.
    pub fn deploy(
        address: Address,
        name: &str,
        symbol: &str,
        decimals: u8,
        deployer: &Address,
        supply: Amount,
    ) -> Result<Self, TokenError> {
        let mut token = Self::new(address, name, symbol, decimals);
        token.mint(deployer, supply)?;
        Ok(token)
    }

    /// Creates `amount` new tokens owned by `to`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::SupplyOverflow`] if supply would overflow.
    pub fn mint(&mut self, to: &Address, amount: Amount) -> Result<(), TokenError> {
        let new_supply = self
            .info
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow { amount })?;
        // Every balance is bounded by supply, so this cannot overflow once
        // the supply check passed.
        let balance = self.balances.entry(to.clone()).or_insert(0);
        *balance += amount;
        self.info.total_supply = new_supply;
        Ok(())
    }

    pub fn info(&self) -> &TokenInfo {
        &self.info
    }

    pub fn total_supply(&self) -> Amount {
        self.info.total_supply
    }

    /// Number of addresses with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|b| **b > 0).count()
    }
}

impl TokenLedger for InMemoryToken {
    fn token_address(&self) -> &Address {
        &self.info.address
    }

    fn balance_of(&self, holder: &Address) -> Amount {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    fn allowance(&self, holder: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(holder)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, holder: &Address, spender: &Address, amount: Amount) {
        self.allowances
            .entry(holder.clone())
            .or_default()
            .insert(spender.clone(), amount);
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                holder: from.clone(),
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
            .ok_or_else(|| TokenError::BalanceOverflow { holder: to.clone() })?;

        self.balances.insert(from.clone(), from_balance - amount);
        self.balances.insert(to.clone(), to_balance);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let allowance = self.allowance(from, spender);
        if allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                holder: from.clone(),
                spender: spender.clone(),
                allowance,
                requested: amount,
            });
        }

        self.transfer(from, to, amount)?;

        if allowance != Amount::MAX {
            self.approve(from, spender, allowance - amount);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TokenCustody
// ---------------------------------------------------------------------------

/// [`TransferAdapter`] over a token ledger. Pulls consume the depositor's
/// allowance to `custodian`; pushes are plain transfers from `custodian`.
#[derive(Debug)]
pub struct TokenCustody<T> {
    token: T,
    custodian: Address,
}

impl<T: TokenLedger> TokenCustody<T> {
    pub fn new(token: T, custodian: Address) -> Self {
        Self { token, custodian }
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    pub fn into_inner(self) -> T {
        self.token
    }
}

impl<T: TokenLedger> TransferAdapter for TokenCustody<T> {
    fn asset(&self) -> AssetKind {
        AssetKind::Token(self.token.token_address().clone())
    }

    fn custodian(&self) -> &Address {
        &self.custodian
    }

    fn pull(&mut self, from: &Address, amount: Amount) -> Result<(), TransferError> {
        let custodian = self.custodian.clone();
        self.token
            .transfer_from(&custodian, from, &custodian, amount)
            .map_err(TransferError::from)
    }

    fn push(&mut self, to: &Address, amount: Amount) -> Result<(), TransferError> {
        let custodian = self.custodian.clone();
        self.token
            .transfer(&custodian, to, amount)
            .map_err(TransferError::from)
    }

    fn custody_balance(&self) -> Amount {
        self.token.balance_of(&self.custodian)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    fn token_with_supply() -> InMemoryToken {
        InMemoryToken::deploy(
            addr("token:ctt"),
            "Custody Test Token",
            "ctt",
            18,
            &addr("deployer"),
            1_000,
        )
        .unwrap()
    }

    #[test]
    fn deploy_mints_to_deployer() {
        let token = token_with_supply();
        assert_eq!(token.total_supply(), 1_000);
        assert_eq!(token.balance_of(&addr("deployer")), 1_000);
        assert_eq!(token.info().symbol, "CTT");
        assert_eq!(token.holder_count(), 1);
    }

    #[test]
    fn mint_overflow_rejected() {
        let mut token = token_with_supply();
        let err = token.mint(&addr("x"), u128::MAX).unwrap_err();
        assert!(matches!(err, TokenError::SupplyOverflow { .. }));
        assert_eq!(token.total_supply(), 1_000);
    }

    #[test]
    fn transfer_moves_balance() {
        let mut token = token_with_supply();
        token.transfer(&addr("deployer"), &addr("alice"), 100).unwrap();
        assert_eq!(token.balance_of(&addr("deployer")), 900);
        assert_eq!(token.balance_of(&addr("alice")), 100);
    }

    #[test]
    fn transfer_insufficient_balance_rejected() {
        let mut token = token_with_supply();
        let err = token.transfer(&addr("alice"), &addr("bob"), 1).unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { balance: 0, .. }));
    }

    #[test]
    fn self_transfer_is_a_noop() {
        let mut token = token_with_supply();
        token.transfer(&addr("deployer"), &addr("deployer"), 500).unwrap();
        assert_eq!(token.balance_of(&addr("deployer")), 1_000);
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let mut token = token_with_supply();
        token.approve(&addr("deployer"), &addr("vault"), 300);
        token
            .transfer_from(&addr("vault"), &addr("deployer"), &addr("vault"), 200)
            .unwrap();
        assert_eq!(token.allowance(&addr("deployer"), &addr("vault")), 100);
        assert_eq!(token.balance_of(&addr("vault")), 200);
    }

    #[test]
    fn transfer_from_without_allowance_rejected() {
        let mut token = token_with_supply();
        let err = token
            .transfer_from(&addr("vault"), &addr("deployer"), &addr("vault"), 1)
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientAllowance { allowance: 0, .. }));
        assert_eq!(token.balance_of(&addr("deployer")), 1_000);
    }

    #[test]
    fn failed_transfer_from_keeps_allowance() {
        let mut token = token_with_supply();
        token.approve(&addr("alice"), &addr("vault"), 50);
        let err = token
            .transfer_from(&addr("vault"), &addr("alice"), &addr("vault"), 50)
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { .. }));
        assert_eq!(token.allowance(&addr("alice"), &addr("vault")), 50);
    }

    #[test]
    fn unlimited_allowance_is_not_consumed() {
        let mut token = token_with_supply();
        token.approve(&addr("deployer"), &addr("vault"), u128::MAX);
        token
            .transfer_from(&addr("vault"), &addr("deployer"), &addr("vault"), 10)
            .unwrap();
        assert_eq!(token.allowance(&addr("deployer"), &addr("vault")), u128::MAX);
    }

    #[test]
    fn custody_adapter_pulls_and_pushes() {
        let mut token = token_with_supply();
        token.approve(&addr("deployer"), &addr("vault"), 40);

        let mut custody = TokenCustody::new(&mut token, addr("vault"));
        assert_eq!(custody.asset(), AssetKind::Token(addr("token:ctt")));
        custody.pull(&addr("deployer"), 40).unwrap();
        assert_eq!(custody.custody_balance(), 40);
        custody.push(&addr("deployer"), 15).unwrap();
        assert_eq!(custody.custody_balance(), 25);

        let err = custody.pull(&addr("deployer"), 1).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Token(TokenError::InsufficientAllowance { .. })
        ));
        drop(custody);

        assert_eq!(token.balance_of(&addr("deployer")), 975);
    }
}
