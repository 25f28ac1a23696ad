//! # Balance Ledger
//!
//! Per-depositor claims plus the custodied aggregate. The one invariant that
//! matters: the aggregate always equals the sum of every claim. Each
//! mutation updates both sides together, and each mutation is checked up
//! front so a failure leaves both sides exactly as they were.
//!
//! Lookups for unknown depositors read as zero, and entries that fall back
//! to zero are pruned, so "withdrew everything" and "never deposited" read
//! the same. There is no existence flag.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, Amount};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Attempted to debit more than the depositor's claim.
    #[error("insufficient balance: {depositor} has {available}, requested {requested}")]
    InsufficientBalance {
        depositor: Address,
        available: Amount,
        requested: Amount,
    },

    /// A credit would push the claim or the aggregate past `u128::MAX`.
    #[error("balance overflow: {depositor} at {current}, credit {amount}")]
    Overflow {
        depositor: Address,
        current: Amount,
        amount: Amount,
    },

    /// The aggregate is smaller than a claim being debited. Only reachable
    /// if the ledger was restored from corrupt data.
    #[error("aggregate underflow: total {total}, debit {amount}")]
    AggregateUnderflow { total: Amount, amount: Amount },
}

// ---------------------------------------------------------------------------
// BalanceLedger
// ---------------------------------------------------------------------------

/// Depositor claims and the total custodied on their behalf.
///
/// Not `Sync` by itself. The vault that owns it serializes access.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceLedger {
    entries: HashMap<Address, Amount>,
    total: Amount,
}

impl BalanceLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from persisted `(depositor, claim)` pairs.
    ///
    /// Zero claims are dropped and repeated depositors are summed. The
    /// aggregate is recomputed, never trusted from the caller.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the claims cannot be summed.
    pub fn from_entries<I>(entries: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = (Address, Amount)>,
    {
        let mut ledger = Self::new();
        for (depositor, amount) in entries {
            if amount == 0 {
                continue;
            }
            ledger.credit(&depositor, amount)?;
        }
        Ok(ledger)
    }

    /// Computes the claim and aggregate a credit would produce, without
    /// touching the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if either side would overflow.
    pub fn preview_credit(
        &self,
        depositor: &Address,
        amount: Amount,
    ) -> Result<(Amount, Amount), LedgerError> {
        let current = self.balance_of(depositor);
        let overflow = || LedgerError::Overflow {
            depositor: depositor.clone(),
            current,
            amount,
        };
        let new_balance = current.checked_add(amount).ok_or_else(overflow)?;
        let new_total = self.total.checked_add(amount).ok_or_else(overflow)?;
        Ok((new_balance, new_total))
    }

    /// Adds `amount` to the depositor's claim and to the aggregate.
    ///
    /// Returns the depositor's new claim.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if either side would exceed
    /// `u128::MAX`. The ledger is unchanged on error.
    pub fn credit(&mut self, depositor: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        let (new_balance, new_total) = self.preview_credit(depositor, amount)?;
        if new_balance > 0 {
            self.entries.insert(depositor.clone(), new_balance);
        }
        self.total = new_total;
        Ok(new_balance)
    }

    /// Subtracts `amount` from the depositor's claim and from the aggregate.
    ///
    /// Returns the depositor's remaining claim. A claim that reaches zero
    /// is removed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if `amount` exceeds the
    /// claim. The ledger is unchanged on error.
    pub fn debit(&mut self, depositor: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        let available = self.balance_of(depositor);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                depositor: depositor.clone(),
                available,
                requested: amount,
            });
        }

        let new_total = self
            .total
            .checked_sub(amount)
            .ok_or(LedgerError::AggregateUnderflow {
                total: self.total,
                amount,
            })?;

        let remaining = available - amount;
        if remaining == 0 {
            self.entries.remove(depositor);
        } else {
            self.entries.insert(depositor.clone(), remaining);
        }
        self.total = new_total;
        Ok(remaining)
    }

    /// The depositor's claim, or 0 if it has none.
    pub fn balance_of(&self, depositor: &Address) -> Amount {
        self.entries.get(depositor).copied().unwrap_or(0)
    }

    /// The aggregate custodied on behalf of all depositors.
    pub fn total_custodied(&self) -> Amount {
        self.total
    }

    /// Sum of every individual claim, or `None` on overflow.
    pub fn sum_of_claims(&self) -> Option<Amount> {
        self.entries
            .values()
            .try_fold(0u128, |acc, v| acc.checked_add(*v))
    }

    /// `true` if the aggregate equals the sum of claims.
    pub fn is_consistent(&self) -> bool {
        self.sum_of_claims() == Some(self.total)
    }

    /// Depositors with a non-zero claim, sorted by address.
    pub fn depositors(&self) -> Vec<Address> {
        let mut out: Vec<Address> = self.entries.keys().cloned().collect();
        out.sort();
        out
    }

    /// Number of depositors with a non-zero claim.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(depositor, claim)` in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, Amount)> {
        self.entries.iter().map(|(a, v)| (a, *v))
    }

    /// Takes an ordered, digest-stamped copy of the ledger for auditing.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut entries: Vec<(Address, Amount)> =
            self.entries.iter().map(|(a, v)| (a.clone(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let digest = LedgerSnapshot::compute_digest(&entries, self.total);
        LedgerSnapshot {
            entries,
            total: self.total,
            digest,
            taken_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerSnapshot
// ---------------------------------------------------------------------------

/// A point-in-time copy of every claim, sorted by depositor, with a BLAKE3
/// digest over the canonical encoding. Two snapshots of equal ledgers have
/// equal digests regardless of when they were taken.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub entries: Vec<(Address, Amount)>,
    pub total: Amount,
    /// Hex-encoded BLAKE3 digest.
    pub digest: String,
    pub taken_at: DateTime<Utc>,
}

impl LedgerSnapshot {
    /// Canonical encoding: for each entry, `len(addr) u32 LE || addr ||
    /// amount u128 BE`, then `total u128 BE`.
    fn compute_digest(entries: &[(Address, Amount)], total: Amount) -> String {
        let mut hasher = blake3::Hasher::new();
        for (addr, amount) in entries {
            let bytes = addr.as_bytes();
            hasher.update(&(bytes.len() as u32).to_le_bytes());
            hasher.update(bytes);
            hasher.update(&amount.to_be_bytes());
        }
        hasher.update(&total.to_be_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }

    /// Recomputes the digest and compares it with the stored one.
    pub fn verify(&self) -> bool {
        Self::compute_digest(&self.entries, self.total) == self.digest
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::new("alice")
    }

    fn bob() -> Address {
        Address::new("bob")
    }

    #[test]
    fn unseen_depositor_reads_zero() {
        let ledger = BalanceLedger::new();
        assert_eq!(ledger.balance_of(&alice()), 0);
        assert_eq!(ledger.total_custodied(), 0);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn credit_updates_claim_and_aggregate() {
        let mut ledger = BalanceLedger::new();
        assert_eq!(ledger.credit(&alice(), 10).unwrap(), 10);
        assert_eq!(ledger.credit(&alice(), 5).unwrap(), 15);
        assert_eq!(ledger.credit(&bob(), 20).unwrap(), 20);

        assert_eq!(ledger.balance_of(&alice()), 15);
        assert_eq!(ledger.total_custodied(), 35);
        assert_eq!(ledger.sum_of_claims(), Some(ledger.total_custodied()));
    }

    #[test]
    fn credit_overflow_leaves_ledger_untouched() {
        let mut ledger = BalanceLedger::new();
        ledger.credit(&alice(), u128::MAX).unwrap();
        let before = ledger.clone();

        let err = ledger.credit(&bob(), 1).unwrap_err();
        assert!(matches!(err, LedgerError::Overflow { current: 0, amount: 1, .. }));
        assert_eq!(ledger, before);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn preview_does_not_mutate() {
        let mut ledger = BalanceLedger::new();
        ledger.credit(&alice(), 7).unwrap();
        let (balance, total) = ledger.preview_credit(&alice(), 3).unwrap();
        assert_eq!((balance, total), (10, 10));
        assert_eq!(ledger.balance_of(&alice()), 7);
    }

    #[test]
    fn debit_reduces_both_sides() {
        let mut ledger = BalanceLedger::new();
        ledger.credit(&alice(), 10).unwrap();
        assert_eq!(ledger.debit(&alice(), 4).unwrap(), 6);
        assert_eq!(ledger.total_custodied(), 6);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn debit_to_zero_prunes_entry() {
        let mut ledger = BalanceLedger::new();
        ledger.credit(&alice(), 10).unwrap();
        ledger.debit(&alice(), 10).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.balance_of(&alice()), 0);
        assert_eq!(ledger.total_custodied(), 0);
    }

    #[test]
    fn debit_over_claim_rejected_without_change() {
        let mut ledger = BalanceLedger::new();
        ledger.credit(&alice(), 5).unwrap();
        ledger.credit(&bob(), 50).unwrap();
        let before = ledger.clone();

        let err = ledger.debit(&alice(), 6).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                depositor: alice(),
                available: 5,
                requested: 6,
            }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn debit_unknown_depositor_is_insufficient() {
        let mut ledger = BalanceLedger::new();
        let err = ledger.debit(&alice(), 1).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { available: 0, .. }));
    }

    #[test]
    fn from_entries_recomputes_total() {
        let ledger = BalanceLedger::from_entries(vec![
            (alice(), 10),
            (bob(), 0),
            (bob(), 20),
            (alice(), 5),
        ])
        .unwrap();
        assert_eq!(ledger.balance_of(&alice()), 15);
        assert_eq!(ledger.balance_of(&bob()), 20);
        assert_eq!(ledger.total_custodied(), 35);
        assert_eq!(ledger.depositors(), vec![alice(), bob()]);
    }

    #[test]
    fn from_entries_rejects_overflowing_data() {
        let result = BalanceLedger::from_entries(vec![(alice(), u128::MAX), (bob(), 1)]);
        assert!(matches!(result, Err(LedgerError::Overflow { .. })));
    }

    #[test]
    fn snapshot_digest_is_order_independent() {
        let mut a = BalanceLedger::new();
        a.credit(&alice(), 1).unwrap();
        a.credit(&bob(), 2).unwrap();

        let mut b = BalanceLedger::new();
        b.credit(&bob(), 2).unwrap();
        b.credit(&alice(), 1).unwrap();

        let sa = a.snapshot();
        let sb = b.snapshot();
        assert_eq!(sa.digest, sb.digest);
        assert_eq!(sa.entries, vec![(alice(), 1), (bob(), 2)]);
        assert!(sa.verify());
    }

    #[test]
    fn tampered_snapshot_fails_verification() {
        let mut ledger = BalanceLedger::new();
        ledger.credit(&alice(), 100).unwrap();
        let mut snap = ledger.snapshot();
        snap.entries[0].1 = 1_000;
        assert!(!snap.verify());
    }
}
