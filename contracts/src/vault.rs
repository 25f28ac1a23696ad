//! # Vault Service
//!
//! A custodial balance vault. Depositors place an asset in custody and may
//! take back up to their own claim; the owner watches the aggregate but can
//! never deposit or withdraw.
//!
//! ## Operation Lifecycle
//!
//! ```text
//! deposit:  owner? → custodian? → zero? → asset? → overflow? → pull → credit → persist → event
//! withdraw: owner? → custodian? → zero? → asset? → claim?    → debit → push → persist → event
//! ```
//!
//! Every arrow is a point where the operation can stop. Everything before
//! the external transfer is a pure check. Everything after it is undone if a
//! later step fails: a failed push re-credits the depositor, and a failed
//! persist reverses both the ledger change and the asset movement.
//!
//! ## Reentrancy
//!
//! Each operation borrows the vault mutably for its whole duration, so an
//! adapter cannot reach back into the same vault. When the vault is shared
//! across threads, [`SharedVault`](crate::SharedVault) serializes calls and
//! refuses re-entry from a thread already inside an operation.

use serde::Serialize;
use tracing::{error, info, warn};

use custody_ledger::asset::TransferAdapter;
use custody_ledger::storage::{CommitLog, LedgerCommit, LedgerDb};
use custody_ledger::{
    AccessControl, Address, Amount, AssetKind, BalanceLedger, EventRecord, LedgerSnapshot,
    VaultError, VaultEvent,
};

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Result of a committed deposit or withdrawal.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReceipt {
    /// The event emitted for this operation.
    pub record: EventRecord,
    /// The caller's claim after the operation.
    pub balance: Amount,
    /// The vault's aggregate after the operation.
    pub total_custodied: Amount,
}

/// Recorded aggregate versus what the asset ledger says the vault holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// What the ledger says is owed to depositors.
    pub recorded: Amount,
    /// What the custodian account actually holds.
    pub held: Amount,
    /// Held beyond what is owed (assets sent outside `deposit`).
    pub surplus: Amount,
    /// Owed beyond what is held. Non-zero means something is badly wrong.
    pub shortfall: Amount,
}

impl Reconciliation {
    fn new(recorded: Amount, held: Amount) -> Self {
        Self {
            recorded,
            held,
            surplus: held.saturating_sub(recorded),
            shortfall: recorded.saturating_sub(held),
        }
    }

    /// `true` when every claim is backed.
    pub fn is_solvent(&self) -> bool {
        self.shortfall == 0
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// A single-asset custodial vault.
#[derive(Debug)]
pub struct Vault {
    access: AccessControl,
    asset: AssetKind,
    ledger: BalanceLedger,
    events: Vec<EventRecord>,
    next_seq: u64,
    store: Option<Box<dyn CommitLog>>,
}

impl Vault {
    /// Creates an in-memory vault for `asset` owned by `owner`.
    pub fn new(owner: Address, asset: AssetKind) -> Self {
        Self {
            access: AccessControl::new(owner),
            asset,
            ledger: BalanceLedger::new(),
            events: Vec::new(),
            next_seq: 1,
            store: None,
        }
    }

    /// A vault for native currency, owned by `owner`.
    pub fn native(owner: Address) -> Self {
        Self::new(owner, AssetKind::Native)
    }

    /// A vault for the token at `token_address`, owned by its deployer.
    pub fn token(owner: Address, token_address: Address) -> Self {
        Self::new(owner, AssetKind::Token(token_address))
    }

    /// Opens a vault backed by `store`.
    ///
    /// A fresh store is stamped with `owner` and `asset`. An existing store
    /// has its claims, aggregate and event log restored.
    ///
    /// # Errors
    ///
    /// - [`VaultError::StoreMismatch`] if the store belongs to another
    ///   owner or asset.
    /// - [`VaultError::Inconsistent`] if the persisted aggregate does not
    ///   equal the sum of persisted claims.
    /// - [`VaultError::Storage`] on any database failure.
    pub fn open(store: LedgerDb, owner: Address, asset: AssetKind) -> Result<Self, VaultError> {
        match store.get_metadata()? {
            None => {
                store.put_metadata(&owner, &asset)?;
                info!(owner = %owner, asset = %asset, "initialized new vault store");
                return Ok(Self::new(owner, asset).with_commit_log(store));
            }
            Some((stored_owner, stored_asset)) => {
                if stored_owner != owner {
                    return Err(VaultError::StoreMismatch(format!(
                        "store owned by {}, not {}",
                        stored_owner, owner
                    )));
                }
                if stored_asset != asset {
                    return Err(VaultError::StoreMismatch(format!(
                        "store holds {}, not {}",
                        stored_asset, asset
                    )));
                }
            }
        }

        let ledger = BalanceLedger::from_entries(store.load_entries()?)?;
        let recorded = store.load_total()?.unwrap_or(0);
        if recorded != ledger.total_custodied() {
            return Err(VaultError::Inconsistent(format!(
                "stored aggregate {} but claims sum to {}",
                recorded,
                ledger.total_custodied()
            )));
        }

        let events = store.load_events()?;
        let next_seq = events.last().map(|r| r.seq + 1).unwrap_or(1);

        info!(
            owner = %owner,
            asset = %asset,
            depositors = ledger.len(),
            total = %ledger.total_custodied(),
            events = events.len(),
            "restored vault from store"
        );

        Ok(Self {
            access: AccessControl::new(owner),
            asset,
            ledger,
            events,
            next_seq,
            store: Some(Box::new(store)),
        })
    }

    /// Mirrors every later commit to `log`. A commit that fails rolls the
    /// operation back. [`open`](Self::open) attaches the store it restored
    /// from.
    pub fn with_commit_log<L: CommitLog + 'static>(mut self, log: L) -> Self {
        self.store = Some(Box::new(log));
        self
    }

    // -----------------------------------------------------------------------
    // Depositor Operations
    // -----------------------------------------------------------------------

    /// Moves `amount` from `caller` into custody and credits their claim.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotPermittedForOwner`] if `caller` is the owner.
    /// - [`VaultError::NotPermittedForCustodian`] if `caller` is the
    ///   adapter's custodian account.
    /// - [`VaultError::ZeroValueNotAllowed`] if `amount` is 0.
    /// - [`VaultError::AssetMismatch`] if `adapter` moves another asset.
    /// - [`VaultError::Overflow`] if the claim or aggregate would overflow.
    ///   Checked before any asset moves.
    /// - [`VaultError::TransferFailed`] if the pull fails (missing
    ///   allowance, insufficient funds).
    /// - [`VaultError::Storage`] if persisting fails. The credit is rolled
    ///   back and the pull refunded.
    pub fn deposit<A>(
        &mut self,
        adapter: &mut A,
        caller: &Address,
        amount: Amount,
    ) -> Result<OperationReceipt, VaultError>
    where
        A: TransferAdapter + ?Sized,
    {
        let result = self.try_deposit(adapter, caller, amount);
        if let Err(e) = &result {
            warn!(caller = %caller, amount = %amount, code = e.code(), "deposit rejected: {}", e);
        }
        result
    }

    fn try_deposit<A>(
        &mut self,
        adapter: &mut A,
        caller: &Address,
        amount: Amount,
    ) -> Result<OperationReceipt, VaultError>
    where
        A: TransferAdapter + ?Sized,
    {
        self.access.ensure_not_owner(caller)?;
        Self::ensure_not_custodian(adapter.custodian(), caller)?;
        if amount == 0 {
            return Err(VaultError::ZeroValueNotAllowed);
        }
        self.ensure_asset(adapter.asset())?;
        self.ledger.preview_credit(caller, amount)?;

        adapter.pull(caller, amount)?;

        let balance = match self.ledger.credit(caller, amount) {
            Ok(balance) => balance,
            Err(e) => {
                Self::refund(adapter, caller, amount);
                return Err(e.into());
            }
        };

        let record = EventRecord::new(
            self.next_seq,
            VaultEvent::DepositSuccessful {
                depositor: caller.clone(),
                amount,
            },
        );
        if let Err(e) = self.persist(caller, balance, &record) {
            self.undo_credit(caller, amount);
            Self::refund(adapter, caller, amount);
            return Err(e);
        }

        Ok(self.emit(record, balance))
    }

    /// Debits `caller`'s claim by `amount` and pays it out to them.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotPermittedForOwner`] if `caller` is the owner.
    /// - [`VaultError::NotPermittedForCustodian`] if `caller` is the
    ///   adapter's custodian account.
    /// - [`VaultError::ZeroValueNotAllowed`] if `amount` is 0.
    /// - [`VaultError::AssetMismatch`] if `adapter` moves another asset.
    /// - [`VaultError::InsufficientBalance`] if `amount` exceeds the claim.
    ///   Checked before any asset moves.
    /// - [`VaultError::TransferFailed`] if the push fails. The debit is
    ///   rolled back.
    /// - [`VaultError::Storage`] if persisting fails. The debit is rolled
    ///   back and the payout clawed back.
    pub fn withdraw<A>(
        &mut self,
        adapter: &mut A,
        caller: &Address,
        amount: Amount,
    ) -> Result<OperationReceipt, VaultError>
    where
        A: TransferAdapter + ?Sized,
    {
        let result = self.try_withdraw(adapter, caller, amount);
        if let Err(e) = &result {
            warn!(caller = %caller, amount = %amount, code = e.code(), "withdraw rejected: {}", e);
        }
        result
    }

    fn try_withdraw<A>(
        &mut self,
        adapter: &mut A,
        caller: &Address,
        amount: Amount,
    ) -> Result<OperationReceipt, VaultError>
    where
        A: TransferAdapter + ?Sized,
    {
        self.access.ensure_not_owner(caller)?;
        Self::ensure_not_custodian(adapter.custodian(), caller)?;
        if amount == 0 {
            return Err(VaultError::ZeroValueNotAllowed);
        }
        self.ensure_asset(adapter.asset())?;

        let available = self.ledger.balance_of(caller);
        if amount > available {
            return Err(VaultError::InsufficientBalance {
                depositor: caller.clone(),
                available,
                requested: amount,
            });
        }

        let balance = self.ledger.debit(caller, amount)?;

        if let Err(e) = adapter.push(caller, amount) {
            self.undo_debit(caller, amount);
            return Err(e.into());
        }

        let record = EventRecord::new(
            self.next_seq,
            VaultEvent::WithdrawSuccessful {
                depositor: caller.clone(),
                amount,
            },
        );
        if let Err(e) = self.persist(caller, balance, &record) {
            self.undo_debit(caller, amount);
            if let Err(clawback) = adapter.pull(caller, amount) {
                error!(
                    caller = %caller,
                    amount = %amount,
                    "payout clawback failed after storage error: {}",
                    clawback
                );
            }
            return Err(e);
        }

        Ok(self.emit(record, balance))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn owner(&self) -> &Address {
        self.access.owner()
    }

    pub fn is_owner(&self, caller: &Address) -> bool {
        self.access.is_owner(caller)
    }

    /// The custodied token's address. `None` for a native vault.
    pub fn token_address(&self) -> Option<&Address> {
        self.asset.token_address()
    }

    pub fn asset(&self) -> &AssetKind {
        &self.asset
    }

    /// Total custodied on behalf of all depositors. Open to anyone.
    pub fn get_contract_balance(&self) -> Amount {
        self.ledger.total_custodied()
    }

    /// The caller's own claim. Open to anyone, including the owner.
    pub fn my_balance(&self, caller: &Address) -> Amount {
        self.ledger.balance_of(caller)
    }

    /// Any depositor's claim.
    pub fn balance_of(&self, depositor: &Address) -> Amount {
        self.ledger.balance_of(depositor)
    }

    /// Read-only view of the ledger.
    pub fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    pub fn depositor_count(&self) -> usize {
        self.ledger.len()
    }

    /// `true` if the aggregate equals the sum of claims.
    pub fn is_consistent(&self) -> bool {
        self.ledger.is_consistent()
    }

    /// The full event log, oldest first.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Events with a sequence number greater than `seq`.
    pub fn events_since(&self, seq: u64) -> &[EventRecord] {
        let start = self.events.partition_point(|r| r.seq <= seq);
        &self.events[start..]
    }

    /// `true` if the vault mirrors its state to a [`CommitLog`].
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Compares the recorded aggregate with the adapter's custody balance.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::AssetMismatch`] if `adapter` moves another asset.
    pub fn reconcile<A>(&self, adapter: &A) -> Result<Reconciliation, VaultError>
    where
        A: TransferAdapter + ?Sized,
    {
        self.ensure_asset(adapter.asset())?;
        let reconciliation =
            Reconciliation::new(self.ledger.total_custodied(), adapter.custody_balance());
        if !reconciliation.is_solvent() {
            error!(
                recorded = %reconciliation.recorded,
                held = %reconciliation.held,
                "custody shortfall detected"
            );
        }
        Ok(reconciliation)
    }

    /// Ordered, digest-stamped snapshot of every claim.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::OwnerOnly`] unless `caller` is the owner.
    pub fn audit(&self, caller: &Address) -> Result<LedgerSnapshot, VaultError> {
        self.access.ensure_owner(caller)?;
        Ok(self.ledger.snapshot())
    }

    // -----------------------------------------------------------------------
    // Internal Helpers
    // -----------------------------------------------------------------------

    fn ensure_not_custodian(custodian: &Address, caller: &Address) -> Result<(), VaultError> {
        if caller == custodian {
            return Err(VaultError::NotPermittedForCustodian {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    fn ensure_asset(&self, actual: AssetKind) -> Result<(), VaultError> {
        if actual != self.asset {
            return Err(VaultError::AssetMismatch {
                expected: self.asset.clone(),
                actual,
            });
        }
        Ok(())
    }

    fn persist(
        &self,
        depositor: &Address,
        balance: Amount,
        record: &EventRecord,
    ) -> Result<(), VaultError> {
        if let Some(store) = &self.store {
            store.commit(LedgerCommit {
                depositor,
                balance,
                total: self.ledger.total_custodied(),
                record,
            })?;
        }
        Ok(())
    }

    /// Appends a committed event and builds the receipt.
    fn emit(&mut self, record: EventRecord, balance: Amount) -> OperationReceipt {
        self.next_seq += 1;
        let total_custodied = self.ledger.total_custodied();
        info!(
            event = record.event.name(),
            seq = record.seq,
            depositor = %record.event.depositor(),
            amount = %record.event.amount(),
            balance = %balance,
            total = %total_custodied,
            "vault operation committed"
        );
        self.events.push(record.clone());
        OperationReceipt {
            record,
            balance,
            total_custodied,
        }
    }

    fn undo_credit(&mut self, depositor: &Address, amount: Amount) {
        if let Err(e) = self.ledger.debit(depositor, amount) {
            error!(depositor = %depositor, amount = %amount, "credit rollback failed: {}", e);
        }
    }

    fn undo_debit(&mut self, depositor: &Address, amount: Amount) {
        if let Err(e) = self.ledger.credit(depositor, amount) {
            error!(depositor = %depositor, amount = %amount, "debit rollback failed: {}", e);
        } else {
            warn!(depositor = %depositor, amount = %amount, "withdrawal rolled back");
        }
    }

    fn refund<A>(adapter: &mut A, depositor: &Address, amount: Amount)
    where
        A: TransferAdapter + ?Sized,
    {
        if let Err(e) = adapter.push(depositor, amount) {
            error!(depositor = %depositor, amount = %amount, "deposit refund failed: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use custody_ledger::asset::{NativeBank, NativeCustody};

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    fn funded_bank() -> NativeBank {
        let mut bank = NativeBank::new();
        bank.fund(&addr("alice"), 1_000).unwrap();
        bank.fund(&addr("owner"), 1_000).unwrap();
        bank
    }

    #[test]
    fn new_vault_is_empty() {
        let vault = Vault::native(addr("owner"));
        assert_eq!(vault.owner(), &addr("owner"));
        assert_eq!(vault.token_address(), None);
        assert_eq!(vault.get_contract_balance(), 0);
        assert!(vault.events().is_empty());
        assert!(vault.is_consistent());
        assert!(!vault.is_persistent());
    }

    #[test]
    fn deposit_assigns_sequential_event_numbers() {
        let mut bank = funded_bank();
        let mut custody = NativeCustody::new(&mut bank, addr("vault"));
        let mut vault = Vault::native(addr("owner"));

        let first = vault.deposit(&mut custody, &addr("alice"), 10).unwrap();
        let second = vault.deposit(&mut custody, &addr("alice"), 5).unwrap();

        assert_eq!(first.record.seq, 1);
        assert_eq!(second.record.seq, 2);
        assert_eq!(second.balance, 15);
        assert_eq!(second.total_custodied, 15);
    }

    #[test]
    fn rejected_operation_does_not_consume_a_sequence_number() {
        let mut bank = funded_bank();
        let mut custody = NativeCustody::new(&mut bank, addr("vault"));
        let mut vault = Vault::native(addr("owner"));

        vault.deposit(&mut custody, &addr("alice"), 0).unwrap_err();
        let receipt = vault.deposit(&mut custody, &addr("alice"), 1).unwrap();
        assert_eq!(receipt.record.seq, 1);
    }

    #[test]
    fn events_since_skips_seen_records() {
        let mut bank = funded_bank();
        let mut custody = NativeCustody::new(&mut bank, addr("vault"));
        let mut vault = Vault::native(addr("owner"));
        for _ in 0..3 {
            vault.deposit(&mut custody, &addr("alice"), 1).unwrap();
        }
        assert_eq!(vault.events_since(0).len(), 3);
        assert_eq!(vault.events_since(2).len(), 1);
        assert_eq!(vault.events_since(2)[0].seq, 3);
        assert!(vault.events_since(10).is_empty());
    }

    #[test]
    fn audit_is_owner_only() {
        let vault = Vault::native(addr("owner"));
        assert!(vault.audit(&addr("owner")).is_ok());
        let err = vault.audit(&addr("alice")).unwrap_err();
        assert!(matches!(err, VaultError::OwnerOnly { .. }));
    }

    #[test]
    fn owner_may_read_balances() {
        let vault = Vault::native(addr("owner"));
        assert_eq!(vault.my_balance(&addr("owner")), 0);
        assert_eq!(vault.get_contract_balance(), 0);
    }

    #[test]
    fn receipt_serializes_with_event_payload() {
        let mut bank = funded_bank();
        let mut custody = NativeCustody::new(&mut bank, addr("vault"));
        let mut vault = Vault::native(addr("owner"));
        let receipt = vault.deposit(&mut custody, &addr("alice"), 10).unwrap();

        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["balance"], 10);
        assert_eq!(json["total_custodied"], 10);
        assert_eq!(json["record"]["seq"], 1);
        assert_eq!(json["record"]["event"]["deposit_successful"]["depositor"], "alice");
    }

    #[test]
    fn reconciliation_math() {
        let r = Reconciliation::new(10, 15);
        assert_eq!((r.surplus, r.shortfall), (5, 0));
        assert!(r.is_solvent());

        let r = Reconciliation::new(15, 10);
        assert_eq!((r.surplus, r.shortfall), (0, 5));
        assert!(!r.is_solvent());
    }
}
