//! # Shared Vault
//!
//! A [`Vault`] and its [`TransferAdapter`] behind one lock, for hosts that
//! serve callers from many threads (the node's HTTP API, for one).
//!
//! Mutating calls are serialized through a `parking_lot::Mutex`: two calls
//! from the same caller on different threads simply run one after the
//! other. Before taking the lock each call records its thread in an
//! in-flight table. A call made from a thread that is already inside an
//! operation (an adapter hook calling back in, under any identity) is
//! refused with [`VaultError::ReentrantCall`] instead of deadlocking.
//!
//! A commit hook, if installed, sees every committed receipt while the lock
//! is still held, so it observes receipts in sequence order.

use std::thread::{self, ThreadId};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::warn;

use custody_ledger::asset::TransferAdapter;
use custody_ledger::{Address, Amount, LedgerSnapshot, VaultError};

use crate::vault::{OperationReceipt, Reconciliation, Vault};

struct VaultCell<A> {
    vault: Vault,
    adapter: A,
}

type CommitHook = Box<dyn Fn(&OperationReceipt, &Vault) + Send + Sync>;

/// Thread-safe handle over a vault and the adapter it moves assets with.
pub struct SharedVault<A> {
    cell: Mutex<VaultCell<A>>,
    in_flight: DashMap<ThreadId, Address>,
    on_commit: Option<CommitHook>,
}

impl<A: TransferAdapter> SharedVault<A> {
    pub fn new(vault: Vault, adapter: A) -> Self {
        Self {
            cell: Mutex::new(VaultCell { vault, adapter }),
            in_flight: DashMap::new(),
            on_commit: None,
        }
    }

    /// Installs `hook`, called with each committed receipt and the vault
    /// state right after it, under the lock.
    ///
    /// The hook must not call back into this vault.
    pub fn with_commit_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&OperationReceipt, &Vault) + Send + Sync + 'static,
    {
        self.on_commit = Some(Box::new(hook));
        self
    }

    /// See [`Vault::deposit`].
    pub fn deposit(&self, caller: &Address, amount: Amount) -> Result<OperationReceipt, VaultError> {
        let _guard = self.enter(caller)?;
        let mut cell = self.cell.lock();
        let VaultCell { vault, adapter } = &mut *cell;
        let receipt = vault.deposit(adapter, caller, amount)?;
        self.committed(&receipt, vault);
        Ok(receipt)
    }

    /// See [`Vault::withdraw`].
    pub fn withdraw(&self, caller: &Address, amount: Amount) -> Result<OperationReceipt, VaultError> {
        let _guard = self.enter(caller)?;
        let mut cell = self.cell.lock();
        let VaultCell { vault, adapter } = &mut *cell;
        let receipt = vault.withdraw(adapter, caller, amount)?;
        self.committed(&receipt, vault);
        Ok(receipt)
    }

    /// See [`Vault::reconcile`].
    pub fn reconcile(&self) -> Result<Reconciliation, VaultError> {
        let cell = self.cell.lock();
        cell.vault.reconcile(&cell.adapter)
    }

    /// See [`Vault::audit`].
    pub fn audit(&self, caller: &Address) -> Result<LedgerSnapshot, VaultError> {
        self.cell.lock().vault.audit(caller)
    }

    /// Runs `f` against the vault under the lock.
    ///
    /// Must not be called from inside an adapter operation on the same
    /// vault; the lock is not re-entrant.
    pub fn read<R>(&self, f: impl FnOnce(&Vault) -> R) -> R {
        f(&self.cell.lock().vault)
    }

    /// Runs `f` against the adapter under the lock (faucets, approvals).
    /// Same re-entrancy restriction as [`read`](Self::read).
    pub fn with_adapter<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        f(&mut self.cell.lock().adapter)
    }

    /// Consumes the handle and returns the vault and adapter.
    pub fn into_parts(self) -> (Vault, A) {
        let VaultCell { vault, adapter } = self.cell.into_inner();
        (vault, adapter)
    }

    fn committed(&self, receipt: &OperationReceipt, vault: &Vault) {
        if let Some(hook) = &self.on_commit {
            hook(receipt, vault);
        }
    }

    fn enter(&self, caller: &Address) -> Result<InFlightGuard<'_>, VaultError> {
        let current = thread::current().id();
        match self.in_flight.entry(current) {
            Entry::Occupied(inside) => {
                warn!(
                    caller = %caller,
                    inside = %inside.get(),
                    "call from a thread already inside the vault"
                );
                Err(VaultError::ReentrantCall {
                    caller: caller.clone(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(caller.clone());
                Ok(InFlightGuard {
                    table: &self.in_flight,
                    thread: current,
                })
            }
        }
    }
}

/// Removes the thread from the in-flight table when the operation ends,
/// including on panic.
struct InFlightGuard<'a> {
    table: &'a DashMap<ThreadId, Address>,
    thread: ThreadId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.table.remove(&self.thread);
    }
}
