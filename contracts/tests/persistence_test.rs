//! Integration tests for sled-backed vaults: state survives a restart and a
//! store can't be reopened as a different vault.

use custody_contracts::Vault;
use custody_ledger::asset::{NativeBank, NativeCustody};
use custody_ledger::storage::LedgerDb;
use custody_ledger::{Address, AssetKind, VaultError};

fn addr(s: &str) -> Address {
    Address::new(s)
}

#[test]
fn vault_state_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut bank = NativeBank::new();
    bank.fund(&addr("dana"), 100).unwrap();
    bank.fund(&addr("erin"), 100).unwrap();

    {
        let store = LedgerDb::open(dir.path()).unwrap();
        let mut vault = Vault::open(store, addr("owner"), AssetKind::Native).unwrap();
        assert!(vault.is_persistent());
        let mut custody = NativeCustody::new(&mut bank, addr("vault"));
        vault.deposit(&mut custody, &addr("dana"), 30).unwrap();
        vault.deposit(&mut custody, &addr("erin"), 12).unwrap();
        vault.withdraw(&mut custody, &addr("dana"), 30).unwrap();
    }

    let store = LedgerDb::open(dir.path()).unwrap();
    let mut vault = Vault::open(store, addr("owner"), AssetKind::Native).unwrap();
    assert_eq!(vault.get_contract_balance(), 12);
    assert_eq!(vault.balance_of(&addr("erin")), 12);
    assert_eq!(vault.balance_of(&addr("dana")), 0);
    assert_eq!(vault.depositor_count(), 1);
    assert_eq!(vault.events().len(), 3);

    // the sequence continues where it left off
    let mut custody = NativeCustody::new(&mut bank, addr("vault"));
    let receipt = vault.deposit(&mut custody, &addr("dana"), 1).unwrap();
    assert_eq!(receipt.record.seq, 4);
    assert!(vault.reconcile(&custody).unwrap().is_solvent());
}

#[test]
fn reopening_as_another_owner_is_refused() {
    let store = LedgerDb::open_temporary().unwrap();
    Vault::open(store.clone(), addr("owner"), AssetKind::Native).unwrap();

    let err = Vault::open(store, addr("mallory"), AssetKind::Native).unwrap_err();
    assert!(matches!(err, VaultError::StoreMismatch(_)));
}

#[test]
fn reopening_for_another_asset_is_refused() {
    let store = LedgerDb::open_temporary().unwrap();
    Vault::open(store.clone(), addr("owner"), AssetKind::Native).unwrap();

    let err = Vault::open(
        store,
        addr("owner"),
        AssetKind::Token(addr("token:ctt")),
    )
    .unwrap_err();
    assert_eq!(err.code(), "store_mismatch");
}

#[test]
fn rejected_operations_are_not_persisted() {
    let store = LedgerDb::open_temporary().unwrap();
    let mut vault = Vault::open(store.clone(), addr("owner"), AssetKind::Native).unwrap();
    let mut bank = NativeBank::new();
    let mut custody = NativeCustody::new(&mut bank, addr("vault"));

    vault.deposit(&mut custody, &addr("owner"), 5).unwrap_err();
    vault.deposit(&mut custody, &addr("dana"), 0).unwrap_err();
    vault.withdraw(&mut custody, &addr("dana"), 5).unwrap_err();

    assert_eq!(store.event_count(), 0);
    assert!(store.load_entries().unwrap().is_empty());
}
