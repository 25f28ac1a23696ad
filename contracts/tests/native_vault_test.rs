//! Integration tests for the native vault's rollback paths.

use custody_contracts::Vault;
use custody_ledger::asset::{BankError, NativeBank, NativeCustody, TransferAdapter};
use custody_ledger::{Address, AssetKind, TransferError, VaultError};

fn addr(s: &str) -> Address {
    Address::new(s)
}

#[test]
fn rejected_payout_restores_the_claim() {
    let mut bank = NativeBank::new();
    bank.fund(&addr("dana"), 100).unwrap();
    let mut custody = NativeCustody::new(&mut bank, addr("vault"));
    let mut vault = Vault::native(addr("owner"));
    let dana = addr("dana");

    vault.deposit(&mut custody, &dana, 40).unwrap();
    custody.bank_mut().set_rejects_value(&dana, true);

    let err = vault.withdraw(&mut custody, &dana, 15).unwrap_err();
    assert!(matches!(
        err,
        VaultError::TransferFailed(TransferError::Native(BankError::RecipientRejected(_)))
    ));
    assert_eq!(vault.my_balance(&dana), 40);
    assert_eq!(vault.get_contract_balance(), 40);
    assert_eq!(custody.custody_balance(), 40);
    assert_eq!(vault.events().len(), 1);

    // once the recipient accepts again, the same call goes through
    custody.bank_mut().set_rejects_value(&dana, false);
    vault.withdraw(&mut custody, &dana, 15).unwrap();
    assert_eq!(vault.my_balance(&dana), 25);
    assert_eq!(custody.bank().balance_of(&dana), 75);
}

#[test]
fn full_payout_rollback_restores_pruned_entry() {
    let mut bank = NativeBank::new();
    bank.fund(&addr("dana"), 10).unwrap();
    let mut custody = NativeCustody::new(&mut bank, addr("vault"));
    let mut vault = Vault::native(addr("owner"));
    let dana = addr("dana");

    vault.deposit(&mut custody, &dana, 10).unwrap();
    custody.bank_mut().set_rejects_value(&dana, true);
    vault.withdraw(&mut custody, &dana, 10).unwrap_err();

    assert_eq!(vault.depositor_count(), 1);
    assert_eq!(vault.my_balance(&dana), 10);
    assert!(vault.is_consistent());
}

#[test]
fn native_vault_has_no_token_address() {
    let vault = Vault::native(addr("owner"));
    assert_eq!(vault.asset(), &AssetKind::Native);
    assert!(vault.token_address().is_none());
}

#[test]
fn custodian_account_cannot_deposit_to_itself() {
    let mut bank = NativeBank::new();
    bank.fund(&addr("dana"), 100).unwrap();
    let mut custody = NativeCustody::new(&mut bank, addr("vault"));
    let mut vault = Vault::native(addr("owner"));
    let custodian = addr("vault");

    vault.deposit(&mut custody, &addr("dana"), 100).unwrap();

    let err = vault.deposit(&mut custody, &custodian, 100).unwrap_err();
    assert!(matches!(err, VaultError::NotPermittedForCustodian { .. }));
    assert_eq!(err.code(), "not_permitted_for_custodian");
    let err = vault.withdraw(&mut custody, &custodian, 1).unwrap_err();
    assert!(matches!(err, VaultError::NotPermittedForCustodian { .. }));

    let r = vault.reconcile(&custody).unwrap();
    assert_eq!((r.recorded, r.held, r.shortfall), (100, 100, 0));
    assert_eq!(vault.my_balance(&custodian), 0);
    assert_eq!(vault.events().len(), 1);
}
