// Vault throughput benchmarks.
//
// Covers the deposit/withdraw round trip against an in-memory native bank
// and a token ledger, plus ledger snapshots at various depositor counts.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use custody_contracts::Vault;
use custody_ledger::asset::{InMemoryToken, NativeBank, NativeCustody, TokenCustody, TokenLedger};
use custody_ledger::{Address, Amount};

fn bench_native_round_trip(c: &mut Criterion) {
    let dana = Address::new("dana");
    let mut bank = NativeBank::new();
    bank.fund(&dana, Amount::MAX / 2).unwrap();
    let mut custody = NativeCustody::new(bank, Address::new("vault"));
    let mut vault = Vault::native(Address::new("owner"));

    c.bench_function("vault/native_deposit_withdraw", |b| {
        b.iter(|| {
            vault.deposit(&mut custody, &dana, 1_000).unwrap();
            vault.withdraw(&mut custody, &dana, 1_000).unwrap();
        });
    });
}

fn bench_token_round_trip(c: &mut Criterion) {
    let dana = Address::new("dana");
    let custodian = Address::new("vault");
    let mut token = InMemoryToken::deploy(
        Address::new("token:ctt"),
        "Custody Test Token",
        "CTT",
        18,
        &dana,
        Amount::MAX / 2,
    )
    .unwrap();
    token.approve(&dana, &custodian, Amount::MAX);
    let mut custody = TokenCustody::new(token, custodian);
    let mut vault = Vault::token(Address::new("owner"), Address::new("token:ctt"));

    c.bench_function("vault/token_deposit_withdraw", |b| {
        b.iter(|| {
            vault.deposit(&mut custody, &dana, 1_000).unwrap();
            vault.withdraw(&mut custody, &dana, 1_000).unwrap();
        });
    });
}

fn bench_audit_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("vault/audit_snapshot");
    let owner = Address::new("owner");

    for size in [10usize, 100, 1_000] {
        let mut bank = NativeBank::new();
        let mut vault = Vault::native(owner.clone());
        let depositors: Vec<Address> = (0..size).map(|i| Address::new(format!("d{}", i))).collect();
        for d in &depositors {
            bank.fund(d, 100).unwrap();
        }
        let mut custody = NativeCustody::new(&mut bank, Address::new("vault"));
        for d in &depositors {
            vault.deposit(&mut custody, d, 100).unwrap();
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &vault, |b, vault| {
            b.iter(|| vault.audit(&owner).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_native_round_trip,
    bench_token_round_trip,
    bench_audit_snapshot
);
criterion_main!(benches);
