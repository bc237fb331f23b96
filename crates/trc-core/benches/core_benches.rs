//! Criterion benchmarks for trc-core critical operations.
//!
//! Covers: extended-key decode/encode, private and public child derivation,
//! and address encoding.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use trc_core::derivation::{derive_child, derive_path, master_from_seed, ChildNumber};
use trc_core::{Address, ExtendedKey, Network, ScriptType};

const XPUB: &str = "xpub6CCWFbvCbqF92kGwm9nV7t7RvVoQUKaq5USMdyVP6jvv1NgN52KAX6NNYCeE8Ca7JQC4K5tZcnQrubQcjJ6iixfPs4pwAQJAQgTt6hBjg11";

fn sample_master() -> ExtendedKey {
    master_from_seed(&[7u8; 64], Network::Mainnet, ScriptType::P2pkh).unwrap()
}

fn bench_codec(c: &mut Criterion) {
    c.bench_function("xkey_decode", |b| {
        b.iter(|| ExtendedKey::decode(black_box(XPUB)).unwrap())
    });

    let key = ExtendedKey::decode(XPUB).unwrap();
    c.bench_function("xkey_encode", |b| b.iter(|| black_box(&key).encode()));
}

fn bench_derivation(c: &mut Criterion) {
    let master = sample_master();
    let xpub = master.neuter();

    c.bench_function("derive_child_private", |b| {
        b.iter(|| derive_child(black_box(&master), ChildNumber::Normal(0)).unwrap())
    });

    c.bench_function("derive_child_public", |b| {
        b.iter(|| derive_child(black_box(&xpub), ChildNumber::Normal(0)).unwrap())
    });

    let path = "m/44'/0'/0'/0/0".parse().unwrap();
    c.bench_function("derive_path_bip44", |b| {
        b.iter(|| derive_path(black_box(&master), &path).unwrap())
    });
}

fn bench_address(c: &mut Criterion) {
    let pk = sample_master().public_key();

    c.bench_function("address_p2pkh", |b| {
        b.iter(|| {
            Address::from_public_key(black_box(&pk), ScriptType::P2pkh, Network::Mainnet)
                .unwrap()
                .encode()
        })
    });

    c.bench_function("address_p2wpkh", |b| {
        b.iter(|| {
            Address::from_public_key(black_box(&pk), ScriptType::P2wpkh, Network::Mainnet)
                .unwrap()
                .encode()
        })
    });
}

criterion_group!(benches, bench_codec, bench_derivation, bench_address);
criterion_main!(benches);
