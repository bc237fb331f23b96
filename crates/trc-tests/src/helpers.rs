//! Shared fixtures for the integration tests.

use trc_core::Address;
use trc_wallet::{KdfParams, MemoryStore, Wallet, WalletConfig, WalletStorage};

/// Standard electrum seed with known receiving and change addresses.
pub const SEED_PHRASE: &str =
    "hint shock chair puzzle shock traffic drastic note dinosaur mention suggest sweet";

/// First receiving address of [`SEED_PHRASE`] and its key.
pub const SEED_RECEIVING_0: (&str, &str) = (
    "1M5TAikkAhJ1myQY5ihAXqHWrFE5iVkh7c",
    "p2pkh:Kz1ZnW7x6jgdJnk2KuwDpccQu1yNsi5LGcyySMS1vpgCu2b75HBn",
);

pub const SEED_RECEIVING_1: (&str, &str) = (
    "1DYdV8jpRXF5W4qUwXTaCkadBWyANc1sQ1",
    "p2pkh:L2pttW6uTtoLcbRYbJr5wR36Up3EGLeEJBLUnggs5HXDUQ5ti2kF",
);

/// Third receiving address; outside a gap limit of 2.
pub const SEED_RECEIVING_2: &str = "142rtSPAEug652q7y5Epo4F5AeMaRQJcW9";

pub const SEED_CHANGE_0: (&str, &str) = (
    "1DRbTcu9dNE7WiAYMejjCZGYgo9n2qqz6o",
    "p2pkh:L2byajxJ6neJDs4PNYULGpuW8G72wzU7XPSPSDqUK6EAZDZ6jQ3i",
);

pub const SEED_CHANGE_1: &str = "16roH9JEdzJ2rLjr8aLiW3XUoPVDm6pVHY";

/// Imported key pair: address, typed WIF, compressed public key.
pub const IMPORTED_A: (&str, &str, &str) = (
    "14fvqmvaHt8bMeokezknBSCwdvaex5cj3p",
    "p2pkh:L4rYY5QpfN6wJEF4SEKDpcGhTPnCe9zcGs6hiSnhpprZqVywFifN",
    "021f110909ded653828a254515b58498a6bafc96799fb0851554463ed44ca7d9da",
);

pub const IMPORTED_B: (&str, &str) = (
    "18rit2FRjckycUM6Xeu7K3ib1VUnWaKGHE",
    "p2pkh:L4jkdiXszG26SUYvwwJhzGwg37H2nLhrbip7u6crmgNeJysv5FHL",
);

/// Mainnet config with the given receiving gap and cheap Argon2 parameters.
pub fn test_config(gap_limit: u32) -> WalletConfig {
    WalletConfig {
        gap_limit,
        kdf: KdfParams::light(),
        ..WalletConfig::default()
    }
}

/// The standard seed wallet with a receiving gap of 2.
pub fn seed_wallet() -> Wallet {
    Wallet::restore_from_text(SEED_PHRASE, None, &test_config(2))
        .expect("seed phrase restores")
}

/// A wallet holding both imported keys.
pub fn imported_wallet() -> Wallet {
    let text = format!("{} {}", IMPORTED_A.1, IMPORTED_B.1);
    Wallet::restore_from_text(&text, None, &test_config(20)).expect("keys import")
}

/// Save `wallet` into a fresh in-memory store and load it back.
pub fn save_and_reload(mut wallet: Wallet, passphrase: Option<&str>) -> (Wallet, MemoryStore) {
    let store = MemoryStore::new();
    let (storage, _) =
        WalletStorage::open_with_kdf(Box::new(store.clone()), passphrase, KdfParams::light())
            .expect("empty store opens");
    wallet.attach_storage(storage);
    wallet.save().expect("save succeeds");

    let (storage, doc) =
        WalletStorage::open_with_kdf(Box::new(store.clone()), passphrase, KdfParams::light())
            .expect("saved image opens");
    (Wallet::load(storage, &doc).expect("document loads"), store)
}

pub fn addr(s: &str) -> Address {
    s.parse().expect("valid address literal")
}
