//! End-to-end wallet command scenarios.
//!
//! Each scenario restores a wallet, persists it, loads it back and then runs
//! the command under test against the loaded copy, so the results also cover
//! the document and file format.

use trc_core::{xkey, Network, ScriptType};
use trc_tests::helpers::*;
use trc_wallet::{
    crypto_box, Branch, Capability, FileStore, KdfParams, Wallet, WalletConfig, WalletError,
    WalletStorage,
};

const XPUB: &str = "xpub6CCWFbvCbqF92kGwm9nV7t7RvVoQUKaq5USMdyVP6jvv1NgN52KAX6NNYCeE8Ca7JQC4K5tZcnQrubQcjJ6iixfPs4pwAQJAQgTt6hBjg11";
const XPRV: &str = "xprv9yD9r6PJmTgqpGCUf8FUkkAhNTxv4rryiFWkqb5mYQPw8aMDXUzuyJ3tgv5vUqYkdK1E6Q5jKxPss4HkMBYV4q8AfG8t7rxgyS4xQX4ndAm";
const TPUB: &str = "tpubD8p5qNfjczgTGbh9qgNxsbFgyhv8GgfVkmp3L88qtRm5ibUYiDVCrn6WYfnGey5XVVw6Bc5QNQUZW5B4jFQsHjmaenvkFUgWtKtgj5AdPm9";
const TPRV: &str = "tprv8c83gxdVUcznP8fMx2iNUBbaQgQC7MUbBUDG3c6YU9xgt7Dn5pfcgHUeNZTAvuYmNgVHjyTzYzGWwJr7GvKCm2FkPaaJipyipbfJeB3tdPW";

// ----------------------------------------------------------------------
// convert_xkey
// ----------------------------------------------------------------------

#[test]
fn convert_xkey_to_same_type_is_identity() {
    for key in [XPUB, XPRV, TPUB, TPRV] {
        assert_eq!(xkey::convert_xkey(key, ScriptType::P2pkh).unwrap(), key);
    }
}

#[test]
fn convert_xkey_round_trips_through_segwit_versions() {
    let cases = [
        (XPUB, "zpub", "ypub"),
        (XPRV, "zprv", "yprv"),
        (TPUB, "vpub", "upub"),
        (TPRV, "vprv", "uprv"),
    ];
    for (key, native, nested) in cases {
        let z = xkey::convert_xkey(key, ScriptType::P2wpkh).unwrap();
        assert!(z.starts_with(native), "{z} should start with {native}");
        let y = xkey::convert_xkey(key, ScriptType::P2wpkhP2sh).unwrap();
        assert!(y.starts_with(nested), "{y} should start with {nested}");
        assert_eq!(xkey::convert_xkey(&z, ScriptType::P2pkh).unwrap(), key);
        assert_eq!(xkey::convert_xkey(&y, ScriptType::P2pkh).unwrap(), key);
    }
}

#[test]
fn convert_xkey_rejects_garbage() {
    assert!(xkey::convert_xkey("xpub-not-a-key", ScriptType::P2pkh).is_err());
    // Last character altered: checksum mismatch.
    let mut broken = XPUB.to_string();
    broken.pop();
    broken.push('2');
    assert!(xkey::convert_xkey(&broken, ScriptType::P2pkh).is_err());
}

// ----------------------------------------------------------------------
// encrypt / decrypt
// ----------------------------------------------------------------------

#[test]
fn encrypt_then_decrypt_with_imported_key() {
    let (wallet, _) = save_and_reload(imported_wallet(), None);
    let (_, _, pubkey) = IMPORTED_A;
    let cleartext = "asdasd this is the message";

    let ciphertext = crypto_box::encrypt_message(pubkey, cleartext).unwrap();
    assert_eq!(wallet.decrypt_message(pubkey, &ciphertext).unwrap(), cleartext);

    // Fresh ephemeral key per message.
    let again = wallet.encrypt_message(pubkey, cleartext).unwrap();
    assert_ne!(again, ciphertext);
    assert_eq!(wallet.decrypt_message(pubkey, &again).unwrap(), cleartext);
}

#[test]
fn decrypt_with_watch_only_wallet_fails() {
    let xpub = seed_wallet().master_public_key().unwrap();
    let watch = Wallet::restore_from_text(&xpub, None, &test_config(2)).unwrap();
    assert_eq!(watch.capability(), Capability::WatchOnly);

    let signing = seed_wallet();
    let (address, _) = SEED_RECEIVING_0;
    let pubkey = signing
        .keystore()
        .key_for_address(signing.pool(), &addr(address))
        .unwrap()
        .public_key();
    let pubkey_hex = hex::encode(pubkey.serialize());
    let ciphertext = watch.encrypt_message(&pubkey_hex, "secret").unwrap();

    assert_eq!(signing.decrypt_message(&pubkey_hex, &ciphertext).unwrap(), "secret");
    assert!(watch.decrypt_message(&pubkey_hex, &ciphertext).is_err());
}

// ----------------------------------------------------------------------
// getprivatekeys
// ----------------------------------------------------------------------

#[test]
fn export_private_key_imported() {
    let (wallet, _) = save_and_reload(imported_wallet(), Some("hunter2"));

    assert!(wallet.get_private_key("asdasd").is_err());
    assert!(matches!(
        wallet.get_private_key("15fvqmvaHt8bMeokezknBSCwdvaex5cj3p"),
        Err(WalletError::AddressNotInWallet(_))
    ));
    assert_eq!(wallet.get_private_key(IMPORTED_A.0).unwrap(), IMPORTED_A.1);

    assert!(wallet
        .get_private_keys(&["19rit2FRjckycUM6Xeu7K3ib1VUnWaKGHE", "asd"])
        .is_err());
    assert_eq!(
        wallet
            .get_private_keys(&[IMPORTED_B.0, IMPORTED_A.0])
            .unwrap(),
        vec![IMPORTED_B.1, IMPORTED_A.1]
    );
}

#[test]
fn export_private_key_deterministic() {
    let (wallet, _) = save_and_reload(seed_wallet(), Some("hunter2"));

    assert!(wallet.get_private_key("asdasd").is_err());
    // Derivable, but beyond the receiving gap of 2.
    assert!(matches!(
        wallet.get_private_key(SEED_RECEIVING_2),
        Err(WalletError::AddressNotInWallet(_))
    ));
    assert_eq!(
        wallet.get_private_key(SEED_RECEIVING_0.0).unwrap(),
        SEED_RECEIVING_0.1
    );

    assert!(wallet
        .get_private_keys(&["1M5TBikkAhJ1myQY5ihAXqHWrFE5iVkh7c", "asd"])
        .is_err());
    assert_eq!(
        wallet
            .get_private_keys(&[SEED_RECEIVING_1.0, SEED_CHANGE_0.0])
            .unwrap(),
        vec![SEED_RECEIVING_1.1, SEED_CHANGE_0.1]
    );
}

#[test]
fn export_from_watch_only_wallet() {
    let xpub = seed_wallet().master_public_key().unwrap();
    let (watch, _) = save_and_reload(
        Wallet::restore_from_text(&xpub, None, &test_config(2)).unwrap(),
        None,
    );

    assert!(matches!(
        watch.get_private_key(IMPORTED_A.0),
        Err(WalletError::AddressNotInWallet(_))
    ));
    assert_eq!(
        watch.get_private_key(SEED_RECEIVING_0.0),
        Err(WalletError::NoPrivateKey)
    );
}

#[test]
fn change_branch_addresses_match_seed() {
    let wallet = seed_wallet();
    let change: Vec<String> = wallet
        .addresses(Branch::Change)
        .map(|a| a.to_string())
        .collect();
    assert_eq!(change.len(), 6);
    assert_eq!(change[0], SEED_CHANGE_0.0);
    assert_eq!(change[1], SEED_CHANGE_1);
}

#[test]
fn master_public_key_survives_reload() {
    let wallet = seed_wallet();
    let mpk = wallet.master_public_key().unwrap();
    assert_eq!(
        mpk,
        "xpub661MyMwAqRbcEq9aae9i2QB5pHNyt7B5jdE9imZjvvw62nsMLCwsYBMZ75JjUPoSGVwgoYSH1ZQau3TnsQXRCM96E7W6Sg33GWi43dTevrp"
    );
    let (loaded, _) = save_and_reload(wallet, None);
    assert_eq!(loaded.master_public_key().unwrap(), mpk);
}

// ----------------------------------------------------------------------
// Wallet files on disk
// ----------------------------------------------------------------------

#[test]
fn encrypted_file_requires_passphrase() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wallets").join("default.dat");

    let mut wallet = seed_wallet();
    let (storage, _) = WalletStorage::open_with_kdf(
        Box::new(FileStore::new(&path)),
        Some("correct horse"),
        KdfParams::light(),
    )
    .unwrap();
    wallet.attach_storage(storage);
    wallet.save().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"TRCW"));
    let as_text = String::from_utf8_lossy(&bytes);
    assert!(!as_text.contains(SEED_RECEIVING_0.0));

    assert_eq!(
        WalletStorage::open(Box::new(FileStore::new(&path)), None).unwrap_err(),
        WalletError::DecryptionFailed
    );
    assert_eq!(
        WalletStorage::open(Box::new(FileStore::new(&path)), Some("wrong")).unwrap_err(),
        WalletError::DecryptionFailed
    );

    let (storage, doc) =
        WalletStorage::open(Box::new(FileStore::new(&path)), Some("correct horse")).unwrap();
    assert!(storage.is_encrypted());
    let loaded = Wallet::load(storage, &doc).unwrap();
    assert_eq!(loaded.master_public_key(), wallet.master_public_key());
}

#[test]
fn import_then_reload_keeps_new_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("imported.dat");

    let mut wallet =
        Wallet::restore_from_text(IMPORTED_A.1, None, &test_config(20)).unwrap();
    let (storage, _) =
        WalletStorage::open_with_kdf(Box::new(FileStore::new(&path)), None, KdfParams::light())
            .unwrap();
    wallet.attach_storage(storage);
    wallet.save().unwrap();

    let address = wallet.import_private_key(IMPORTED_B.1).unwrap();
    assert_eq!(address.to_string(), IMPORTED_B.0);
    wallet.save().unwrap();

    let (storage, doc) = WalletStorage::open(Box::new(FileStore::new(&path)), None).unwrap();
    assert!(!storage.is_encrypted());
    let loaded = Wallet::load(storage, &doc).unwrap();
    assert_eq!(loaded.get_private_key(IMPORTED_B.0).unwrap(), IMPORTED_B.1);
    assert_eq!(loaded.addresses(Branch::Receiving).count(), 2);
}

#[test]
fn testnet_seed_wallet_uses_testnet_encoding() {
    let config = WalletConfig {
        network: Network::Testnet,
        ..test_config(2)
    };
    let wallet = Wallet::restore_from_text(SEED_PHRASE, None, &config).unwrap();
    assert!(wallet.master_public_key().unwrap().starts_with("tpub"));
    let first = wallet.addresses(Branch::Receiving).next().unwrap().to_string();
    assert!(first.starts_with('m') || first.starts_with('n'), "{first}");
    // Mainnet addresses are foreign to a testnet wallet.
    assert!(wallet.get_private_key(SEED_RECEIVING_0.0).is_err());
}
