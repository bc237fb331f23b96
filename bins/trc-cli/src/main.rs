//! trc-cli: Command-line wallet interface for TRC.
//!
//! Creates and restores wallets, lists addresses, exports keys and
//! encrypts messages to wallet keys, with passphrase-protected storage.

mod setconfig;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use trc_core::{xkey, DerivationPath, Network, ScriptType};
use trc_wallet::{
    crypto_box, Branch, FileStore, SeedType, Wallet, WalletConfig, WalletError, WalletStorage,
};

/// TRC command-line wallet interface.
#[derive(Parser)]
#[command(name = "trc-cli")]
#[command(version, about = "Deterministic wallet for TRC.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a wallet with a new electrum seed.
    Create(CreateArgs),
    /// Restore a wallet from a seed, an extended key or private keys.
    Restore(RestoreArgs),
    /// List wallet addresses.
    #[command(name = "listaddresses")]
    ListAddresses(ListAddressesArgs),
    /// Show the master public key.
    #[command(name = "getmpk")]
    GetMpk(WalletArgs),
    /// Export private keys for wallet addresses.
    #[command(name = "getprivatekeys")]
    GetPrivateKeys(GetPrivateKeysArgs),
    /// Import a private key into an imported-key wallet.
    #[command(name = "importprivkey")]
    ImportPrivKey(ImportPrivKeyArgs),
    /// Convert an extended key to the version bytes of another script type.
    #[command(name = "convert-xkey")]
    ConvertXkey(ConvertXkeyArgs),
    /// Encrypt a message to a public key.
    Encrypt(EncryptArgs),
    /// Decrypt a message with the wallet key for a public key.
    Decrypt(DecryptArgs),
    /// Parse and normalize a configuration value.
    #[command(name = "setconfig")]
    SetConfig(SetConfigArgs),
}

#[derive(Args)]
struct WalletArgs {
    /// Path to wallet file (default: ~/.trc/wallet.dat).
    #[arg(short, long)]
    wallet: Option<PathBuf>,
}

#[derive(Args)]
struct NewWalletArgs {
    /// Path to wallet file (default: ~/.trc/wallet.dat).
    #[arg(short, long)]
    wallet: Option<PathBuf>,

    /// Network (mainnet or testnet).
    #[arg(short, long, default_value = "mainnet")]
    network: Network,

    /// Unused receiving addresses to keep ahead.
    #[arg(long, default_value_t = 20)]
    gap_limit: u32,

    /// Unused change addresses to keep ahead.
    #[arg(long, default_value_t = 6)]
    change_gap_limit: u32,
}

impl NewWalletArgs {
    fn config(&self) -> WalletConfig {
        WalletConfig {
            network: self.network,
            gap_limit: self.gap_limit,
            change_gap_limit: self.change_gap_limit,
            ..WalletConfig::default()
        }
    }
}

#[derive(Args)]
struct CreateArgs {
    #[command(flatten)]
    target: NewWalletArgs,

    /// Create a segwit seed instead of a standard one.
    #[arg(long)]
    segwit: bool,
}

#[derive(Args)]
struct RestoreArgs {
    #[command(flatten)]
    target: NewWalletArgs,

    /// Seed, extended key or private keys. If not provided, will prompt securely.
    #[arg(short, long)]
    text: Option<String>,

    /// Prompt for a seed extension passphrase.
    #[arg(long)]
    seed_passphrase: bool,

    /// Treat the text as a BIP-39 mnemonic derived at this account path.
    #[arg(long)]
    bip39_path: Option<String>,

    /// Script type for BIP-39 accounts.
    #[arg(long, default_value = "p2wpkh")]
    script_type: ScriptType,
}

#[derive(Args)]
struct ListAddressesArgs {
    #[command(flatten)]
    wallet: WalletArgs,

    /// Only list receiving addresses.
    #[arg(long, conflicts_with = "change")]
    receiving: bool,

    /// Only list change addresses.
    #[arg(long)]
    change: bool,
}

#[derive(Args)]
struct GetPrivateKeysArgs {
    #[command(flatten)]
    wallet: WalletArgs,

    /// Addresses to export.
    #[arg(required = true)]
    addresses: Vec<String>,
}

#[derive(Args)]
struct ImportPrivKeyArgs {
    #[command(flatten)]
    wallet: WalletArgs,

    /// Private key as `[script:]WIF`.
    key: String,
}

#[derive(Args)]
struct ConvertXkeyArgs {
    /// Extended public or private key.
    xkey: String,

    /// Target script type.
    xtype: ScriptType,
}

#[derive(Args)]
struct EncryptArgs {
    /// Hex-encoded recipient public key.
    pubkey: String,

    /// Message text.
    message: String,
}

#[derive(Args)]
struct DecryptArgs {
    #[command(flatten)]
    wallet: WalletArgs,

    /// Hex-encoded public key the message was encrypted to.
    pubkey: String,

    /// Base64 ciphertext.
    ciphertext: String,
}

#[derive(Args)]
struct SetConfigArgs {
    /// Option name.
    key: String,

    /// Raw value text.
    value: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create(args) => wallet_create(args),
        Commands::Restore(args) => wallet_restore(args),
        Commands::ListAddresses(args) => list_addresses(args),
        Commands::GetMpk(args) => get_mpk(args),
        Commands::GetPrivateKeys(args) => get_private_keys(args),
        Commands::ImportPrivKey(args) => import_privkey(args),
        Commands::ConvertXkey(args) => convert_xkey(args),
        Commands::Encrypt(args) => encrypt(args),
        Commands::Decrypt(args) => decrypt(args),
        Commands::SetConfig(args) => set_config(args),
    }
}

/// Create a new wallet and print its seed once.
fn wallet_create(args: CreateArgs) -> Result<()> {
    let seed_type = if args.segwit {
        SeedType::Segwit
    } else {
        SeedType::Standard
    };
    let config = args.target.config();
    let (wallet, phrase) = Wallet::create(seed_type, &config).context("Failed to create wallet")?;

    let path = save_new_wallet(wallet, &args.target)?;

    println!("\n=== WALLET CREATED ===");
    println!("Network: {}", config.network);
    println!("\nSEED PHRASE (BACKUP THIS):");
    println!("  {}", phrase);
    println!("\nWARNING: This seed phrase will NOT be shown again.");
    println!("\nWallet saved to: {}", path.display());
    Ok(())
}

/// Restore a wallet from text.
fn wallet_restore(args: RestoreArgs) -> Result<()> {
    let text = match args.text {
        Some(t) => t,
        None => prompt_password("Enter seed, master key or private keys")?,
    };
    let seed_passphrase = if args.seed_passphrase {
        Some(prompt_password("Enter seed extension")?)
    } else {
        None
    };
    let config = args.target.config();

    let wallet = match &args.bip39_path {
        Some(path) => {
            let path: DerivationPath = path
                .parse()
                .with_context(|| format!("Invalid derivation path: {}", path))?;
            Wallet::from_bip39(
                &text,
                seed_passphrase.as_deref().unwrap_or(""),
                &path,
                args.script_type,
                &config,
            )
        }
        None => Wallet::restore_from_text(&text, seed_passphrase.as_deref(), &config),
    }
    .context("Failed to restore wallet")?;

    let wallet_type = wallet.metadata().wallet_type.clone();
    let path = save_new_wallet(wallet, &args.target)?;

    println!("Restored {} wallet", wallet_type);
    println!("Wallet saved to: {}", path.display());
    Ok(())
}

fn list_addresses(args: ListAddressesArgs) -> Result<()> {
    let wallet = open_wallet(args.wallet.wallet)?;
    let branches: &[Branch] = if args.receiving {
        &[Branch::Receiving]
    } else if args.change {
        &[Branch::Change]
    } else {
        &Branch::ALL
    };
    for branch in branches {
        for address in wallet.addresses(*branch) {
            println!("{}", address);
        }
    }
    Ok(())
}

fn get_mpk(args: WalletArgs) -> Result<()> {
    let wallet = open_wallet(args.wallet)?;
    match wallet.master_public_key() {
        Some(mpk) => println!("{}", mpk),
        None => bail!("Imported-key wallets have no master public key"),
    }
    Ok(())
}

fn get_private_keys(args: GetPrivateKeysArgs) -> Result<()> {
    let wallet = open_wallet(args.wallet.wallet)?;
    let keys = wallet
        .get_private_keys(&args.addresses)
        .context("Failed to export private keys")?;
    if let [single] = keys.as_slice() {
        println!("{}", single);
    } else {
        println!("{}", serde_json::to_string_pretty(&keys)?);
    }
    Ok(())
}

fn import_privkey(args: ImportPrivKeyArgs) -> Result<()> {
    let mut wallet = open_wallet(args.wallet.wallet)?;
    let address = wallet
        .import_private_key(&args.key)
        .context("Failed to import private key")?;
    wallet.save().context("Failed to save wallet")?;
    println!("{}", address);
    Ok(())
}

fn convert_xkey(args: ConvertXkeyArgs) -> Result<()> {
    let converted = xkey::convert_xkey(&args.xkey, args.xtype).context("Invalid extended key")?;
    println!("{}", converted);
    Ok(())
}

fn encrypt(args: EncryptArgs) -> Result<()> {
    let ciphertext =
        crypto_box::encrypt_message(&args.pubkey, &args.message).context("Encryption failed")?;
    println!("{}", ciphertext);
    Ok(())
}

fn decrypt(args: DecryptArgs) -> Result<()> {
    let wallet = open_wallet(args.wallet.wallet)?;
    let plaintext = wallet
        .decrypt_message(&args.pubkey, &args.ciphertext)
        .context("Decryption failed")?;
    println!("{}", plaintext);
    Ok(())
}

fn set_config(args: SetConfigArgs) -> Result<()> {
    let value = setconfig::normalize_value(&args.key, &args.value)?;
    tracing::debug!(key = %args.key, ?value, "config value normalized");
    println!("{}", serde_json::to_string(&value)?);
    Ok(())
}

// --- Helpers ---

/// Open an existing wallet, prompting for the password only if the file is encrypted.
fn open_wallet(path: Option<PathBuf>) -> Result<Wallet> {
    let wallet_path = resolve_wallet_path(path)?;
    if !wallet_path.exists() {
        bail!("Wallet file not found: {}", wallet_path.display());
    }

    tracing::debug!(path = %wallet_path.display(), "opening wallet");
    let port = || Box::new(FileStore::new(&wallet_path));
    let (storage, doc) = match WalletStorage::open(port(), None) {
        Err(WalletError::DecryptionFailed) => {
            tracing::debug!("wallet file is encrypted");
            let password = prompt_password("Enter wallet password")?;
            WalletStorage::open(port(), Some(&password))
                .context("Failed to open wallet (wrong password?)")?
        }
        other => other.context("Failed to open wallet")?,
    };
    let wallet = Wallet::load(storage, &doc).context("Failed to load wallet")?;
    tracing::debug!(wallet_type = %wallet.metadata().wallet_type, "wallet loaded");
    Ok(wallet)
}

/// Attach encrypted (or clear, on an empty password) storage and save.
fn save_new_wallet(mut wallet: Wallet, target: &NewWalletArgs) -> Result<PathBuf> {
    let wallet_path = resolve_wallet_path(target.wallet.clone())?;
    if wallet_path.exists() {
        bail!("Wallet file already exists: {}", wallet_path.display());
    }

    let password = prompt_password("Enter wallet password (empty for none)")?;
    let password_confirm = prompt_password("Confirm password")?;
    if password != password_confirm {
        bail!("Passwords do not match");
    }
    let passphrase = (!password.is_empty()).then_some(password.as_str());

    let (storage, _) = WalletStorage::open_with_kdf(
        Box::new(FileStore::new(&wallet_path)),
        passphrase,
        target.config().kdf,
    )
    .context("Failed to prepare wallet storage")?;
    wallet.attach_storage(storage);
    wallet.save().context("Failed to save wallet")?;
    tracing::info!(
        path = %wallet_path.display(),
        encrypted = passphrase.is_some(),
        "wallet saved"
    );
    Ok(wallet_path)
}

/// Resolve the wallet file path, defaulting to ~/.trc/wallet.dat.
fn resolve_wallet_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p),
        None => {
            let home = dirs::home_dir().context("Could not determine home directory")?;
            Ok(home.join(".trc").join("wallet.dat"))
        }
    }
}

/// Prompt for a password without echoing input.
fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{}: ", prompt)).context("Failed to read password")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_convert_xkey() {
        let cli = Cli::try_parse_from(["trc-cli", "convert-xkey", "xpub123", "p2wpkh"]).unwrap();
        match cli.command {
            Commands::ConvertXkey(args) => {
                assert_eq!(args.xkey, "xpub123");
                assert_eq!(args.xtype, ScriptType::P2wpkh);
            }
            _ => panic!("expected convert-xkey"),
        }
    }

    #[test]
    fn parse_rejects_unknown_script_type() {
        assert!(Cli::try_parse_from(["trc-cli", "convert-xkey", "xpub123", "p2tr"]).is_err());
    }

    #[test]
    fn parse_create_defaults() {
        let cli = Cli::try_parse_from(["trc-cli", "create", "--segwit", "-n", "testnet"]).unwrap();
        match cli.command {
            Commands::Create(args) => {
                assert!(args.segwit);
                let cfg = args.target.config();
                assert_eq!(cfg.network, Network::Testnet);
                assert_eq!(cfg.gap_limit, 20);
                assert_eq!(cfg.change_gap_limit, 6);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn getprivatekeys_requires_an_address() {
        assert!(Cli::try_parse_from(["trc-cli", "getprivatekeys"]).is_err());
        assert!(Cli::try_parse_from(["trc-cli", "getprivatekeys", "1abc", "1def"]).is_ok());
    }

    #[test]
    fn explicit_wallet_path_wins() {
        let p = PathBuf::from("/tmp/w.dat");
        assert_eq!(resolve_wallet_path(Some(p.clone())).unwrap(), p);
    }
}
