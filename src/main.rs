//! bcy-signer - local key management and signing for the BlockCypher-style API
//!
//! Every command prints JSON on stdout. Private keys are taken as 64 hex
//! characters or WIF and are never echoed back, except by `gen-keychain`.

use anyhow::{bail, Context, Result};
use bcy_signer::tx::{KeyAssignment, MicroRequest, NonceMode, Signature, Signer, TransactionSkeleton};
use bcy_signer::utils::logging;
use bcy_signer::wallet::{self, ExtendedPublicKey, KeyPair};
use bcy_signer::{log_info, ClientConfig, Digest, NetworkParams};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bcy-signer")]
#[command(about = "Client-side keys, multisig addresses and signatures for the BlockCypher API", long_about = None)]
#[command(version)]
struct Cli {
    /// Coin (btc, ltc, doge, dash, bcy); defaults to $BCY_COIN or bcy
    #[arg(long, global = true)]
    coin: Option<String>,

    /// Chain (main, test3, test); defaults to $BCY_CHAIN, then main (test for bcy)
    #[arg(long, global = true)]
    chain: Option<String>,

    /// Emit debug logs on stderr (also BCY_SIGNER_DEBUG=1)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a keypair and print address, public key, private key and WIF
    GenKeychain {
        /// Use the 65-byte public key encoding
        #[arg(long)]
        uncompressed: bool,
    },

    /// Build an M-of-N multisig redeem script and its P2SH address
    Multisig {
        /// Signatures required (M)
        #[arg(short, long)]
        threshold: usize,

        /// Public keys (hex), in script order
        #[arg(required = true)]
        pubkeys: Vec<String>,
    },

    /// Derive child addresses from an extended public key
    Derive {
        /// Extended public key (xpub/tpub)
        #[arg(short, long)]
        xpub: String,

        /// First child index
        #[arg(short, long, default_value_t = 0)]
        index: u32,

        /// Number of consecutive children
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Derive change addresses
        #[arg(long)]
        change: bool,

        /// Path layout below the extended key (0 = chain/index)
        #[arg(long, default_value_t = 0)]
        depth: u32,
    },

    /// Sign a 32-byte digest
    SignDigest {
        /// Private key (hex or WIF)
        #[arg(short, long)]
        key: String,

        /// Digest (hex)
        #[arg(short, long)]
        digest: String,

        /// Mix OS entropy into the nonce
        #[arg(long)]
        randomized: bool,
    },

    /// Verify a DER signature over a digest
    Verify {
        #[arg(short, long)]
        digest: String,

        #[arg(short, long)]
        signature: String,

        /// Public key (hex)
        #[arg(short, long)]
        pubkey: String,
    },

    /// Fill the signatures of a transaction skeleton (JSON file or stdin)
    SignSkeleton {
        /// Skeleton JSON file; stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Private keys (hex or WIF); repeat for several
        #[arg(short, long, required = true)]
        key: Vec<String>,

        /// Key i signs input i
        #[arg(long)]
        positional: bool,
    },

    /// Sign the digests of a microtransaction
    MicroSign {
        /// Private key (hex or WIF)
        #[arg(short, long)]
        key: String,

        /// Recipient address
        #[arg(short, long)]
        to: String,

        /// Value in base units
        #[arg(short, long)]
        value: u64,

        /// Digests returned by the service (hex)
        #[arg(required = true)]
        digests: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug || std::env::var("BCY_SIGNER_DEBUG").map(|v| v == "1").unwrap_or(false) {
        logging::enable_debug();
    }

    let network = resolve_network(cli.coin.as_deref(), cli.chain.as_deref())?;
    log_info!("cli", "Using network", network = network);

    match cli.command {
        Commands::GenKeychain { uncompressed } => {
            let mut pair = KeyPair::generate(network)?;
            if uncompressed {
                pair = pair.uncompressed();
            }
            print_json(&pair.export_keychain())
        }
        Commands::Multisig { threshold, pubkeys } => {
            let script_type = format!("multisig-{}-of-{}", threshold, pubkeys.len());
            let descriptor = wallet::gen_addr_multisig(&pubkeys, &script_type, &network)?;
            print_json(&descriptor)
        }
        Commands::Derive {
            xpub,
            index,
            count,
            change,
            depth,
        } => {
            let parent = ExtendedPublicKey::parse(&xpub)?;
            let children = (index..index.saturating_add(count))
                .map(|i| wallet::derive_child(&parent, i, change, depth, &network))
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&children)
        }
        Commands::SignDigest { key, digest, randomized } => {
            let pair = KeyPair::parse(&key, network)?;
            let digest = Digest::from_hex(&digest)?;
            let nonce = if randomized {
                NonceMode::Randomized
            } else {
                NonceMode::Deterministic
            };
            let signature = Signer::new(nonce).sign_digest(&digest, &pair)?;
            print_json(&json!({
                "signature": signature,
                "public_key": pair.public_key_hex(),
            }))
        }
        Commands::Verify {
            digest,
            signature,
            pubkey,
        } => {
            let digest = Digest::from_hex(&digest)?;
            let signature = Signature::from_der_hex(&signature)?;
            let public_key = wallet::parse_public_key(&pubkey)?;
            let valid = Signer::default().verify_digest(&signature, &digest, &public_key);
            print_json(&json!({ "valid": valid }))
        }
        Commands::SignSkeleton { file, key, positional } => {
            let payload = read_input(file.as_ref())?;
            let skeleton = TransactionSkeleton::from_json(&payload)?;
            let keys = key
                .iter()
                .map(|k| KeyPair::parse(k, network))
                .collect::<Result<Vec<_>, _>>()?;
            let assignment = if positional {
                KeyAssignment::Positional
            } else {
                KeyAssignment::ByExpectedSigner
            };
            let signed = Signer::default().sign_skeleton(&skeleton, &keys, assignment)?;
            signed.ensure_submittable()?;
            print_json(&signed)
        }
        Commands::MicroSign { key, to, value, digests } => {
            let pair = KeyPair::parse(&key, network)?;
            let digests = digests
                .iter()
                .map(|d| Digest::from_hex(d))
                .collect::<Result<Vec<_>, _>>()?;
            let tx = MicroRequest::with_private_key(pair, to, value).into_transaction(digests)?;
            print_json(&tx.submission()?)
        }
    }
}

fn resolve_network(coin: Option<&str>, chain: Option<&str>) -> Result<NetworkParams> {
    Ok(ClientConfig::resolve(coin, chain)?.network())
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).context("reading stdin")?;
            if buffer.trim().is_empty() {
                bail!("no skeleton on stdin");
            }
            Ok(buffer)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
