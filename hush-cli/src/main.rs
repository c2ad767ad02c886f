//! HUSH CLI
//!
//! Drives the encrypted-input / decryption-authorization coordinator against a
//! local development node.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hush_core::traits::TypedDataSigner;
use hush_core::types::{AccountAddress, NetworkParameters};
use hush_engine::{LocalWallet, MockCoprocessor, MockEngineFactory};
use hush_keystore::FileKeyStorage;
use hush_relayer::RelayerClient;
use hush_session::{HushSession, SessionConfig};

const VERBOSE_FILTER: &str =
    "hush_core=debug,hush_relayer=debug,hush_engine=debug,hush_keystore=debug,hush_session=debug,info";
const QUIET_FILTER: &str = "warn";

/// HUSH - encrypted inputs and decryption authorizations for confidential contracts
#[derive(Parser)]
#[command(name = "hush")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON-RPC endpoint of the development node
    #[arg(long, global = true, env = "HUSH_RPC_URL")]
    rpc_url: Option<String>,

    /// Keypair file
    #[arg(long, global = true, env = "HUSH_KEYSTORE", default_value = ".hush/keystore.json")]
    keystore: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the node's ACL, input verifier and KMS verifier addresses
    Metadata,

    /// Show the client keypair, generating it if missing
    Keypair {
        /// Delete the stored keypair instead
        #[arg(long)]
        clear: bool,
    },

    /// Build an unsigned decryption authorization for a contract
    Authorize {
        /// Contract the authorization is scoped to
        #[arg(short, long)]
        contract: String,
    },

    /// Encrypt a value, authorize and decrypt it back against a mock coprocessor
    Demo {
        /// Contract receiving the encrypted input
        #[arg(short, long)]
        contract: String,
        /// Plaintext to submit
        #[arg(long)]
        value: i64,
        /// Wallet private key (random if omitted)
        #[arg(long, env = "HUSH_PRIVATE_KEY", hide_env_values = true)]
        private_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { VERBOSE_FILTER } else { QUIET_FILTER };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = SessionConfig::from_env().context("Invalid HUSH_* environment")?;
    if let Some(url) = cli.rpc_url {
        config = config.with_rpc_url(url);
    }

    match cli.command {
        Commands::Metadata => cmd_metadata(&config).await,
        Commands::Keypair { clear } => cmd_keypair(config, &cli.keystore, clear).await,
        Commands::Authorize { contract } => cmd_authorize(config, &cli.keystore, &contract).await,
        Commands::Demo {
            contract,
            value,
            private_key,
        } => cmd_demo(config, &cli.keystore, &contract, value, private_key.as_deref()).await,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

async fn fetch_parameters(config: &SessionConfig) -> Result<NetworkParameters> {
    let pb = spinner(&format!("Querying {}", config.rpc_url))?;
    let relayer = RelayerClient::with_config(config.relayer_config())?;
    let params = relayer.resolve().await;
    pb.finish_and_clear();
    if let Ok(params) = &params {
        debug!(rpc_url = %config.rpc_url, acl = %params.acl_address, "Fetched network parameters");
    }
    params.context("Failed to fetch relayer metadata")
}

/// Opens a `Ready` session whose engine is backed by a fresh mock coprocessor
/// seeded with the node's parameters.
async fn connect(config: SessionConfig, keystore: &Path) -> Result<(HushSession, Arc<MockCoprocessor>)> {
    let params = fetch_parameters(&config).await?;
    let chain_id = config.supported_chain_id;
    let coprocessor = MockCoprocessor::shared(chain_id, params);

    let storage = FileKeyStorage::open(keystore)
        .await
        .with_context(|| format!("Failed to open keystore {}", keystore.display()))?;
    let session = HushSession::with_relayer(
        config,
        Arc::new(MockEngineFactory::new(coprocessor.clone())),
        Arc::new(storage),
    )?;

    let pb = spinner("Resolving encryption engine")?;
    let readiness = session.set_network(Some(chain_id)).await;
    pb.finish_and_clear();

    if let Some(error) = readiness.error {
        warn!(chain_id, %error, "Engine resolution failed");
        return Err(anyhow!("{error}")).context("Engine resolution failed");
    }
    info!(chain_id, keystore = %keystore.display(), "Session ready");
    Ok((session, coprocessor))
}

fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Print relayer metadata
async fn cmd_metadata(config: &SessionConfig) -> Result<()> {
    println!("{} {}", "🔍 Fetching metadata from:".cyan().bold(), config.rpc_url);

    let params = fetch_parameters(config).await?;

    println!("\n{}", "✅ Network parameters:".green().bold());
    println!("   {} {}", "ACL:".dimmed(), params.acl_address.to_checksum_string());
    println!(
        "   {} {}",
        "Input verifier:".dimmed(),
        params.input_verifier_address.to_checksum_string()
    );
    println!(
        "   {} {}",
        "KMS verifier:".dimmed(),
        params.kms_verifier_address.to_checksum_string()
    );

    Ok(())
}

/// Show or clear the client keypair
async fn cmd_keypair(config: SessionConfig, keystore: &Path, clear: bool) -> Result<()> {
    if clear {
        let storage = FileKeyStorage::open(keystore).await?;
        let store = hush_keystore::KeypairStore::with_key(Arc::new(storage), config.keypair_storage_key);
        if store.clear().await? {
            println!("{} {}", "🗑️  Keypair removed from:".yellow().bold(), keystore.display());
            println!("   Authorizations naming the old public key no longer verify.");
        } else {
            println!("{}", "No keypair stored.".yellow());
        }
        return Ok(());
    }

    let (session, _) = connect(config, keystore).await?;
    let existed = session.current_keypair().await?.is_some();
    let keypair = session.ensure_keypair().await?;

    let label = if existed { "🔑 Stored keypair:" } else { "🔑 Generated keypair:" };
    println!("{}", label.green().bold());
    println!("   {} {}", "Public key:".dimmed(), keypair.public_key.to_hex());
    println!("   {} {}", "Keystore:".dimmed(), keystore.display());

    Ok(())
}

/// Build an unsigned authorization
async fn cmd_authorize(config: SessionConfig, keystore: &Path, contract: &str) -> Result<()> {
    println!("{} {}", "📝 Authorizing decryption for:".cyan().bold(), contract);

    let (session, _) = connect(config, keystore).await?;
    let artifact = session
        .build_authorization(contract)
        .await
        .context("Failed to build authorization")?;

    println!("\n{}", "✅ Authorization built:".green().bold());
    println!("   {} {}", "Valid from:".dimmed(), format_timestamp(artifact.start_timestamp()));
    println!("   {} {}", "Expires:".dimmed(), format_timestamp(artifact.expires_at()));

    println!("\n{}", "📋 Typed message (sign with eth_signTypedData_v4):".yellow().bold());
    println!("{}", serde_json::to_string_pretty(&artifact.typed_message)?);

    Ok(())
}

/// Full round trip
async fn cmd_demo(
    config: SessionConfig,
    keystore: &Path,
    contract: &str,
    value: i64,
    private_key: Option<&str>,
) -> Result<()> {
    println!("{} {} → {}", "🔐 Submitting".cyan().bold(), value, contract);

    let wallet = match private_key {
        Some(key) => LocalWallet::from_hex(key).context("Invalid private key")?,
        None => LocalWallet::random(),
    };
    let user = wallet.address();
    println!("   {} {}", "Wallet:".dimmed(), user.to_checksum_string());

    let (session, coprocessor) = connect(config, keystore).await?;
    let contract_address = AccountAddress::from_hex(contract).context("Invalid contract address")?;

    println!("\n{}", "1. Encrypting input...".dimmed());
    let input = session.encrypt(contract, &user.to_hex(), value).await?;
    for handle in &input.handles {
        println!("   ✓ handle {}", handle.to_hex());
    }

    println!("\n{}", "2. Submitting to contract...".dimmed());
    coprocessor
        .verify_input(&input, contract_address, user)
        .context("Input proof rejected")?;
    debug!(handles = input.len(), "Input accepted by coprocessor");
    println!("   ✓ {} ciphertexts registered", coprocessor.ciphertext_count());

    println!("\n{}", "3. Building and signing authorization...".dimmed());
    let artifact = session.build_authorization(contract).await?;
    let signature = wallet.sign_typed_message(&artifact.typed_message).await?;
    println!("   ✓ valid until {}", format_timestamp(artifact.expires_at()));

    println!("\n{}", "4. Requesting decryption...".dimmed());
    let (total, count) = match input.handles.as_slice() {
        [total, count] => (total, count),
        other => bail!("expected value and increment handles, got {}", other.len()),
    };
    let result = session
        .decrypt_aggregate(
            contract,
            &user.to_hex(),
            signature,
            &total.to_hex(),
            &count.to_hex(),
            artifact.window,
        )
        .await
        .context("Decryption failed")?;

    println!("\n{}", "✅ Decrypted:".green().bold());
    println!("   {} {}", "Total:".yellow(), result.total);
    println!("   {} {}", "Count:".yellow(), result.count);
    if let Some(avg) = result.average() {
        println!("   {} {:.2}", "Average:".yellow(), avg);
    }

    Ok(())
}
