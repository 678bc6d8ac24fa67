use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tonsig_cell::{Address, Cell};
use tonsig_crypto::SecretKey;
use tonsig_log::LogFormat;
use tonsig_wallet::{
    load_from_chain_state, InternalMessage, MultisigWallet, Order, OutboundMessage,
    ProgramCode, WalletError,
};
use tracing::{info, warn};

mod config;

use config::WalletFile;

#[derive(Parser)]
#[command(
    name = "tonsig",
    about = "k-of-n multisig wallet toolkit",
    version,
    author
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        help = "Log level (trace, debug, info, warn, error); overrides RUST_LOG"
    )]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = Format::Text, help = "Log format")]
    log_format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Print the address derived from a wallet file")]
    Address {
        #[arg(long, value_name = "FILE", help = "Wallet file (TOML)")]
        wallet: PathBuf,
    },

    #[command(about = "Print the wallet's StateInit as base64 bag-of-cells")]
    StateInit {
        #[arg(long, value_name = "FILE", help = "Wallet file (TOML)")]
        wallet: PathBuf,

        #[arg(long, help = "Print the complete external deployment message instead")]
        deploy_message: bool,
    },

    #[command(about = "Decode a wallet's stored data")]
    Inspect {
        #[arg(value_name = "BASE64", help = "Contract data as base64 bag-of-cells")]
        data: String,

        #[arg(long, default_value_t = 0, allow_negative_numbers = true, help = "Workchain")]
        workchain: i8,

        #[arg(
            long,
            value_name = "BASE64",
            help = "Program code as base64 bag-of-cells (bundled program by default)"
        )]
        code: Option<String>,

        #[arg(long, value_name = "FILE", help = "Write the recovered wallet file here")]
        output: Option<PathBuf>,
    },

    #[command(about = "Create, sign and merge orders")]
    Order {
        #[command(subcommand)]
        command: OrderCommands,
    },

    #[command(about = "Sign an order as its submitter and print the external message")]
    Submit {
        #[arg(long, value_name = "FILE", help = "Wallet file (TOML)")]
        wallet: PathBuf,

        #[arg(long, value_name = "FILE", help = "Order file (JSON)")]
        order: PathBuf,

        #[command(flatten)]
        key: KeyArg,
    },

    #[command(about = "Display version information")]
    Version,
}

#[derive(Subcommand)]
enum OrderCommands {
    #[command(about = "Write an empty order")]
    New {
        #[arg(value_name = "FILE", help = "Order file to create")]
        order: PathBuf,
    },

    #[command(about = "Append a transfer to an order")]
    AddMessage {
        #[arg(value_name = "FILE", help = "Order file (JSON)")]
        order: PathBuf,

        #[arg(long, value_name = "ADDRESS", help = "Destination as workchain:hex")]
        to: Address,

        #[arg(long, value_name = "NANOTONS", help = "Value to send")]
        value: u128,

        #[arg(long, default_value_t = 3, help = "Send mode")]
        mode: u8,

        #[arg(long, help = "Send as non-bounceable")]
        no_bounce: bool,

        #[arg(long, value_name = "BASE64", help = "Message body as base64 bag-of-cells")]
        body: Option<String>,
    },

    #[command(about = "Add the key holder's signature to an order")]
    Sign {
        #[arg(value_name = "FILE", help = "Order file (JSON)")]
        order: PathBuf,

        #[arg(long, value_name = "FILE", help = "Wallet file (TOML)")]
        wallet: PathBuf,

        #[command(flatten)]
        key: KeyArg,
    },

    #[command(about = "Copy signatures from other copies of an order")]
    Merge {
        #[arg(value_name = "FILE", help = "Order file to merge into")]
        order: PathBuf,

        #[arg(value_name = "FROM", required = true, help = "Order files to take signatures from")]
        from: Vec<PathBuf>,
    },
}

#[derive(clap::Args)]
struct KeyArg {
    #[arg(
        long = "key",
        env = "TONSIG_SECRET_KEY",
        hide_env_values = true,
        value_name = "HEX",
        help = "Secret key: 32-byte seed or 64-byte seed||public, hex"
    )]
    hex: String,
}

impl KeyArg {
    fn secret_key(&self) -> Result<SecretKey> {
        SecretKey::from_hex(self.hex.trim()).context("invalid secret key")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref(), cli.log_format)?;

    match cli.command {
        Commands::Address { wallet } => address_command(&wallet),
        Commands::StateInit {
            wallet,
            deploy_message,
        } => state_init_command(&wallet, deploy_message),
        Commands::Inspect {
            data,
            workchain,
            code,
            output,
        } => inspect_command(&data, workchain, code.as_deref(), output.as_deref()),
        Commands::Order { command } => order_command(command),
        Commands::Submit { wallet, order, key } => submit_command(&wallet, &order, &key),
        Commands::Version => version_command(),
    }
}

fn address_command(wallet: &Path) -> Result<()> {
    let wallet = load_wallet(wallet)?;
    println!("{}", wallet.address());
    Ok(())
}

fn state_init_command(wallet: &Path, deploy_message: bool) -> Result<()> {
    let wallet = load_wallet(wallet)?;
    let cell = if deploy_message {
        wallet.deploy_external_message()?
    } else {
        wallet.state_init().to_cell()?
    };
    println!("{}", cell.to_base64());
    Ok(())
}

fn inspect_command(
    data: &str,
    workchain: i8,
    code: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let raw = Cell::from_base64(data.trim())
        .context("contract data is not a valid bag-of-cells")?
        .to_boc();
    let state = load_from_chain_state(workchain, &raw)?;
    let code = match code {
        Some(encoded) => ProgramCode::from_base64(encoded.trim())
            .context("program code is not a valid bag-of-cells")?,
        None => ProgramCode::bundled()?,
    };
    let wallet = MultisigWallet::from_config(state.config.clone(), code)?;

    let summary = serde_json::json!({
        "address": wallet.address().to_string(),
        "instance_id": state.config.instance_id,
        "quorum": state.config.quorum,
        "owners": state.config.owners.keys(),
        "stored_owner_count": state.stored_owner_count,
        "reserved": state.reserved,
        "deployed": state.deployed,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(path) = output {
        WalletFile::from_wallet(&wallet)?.save_to_file(path)?;
        info!("Wallet file written to: {}", path.display());
    }
    Ok(())
}

fn order_command(command: OrderCommands) -> Result<()> {
    match command {
        OrderCommands::New { order } => {
            if order.exists() {
                anyhow::bail!("{} already exists", order.display());
            }
            save_order(&order, &Order::new())?;
            info!("Created order: {}", order.display());
        }
        OrderCommands::AddMessage {
            order: path,
            to,
            value,
            mode,
            no_bounce,
            body,
        } => {
            let mut order = load_order(&path)?;
            let mut message = InternalMessage::new(to, value).with_bounce(!no_bounce);
            if let Some(body) = body {
                message = message.with_body(Cell::from_base64(body.trim())?);
            }
            order.add_message(OutboundMessage::new(mode, message.to_cell()?));
            if !order.signatures().is_empty() {
                warn!(
                    signatures = order.signatures().len(),
                    "existing signatures no longer cover the order's messages"
                );
            }
            save_order(&path, &order)?;
        }
        OrderCommands::Sign {
            order: path,
            wallet,
            key,
        } => {
            let wallet = load_wallet(&wallet)?;
            let key = key.secret_key()?;
            let public_key = key.public_key();
            let index = wallet
                .owner_index(&public_key)
                .ok_or_else(|| WalletError::UnknownSigner(public_key.to_hex()))?;

            let mut order = load_order(&path)?;
            order.sign(index, &key)?;
            save_order(&path, &order)?;
            info!(owner_index = index, "Signed order");
        }
        OrderCommands::Merge { order: path, from } => {
            let mut order = load_order(&path)?;
            let hash = order.messages_hash()?;
            for other_path in &from {
                let other = load_order(other_path)?;
                if other.messages_hash()? != hash {
                    anyhow::bail!(
                        "{} carries different messages than {}",
                        other_path.display(),
                        path.display()
                    );
                }
                order.union_signatures(&other);
            }
            save_order(&path, &order)?;
            info!(signatures = order.signatures().len(), "Merged order");
        }
    }
    Ok(())
}

fn submit_command(wallet: &Path, order: &Path, key: &KeyArg) -> Result<()> {
    let wallet = load_wallet(wallet)?;
    let order = load_order(order)?;
    let key = key.secret_key()?;

    let message = wallet.build_submission(&order, &key)?;

    let stale = order.stale_signatures(wallet.owners())?;
    let mut signers: BTreeSet<u8> = order
        .signatures()
        .keys()
        .filter(|index| !stale.contains(index))
        .copied()
        .collect();
    if let Some(index) = wallet.owner_index(&key.public_key()) {
        signers.insert(index);
    }
    if signers.len() < usize::from(wallet.config().quorum) {
        warn!(
            signers = signers.len(),
            quorum = wallet.config().quorum,
            "order is below quorum; the wallet will hold it as pending"
        );
    }

    println!("{}", message.to_base64());
    Ok(())
}

fn version_command() -> Result<()> {
    println!("tonsig {}", env!("CARGO_PKG_VERSION"));
    println!("build: {}", env!("CARGO_PKG_NAME"));
    Ok(())
}

// Helper functions

fn setup_logging(log_level: Option<&str>, format: Format) -> Result<()> {
    let format = match format {
        Format::Text => LogFormat::Text,
        Format::Json => LogFormat::Json,
    };
    tonsig_log::init_tracing(log_level, format).map_err(|e| anyhow::anyhow!(e))
}

fn load_wallet(path: &Path) -> Result<MultisigWallet> {
    let file = WalletFile::load_from_file(path)
        .with_context(|| format!("failed to read wallet file {}", path.display()))?;
    Ok(file.to_wallet()?)
}

fn load_order(path: &Path) -> Result<Order> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read order file {}", path.display()))?;
    let order = serde_json::from_str(&content)
        .with_context(|| format!("invalid order file {}", path.display()))?;
    Ok(order)
}

fn save_order(path: &Path, order: &Order) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(order)?)?;
    Ok(())
}
