mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use ledger_core::{Block, ErrorKind, LedgerError};
use ledger_storage::{create_chain, open_chain};
use serde::Serialize;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger")]
#[command(about = "Single-node proof-of-work ledger")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new chain whose genesis reward goes to ADDRESS
    #[command(name = "createblockchain")]
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },
    /// Print the spendable balance of ADDRESS
    #[command(name = "getbalance")]
    GetBalance {
        #[arg(long)]
        address: String,
    },
    /// Move AMOUNT from one address to another and mine it into a block
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },
    /// Dump the chain from tip to genesis
    Print {
        /// Emit one JSON object per block
        #[arg(long)]
        json: bool,
    },
    /// Re-check proof-of-work, links and spends across the whole chain
    Verify,
}

#[derive(Serialize)]
struct BlockView {
    hash: String,
    previous_hash: Option<String>,
    nonce: u64,
    transactions: usize,
    valid_proof: bool,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            hash: hex::encode(block.hash),
            previous_hash: block.previous_hash.map(hex::encode),
            nonce: block.nonce,
            transactions: block.transactions.len(),
            valid_proof: block.has_valid_proof(),
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let data_dir = &cli.config.data_dir;
    match cli.cmd {
        Command::CreateBlockchain { address } => {
            create_chain(data_dir, &address)
                .with_context(|| format!("creating chain in {}", data_dir.display()))?;
            println!("New blockchain created!");
        }
        Command::GetBalance { address } => {
            let chain = open_chain(data_dir)?;
            println!("Balance for {address}: {}", chain.balance(&address)?);
        }
        Command::Send { from, to, amount } => {
            let mut chain = open_chain(data_dir)?;
            let tx = chain.build_transaction(&from, &to, amount)?;
            chain.append(vec![tx])?;
            println!("Successfully sent {amount}, from {from} to {to}");
        }
        Command::Print { json } => {
            let chain = open_chain(data_dir)?;
            for block in chain.iter() {
                let view = BlockView::from(&block?);
                if json {
                    println!("{}", serde_json::to_string(&view)?);
                } else {
                    println!("Hash ==> {}", view.hash);
                    println!("PreviousHash ==> {}", view.previous_hash.unwrap_or_default());
                    println!("Proof of Work ==> {}", view.valid_proof);
                    println!();
                }
            }
        }
        Command::Verify => {
            let chain = open_chain(data_dir)?;
            let blocks = chain.verify()?;
            println!("Chain OK: {blocks} blocks verified");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let label = match err.downcast_ref::<LedgerError>().map(LedgerError::kind) {
                Some(ErrorKind::Integrity) => "integrity error",
                Some(ErrorKind::Resource) => "storage error",
                _ => "error",
            };
            eprintln!("{label}: {err:#}");
            ExitCode::FAILURE
        }
    }
}
