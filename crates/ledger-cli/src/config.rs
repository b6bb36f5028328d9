use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "./tmp/blocks";

/// Runtime settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Directory of the sled store holding the chain
    #[arg(long, global = true, env = "LEDGER_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,
}
