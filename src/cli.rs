use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON file holding one recipe or an array of recipes
    #[arg(short, long)]
    pub recipe_file: PathBuf,

    /// Log a per-recipe nutrition report (source, confidence, totals)
    #[arg(long)]
    pub report: bool,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
