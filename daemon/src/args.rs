use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Verbose logging
    #[arg(short, long, action(ArgAction::Count))]
    pub verbose: u8,
    /// Load and print a config
    #[arg(long)]
    pub check_config: bool,
    /// Process the spool once and exit instead of watching it
    #[arg(long)]
    pub once: bool,
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
