use clap::{ArgAction, CommandFactory, Parser};
use clap_complete::Shell;
use std::io;
use std::path::PathBuf;
use uploadd_common::errors::*;

#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Verbose logging
    #[arg(short, long, global = true, action(ArgAction::Count))]
    pub verbose: u8,
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Bypass tty detection and always use colors
    #[arg(short = 'C', long, global = true)]
    pub color: bool,
    #[command(subcommand)]
    pub subcommand: SubCommand,
}

#[derive(Debug, Parser)]
pub enum SubCommand {
    /// Dry-run a changes file against an archive state and print the
    /// verdict
    Check(Check),
    /// Show how the files of a changes file are classified
    Inspect(Inspect),
    /// Generate shell completions
    Completions(Completions),
}

#[derive(Debug, Parser)]
pub struct Check {
    /// The .changes file to check
    pub changes: PathBuf,
    /// Archive state file to resolve ancestry from
    #[arg(long)]
    pub state: PathBuf,
    /// Treat the upload as signed by this identity and check it against
    /// the configured upload rights
    #[arg(long)]
    pub signer: Option<String>,
    /// Kind of the target archive
    #[arg(long, default_value = "primary")]
    pub archive_kind: String,
    /// Name of the partner archive, if the distribution has one
    #[arg(long)]
    pub partner_archive: Option<String>,
    /// Print the resulting queue entries as json
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct Inspect {
    /// The .changes file to inspect
    pub changes: PathBuf,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct Completions {
    pub shell: Shell,
}

pub fn gen_completions(args: &Completions) -> Result<()> {
    clap_complete::generate(
        args.shell,
        &mut Args::command(),
        "uploadctl",
        &mut io::stdout(),
    );
    Ok(())
}
