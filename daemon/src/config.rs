use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uploadd_common::config::{self, AclConfig};
use uploadd_common::errors::*;
use uploadd_common::{Archive, ArchiveKind};

pub const DEFAULT_STATE_FILE: &str = "/var/lib/uploadd/archive-state.toml";

/// Runtime configuration of the daemon, resolved from the layered config
/// files plus environment overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub spool_dir: PathBuf,
    pub journal: PathBuf,
    pub scan_interval: u64,
    pub state_file: PathBuf,
    pub archive: Archive,
    pub partner_archive: Option<String>,
    pub accept_sources: bool,
    pub accept_binaries: bool,
    pub auto_approve: bool,
    pub acl: AclConfig,
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    let config = config::load(path)?;

    let spool_dir = if let Ok(dir) = env::var("UPLOADD_SPOOL_DIR") {
        PathBuf::from(dir)
    } else {
        config.queue.spool_dir()
    };

    let archive_kind = match &config.archive.kind {
        Some(kind) => ArchiveKind::from_str(kind)
            .map_err(|_| format_err!("Unknown archive kind: {:?}", kind))?,
        None => ArchiveKind::Primary,
    };
    let archive = Archive::new(
        config
            .archive
            .name
            .clone()
            .unwrap_or_else(|| "primary".to_string()),
        archive_kind,
    );

    let state_file = config
        .archive
        .state_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));

    Ok(Config {
        spool_dir,
        journal: config.queue.journal(),
        scan_interval: config.queue.scan_interval(),
        state_file,
        archive,
        partner_archive: config.archive.partner_archive.clone(),
        accept_sources: config.policy.accept_sources(),
        accept_binaries: config.policy.accept_binaries(),
        auto_approve: config.policy.auto_approve(),
        acl: config.acl,
    })
}
