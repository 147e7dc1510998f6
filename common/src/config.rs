use crate::errors::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SPOOL_DIR: &str = "/var/lib/uploadd/spool";
pub const DEFAULT_QUEUE_JOURNAL: &str = "/var/lib/uploadd/queue.journal";
pub const DEFAULT_SCAN_INTERVAL: u64 = 30;

pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<ConfigFile> {
    let mut config = ConfigFile::default();

    if let Some(c) = load_from("/etc/uploadd.conf")? {
        config.update(c);
    }

    if let Ok(path) = config_path() {
        if let Some(c) = load_from(path)? {
            config.update(c);
        }
    }

    if let Some(path) = path {
        let c = load_from(path)?
            .ok_or_else(|| format_err!("Failed to read config file"))?;
        config.update(c);
    }

    Ok(config)
}

fn config_path() -> Result<PathBuf> {
    let config_dir = dirs_next::config_dir()
        .ok_or_else(|| format_err!("Failed to find config dir"))?;
    Ok(config_dir.join("uploadd.conf"))
}

fn load_from<P: AsRef<Path>>(path: P) -> Result<Option<ConfigFile>> {
    if let Ok(buf) = fs::read_to_string(path.as_ref()) {
        debug!("loading config file {:?}", path.as_ref());
        let config = toml::from_str(&buf)
            .context("Failed to load config")?;
        Ok(Some(config))
    } else {
        Ok(None)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub acl: AclConfig,
}

impl ConfigFile {
    pub fn update(&mut self, c: ConfigFile) {
        self.queue.update(c.queue);
        self.policy.update(c.policy);
        self.archive.update(c.archive);
        self.acl.update(c.acl);
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueueConfig {
    pub spool_dir: Option<PathBuf>,
    pub journal: Option<PathBuf>,
    scan_interval: Option<u64>,
}

impl QueueConfig {
    pub fn update(&mut self, c: QueueConfig) {
        if c.spool_dir.is_some() {
            self.spool_dir = c.spool_dir;
        }
        if c.journal.is_some() {
            self.journal = c.journal;
        }
        if c.scan_interval.is_some() {
            self.scan_interval = c.scan_interval;
        }
    }

    pub fn spool_dir(&self) -> PathBuf {
        self.spool_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SPOOL_DIR))
    }

    pub fn journal(&self) -> PathBuf {
        self.journal
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_QUEUE_JOURNAL))
    }

    pub fn scan_interval(&self) -> u64 {
        self.scan_interval.unwrap_or(DEFAULT_SCAN_INTERVAL)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PolicyConfig {
    pub accept_sources: Option<bool>,
    pub accept_binaries: Option<bool>,
    pub auto_approve: Option<bool>,
}

impl PolicyConfig {
    pub fn update(&mut self, c: PolicyConfig) {
        if c.accept_sources.is_some() {
            self.accept_sources = c.accept_sources;
        }
        if c.accept_binaries.is_some() {
            self.accept_binaries = c.accept_binaries;
        }
        if c.auto_approve.is_some() {
            self.auto_approve = c.auto_approve;
        }
    }

    pub fn accept_sources(&self) -> bool {
        self.accept_sources.unwrap_or(true)
    }

    pub fn accept_binaries(&self) -> bool {
        self.accept_binaries.unwrap_or(true)
    }

    pub fn auto_approve(&self) -> bool {
        self.auto_approve.unwrap_or(false)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ArchiveConfig {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub state_file: Option<PathBuf>,
    pub partner_archive: Option<String>,
}

impl ArchiveConfig {
    pub fn update(&mut self, c: ArchiveConfig) {
        if c.name.is_some() {
            self.name = c.name;
        }
        if c.kind.is_some() {
            self.kind = c.kind;
        }
        if c.state_file.is_some() {
            self.state_file = c.state_file;
        }
        if c.partner_archive.is_some() {
            self.partner_archive = c.partner_archive;
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AclConfig {
    #[serde(default)]
    pub signers: HashMap<String, SignerConfig>,
}

impl AclConfig {
    pub fn update(&mut self, c: AclConfig) {
        for (k, v) in c.signers {
            if let Some(o) = self.signers.get_mut(&k) {
                o.update(v);
            } else {
                self.signers.insert(k, v);
            }
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SignerConfig {
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub packages: Vec<String>,
}

impl SignerConfig {
    pub fn update(&mut self, c: SignerConfig) {
        if !c.components.is_empty() {
            self.components = c.components;
        }
        if !c.packages.is_empty() {
            self.packages = c.packages;
        }
    }
}
