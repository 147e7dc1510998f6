use crate::errors::*;
use colored::*;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};

pub mod config;
pub mod errors;
pub mod utils;
pub mod version;

/// Component reserved for the partner archive. Uploads using it follow
/// special routing rules and must not mix with other components.
pub const PARTNER_COMPONENT: &str = "partner";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Pocket {
    Release,
    Security,
    Updates,
    Proposed,
    Backports,
}

impl Default for Pocket {
    fn default() -> Pocket {
        Pocket::Release
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveKind {
    Primary,
    Partner,
    Ppa,
    Copy,
}

impl ArchiveKind {
    /// PPA and copy-archive uploads skip the NEW queue, files are taken
    /// as-is without override lookups.
    pub fn auto_accepts_unknown(self) -> bool {
        matches!(self, ArchiveKind::Ppa | ArchiveKind::Copy)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    pub name: String,
    pub kind: ArchiveKind,
}

impl Archive {
    pub fn new(name: String, kind: ArchiveKind) -> Archive {
        Archive { name, kind }
    }

    pub fn is_ppa(&self) -> bool {
        self.kind == ArchiveKind::Ppa
    }

    pub fn is_copy(&self) -> bool {
        self.kind == ArchiveKind::Copy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Required,
    Important,
    Standard,
    Optional,
    Extra,
}

impl Priority {
    /// Parse a priority from the changes file. Some distros still ship
    /// packages with a priority of `-`, those are treated as extra.
    pub fn from_name(name: &str) -> Option<Priority> {
        match name {
            "required" => Some(Priority::Required),
            "important" => Some(Priority::Important),
            "standard" => Some(Priority::Standard),
            "optional" => Some(Priority::Optional),
            "extra" => Some(Priority::Extra),
            "-" => Some(Priority::Extra),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistroSeries {
    pub name: String,
    pub architectures: Vec<String>,
    pub nominated_arch_indep: String,
    #[serde(default)]
    pub frozen: bool,
}

impl DistroSeries {
    pub fn new(name: String, architectures: Vec<String>, nominated_arch_indep: String) -> DistroSeries {
        DistroSeries {
            name,
            architectures,
            nominated_arch_indep,
            frozen: false,
        }
    }

    pub fn architecture_count(&self) -> usize {
        self.architectures.len()
    }

    pub fn has_architecture(&self, tag: &str) -> bool {
        self.architectures.iter().any(|a| a == tag)
    }

    /// Map an architecture tag to the one ancestry is looked up in.
    /// `all` packages are published through the nominated arch-indep
    /// architecture.
    pub fn ancestry_architecture<'a>(&'a self, tag: &'a str) -> &'a str {
        if tag == "all" {
            &self.nominated_arch_indep
        } else {
            tag
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "ACCEPTED")]
    Accepted,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "FAILED")]
    Failed,
}

impl UploadStatus {
    pub fn fancy(&self) -> String {
        match self {
            UploadStatus::Accepted => "ACCEPTED".green().to_string(),
            UploadStatus::Rejected => "REJECTED".red().to_string(),
            UploadStatus::Failed => "FAILED  ".yellow().to_string(),
        }
    }

    /// Merge the results of several changes files processed from the same
    /// upload directory. The worst result decides where the upload goes.
    pub fn merge(self, other: UploadStatus) -> UploadStatus {
        match (self, other) {
            (UploadStatus::Failed, _) | (_, UploadStatus::Failed) => UploadStatus::Failed,
            (UploadStatus::Rejected, _) | (_, UploadStatus::Rejected) => UploadStatus::Rejected,
            _ => UploadStatus::Accepted,
        }
    }
}

impl Deref for UploadStatus {
    type Target = str;

    fn deref(&self) -> &'static str {
        match self {
            UploadStatus::Accepted => "ACCEPTED",
            UploadStatus::Rejected => "REJECTED",
            UploadStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for UploadStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<UploadStatus> {
        match s {
            "ACCEPTED" => Ok(UploadStatus::Accepted),
            "REJECTED" => Ok(UploadStatus::Rejected),
            "FAILED" => Ok(UploadStatus::Failed),
            _ => bail!("Unknown upload status: {:?}", s),
        }
    }
}
