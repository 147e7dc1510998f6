use crate::changes::FileRow;
use crate::report::UploadIssue;
use uploadd_common::errors::*;
use uploadd_common::utils::{self, BinaryFormat, SourceFileKind};
use uploadd_common::{version, Priority};

/// Custom uploads are anything else than sources or binaries that is meant
/// to be published in the archive, usually tarballs processed according to
/// their type. The type is carried in the section name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomFormat {
    DebianInstaller,
    DistUpgrader,
    DdtpTarball,
    RosettaTranslations,
    StaticTranslations,
    MetaData,
    Uefi,
}

impl CustomFormat {
    pub fn from_section(section: &str) -> Option<CustomFormat> {
        match section {
            "raw-installer" => Some(CustomFormat::DebianInstaller),
            "raw-dist-upgrader" => Some(CustomFormat::DistUpgrader),
            "raw-ddtp-tarball" => Some(CustomFormat::DdtpTarball),
            "raw-translations" => Some(CustomFormat::RosettaTranslations),
            "raw-translations-static" => Some(CustomFormat::StaticTranslations),
            "raw-meta-data" => Some(CustomFormat::MetaData),
            "raw-uefi" => Some(CustomFormat::Uefi),
            _ => None,
        }
    }

    /// UEFI uploads are signed and must be approved by a human.
    pub fn auto_approved(self) -> bool {
        self != CustomFormat::Uefi
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub package: String,
    pub version: String,
    pub kind: SourceFileKind,
    pub component: String,
    pub section: String,
    pub size: u64,
    pub md5: String,
    pub is_new: bool,
}

#[derive(Debug, Clone)]
pub struct BinaryFile {
    pub filename: String,
    pub package: String,
    pub version: String,
    pub architecture: String,
    pub format: BinaryFormat,
    pub component: String,
    pub section: String,
    pub priority: Priority,
    pub size: u64,
    pub md5: String,
    pub is_new: bool,
    /// Index of the matched debug counterpart in the upload's file list:
    /// the ddeb for a deb/udeb, the deb/udeb for a ddeb. Established by
    /// the debug package matcher only.
    pub debug_counterpart: Option<usize>,
}

impl BinaryFile {
    pub fn is_archindep(&self) -> bool {
        self.architecture.eq_ignore_ascii_case("all")
    }
}

#[derive(Debug, Clone)]
pub struct CustomFile {
    pub filename: String,
    pub component: String,
    pub section: String,
    pub format: Option<CustomFormat>,
    pub size: u64,
    pub md5: String,
}

#[derive(Debug, Clone)]
pub enum UploadFile {
    Source(SourceFile),
    Deb(BinaryFile),
    Udeb(BinaryFile),
    Ddeb(BinaryFile),
    Custom(CustomFile),
}

impl UploadFile {
    pub fn filename(&self) -> &str {
        match self {
            UploadFile::Source(f) => &f.filename,
            UploadFile::Deb(f) | UploadFile::Udeb(f) | UploadFile::Ddeb(f) => &f.filename,
            UploadFile::Custom(f) => &f.filename,
        }
    }

    pub fn component(&self) -> &str {
        match self {
            UploadFile::Source(f) => &f.component,
            UploadFile::Deb(f) | UploadFile::Udeb(f) | UploadFile::Ddeb(f) => &f.component,
            UploadFile::Custom(f) => &f.component,
        }
    }

    pub fn is_new(&self) -> bool {
        match self {
            UploadFile::Source(f) => f.is_new,
            UploadFile::Deb(f) | UploadFile::Udeb(f) | UploadFile::Ddeb(f) => f.is_new,
            UploadFile::Custom(_) => false,
        }
    }

    pub fn as_binary(&self) -> Option<&BinaryFile> {
        match self {
            UploadFile::Deb(f) | UploadFile::Udeb(f) | UploadFile::Ddeb(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_binary_mut(&mut self) -> Option<&mut BinaryFile> {
        match self {
            UploadFile::Deb(f) | UploadFile::Udeb(f) | UploadFile::Ddeb(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_source(&self) -> Option<&SourceFile> {
        match self {
            UploadFile::Source(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_dsc(&self) -> bool {
        matches!(self, UploadFile::Source(f) if f.kind == SourceFileKind::Dsc)
    }
}

/// Turn a Files row into a typed upload file. The section decides custom
/// uploads, the filename decides everything else. Unknown priorities
/// degrade to extra with a warning, anything unclassifiable is an error
/// that aborts further processing.
pub fn classify_row(row: &FileRow, issues: &mut Vec<UploadIssue>) -> Result<UploadFile> {
    if !utils::is_taint_free(&row.filename) {
        bail!("Invalid characters in filename: {:?}", row.filename);
    }

    if row.section.starts_with("raw-") {
        return Ok(UploadFile::Custom(CustomFile {
            filename: row.filename.clone(),
            component: row.component.clone(),
            section: row.section.clone(),
            format: CustomFormat::from_section(&row.section),
            size: row.size,
            md5: row.md5.clone(),
        }));
    }

    if let Ok(parsed) = utils::parse_binary_filename(&row.filename) {
        let priority = match Priority::from_name(&row.priority_name) {
            Some(priority) => priority,
            None => {
                issues.push(UploadIssue::warning(format!(
                    "Unable to grok priority {:?}, overriding it with extra",
                    row.priority_name
                )));
                Priority::Extra
            }
        };
        let binary = BinaryFile {
            filename: row.filename.clone(),
            package: parsed.package,
            version: parsed.version,
            architecture: parsed.architecture,
            format: parsed.format,
            component: row.component.clone(),
            section: row.section.clone(),
            priority,
            size: row.size,
            md5: row.md5.clone(),
            is_new: false,
            debug_counterpart: None,
        };
        return Ok(match parsed.format {
            BinaryFormat::Deb => UploadFile::Deb(binary),
            BinaryFormat::Udeb => UploadFile::Udeb(binary),
            BinaryFormat::Ddeb => UploadFile::Ddeb(binary),
        });
    }

    let parsed = utils::parse_source_filename(&row.filename)
        .with_context(|| anyhow!("Unable to identify file {:?}", row.filename))?;
    Ok(UploadFile::Source(SourceFile {
        filename: row.filename.clone(),
        package: parsed.package,
        version: parsed.version,
        kind: parsed.kind,
        component: row.component.clone(),
        section: row.section.clone(),
        size: row.size,
        md5: row.md5.clone(),
        is_new: false,
    }))
}

/// Per-file checks against the changes file that declared the file.
pub fn verify_file(file: &UploadFile, architectures: &[String], changes_version: &str) -> Vec<UploadIssue> {
    let mut issues = Vec::new();
    match file {
        UploadFile::Source(source) => {
            if !architectures.iter().any(|a| a == "source") {
                issues.push(UploadIssue::rejection(format!(
                    "{}: changes file doesn't list 'source' in Architecture field.",
                    source.filename
                )));
            }
            let mut expected = version::without_epoch(changes_version);
            if source.kind == SourceFileKind::OrigTarball {
                expected = version::without_revision(expected);
            }
            if source.version != expected {
                issues.push(UploadIssue::rejection(format!(
                    "{}: should be {} according to changes file.",
                    source.version, expected
                )));
            }
        }
        UploadFile::Deb(binary) | UploadFile::Udeb(binary) | UploadFile::Ddeb(binary) => {
            if !architectures.iter().any(|a| a == &binary.architecture) {
                issues.push(UploadIssue::rejection(format!(
                    "{}: control file lists arch as {:?} which isn't in the changes file.",
                    binary.filename, binary.architecture
                )));
            }
        }
        UploadFile::Custom(custom) => {
            if custom.format.is_none() {
                issues.push(UploadIssue::rejection(format!(
                    "Unsupported custom section name {:?}",
                    custom.section
                )));
            }
        }
    }
    issues
}
