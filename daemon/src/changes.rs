use crate::report::UploadIssue;
use std::fs;
use std::path::{Path, PathBuf};
use uploadd_common::errors::*;
use uploadd_common::utils;

/// One row of the Files field: checksum, size, component/section, priority
/// and the payload filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub md5: String,
    pub size: u64,
    pub component: String,
    pub section: String,
    pub priority_name: String,
    pub filename: String,
}

/// One row of the Checksums-Sha256 field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumRow {
    pub sha256: String,
    pub size: u64,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct ChangesFile {
    pub path: PathBuf,
    pub filename: String,
    pub source: String,
    pub version: String,
    pub suite: String,
    pub architectures: Vec<String>,
    pub maintainer: Option<String>,
    pub changed_by: Option<String>,
    pub urgency: Option<String>,
    pub files: Vec<FileRow>,
    pub checksums_sha256: Vec<ChecksumRow>,
    /// Identity of the signature on the changes file, established by the
    /// surrounding infrastructure before the pipeline runs.
    pub signer: Option<String>,
}

/// Split an RFC822-style control document into (field, value) pairs.
/// Continuation lines (leading whitespace) extend the previous field. A
/// cleartext signature armor is skipped if present.
fn parse_fields(content: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut in_armor_head = false;

    for line in content.lines() {
        if line == "-----BEGIN PGP SIGNED MESSAGE-----" {
            in_armor_head = true;
            continue;
        }
        if in_armor_head {
            // hash headers end at the first empty line
            if line.is_empty() {
                in_armor_head = false;
            }
            continue;
        }
        if line == "-----BEGIN PGP SIGNATURE-----" {
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = fields.last_mut() {
                if !value.is_empty() {
                    value.push('\n');
                }
                value.push_str(line.trim());
            }
            continue;
        }

        if let Some(idx) = line.find(": ") {
            let (field, value) = line.split_at(idx);
            fields.push((field.to_string(), value[2..].to_string()));
        } else if let Some(field) = line.strip_suffix(':') {
            fields.push((field.to_string(), String::new()));
        }
    }

    fields
}

fn parse_file_row(line: &str) -> Result<FileRow> {
    let parts = line.split_whitespace().collect::<Vec<_>>();
    let &[md5, size, section, priority, filename] = parts.as_slice() else {
        bail!("Invalid Files line: {:?}", line);
    };

    let size = size
        .parse::<u64>()
        .with_context(|| anyhow!("Invalid file size: {:?}", size))?;

    // the component is embedded in the section for non-main uploads
    let (component, section) = match section.split_once('/') {
        Some((component, section)) => (component.to_string(), section.to_string()),
        None => ("main".to_string(), section.to_string()),
    };

    Ok(FileRow {
        md5: md5.to_string(),
        size,
        component,
        section,
        priority_name: priority.to_string(),
        filename: filename.to_string(),
    })
}

fn parse_checksum_row(line: &str) -> Result<ChecksumRow> {
    let parts = line.split_whitespace().collect::<Vec<_>>();
    let &[sha256, size, filename] = parts.as_slice() else {
        bail!("Invalid Checksums-Sha256 line: {:?}", line);
    };

    let size = size
        .parse::<u64>()
        .with_context(|| anyhow!("Invalid file size: {:?}", size))?;

    Ok(ChecksumRow {
        sha256: sha256.to_lowercase(),
        size,
        filename: filename.to_string(),
    })
}

impl ChangesFile {
    pub fn parse(filename: &str, content: &str) -> Result<ChangesFile> {
        let fields = parse_fields(content);

        let field = |name: &str| {
            fields
                .iter()
                .find(|(f, _)| f == name)
                .map(|(_, v)| v.as_str())
        };

        let source = field("Source")
            .ok_or_else(|| format_err!("Changes file has no Source field"))?
            .to_string();
        let version = field("Version")
            .ok_or_else(|| format_err!("Changes file has no Version field"))?
            .to_string();
        let suite = field("Distribution")
            .ok_or_else(|| format_err!("Changes file has no Distribution field"))?
            .to_string();
        let architectures = field("Architecture")
            .ok_or_else(|| format_err!("Changes file has no Architecture field"))?
            .split_whitespace()
            .map(String::from)
            .collect::<Vec<_>>();

        let files = field("Files")
            .ok_or_else(|| format_err!("Changes file has no Files field"))?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_file_row)
            .collect::<Result<Vec<_>>>()?;

        let checksums_sha256 = field("Checksums-Sha256")
            .unwrap_or("")
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_checksum_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(ChangesFile {
            path: PathBuf::from(filename),
            filename: filename.to_string(),
            source,
            version,
            suite,
            architectures,
            maintainer: field("Maintainer").map(String::from),
            changed_by: field("Changed-By").map(String::from),
            urgency: field("Urgency").map(String::from),
            files,
            checksums_sha256,
            signer: None,
        })
    }

    pub fn sha256_for(&self, filename: &str) -> Option<&ChecksumRow> {
        self.checksums_sha256
            .iter()
            .find(|row| row.filename == filename)
    }

    pub fn load(path: &Path, signer: Option<String>) -> Result<ChangesFile> {
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| format_err!("Invalid changes path: {:?}", path))?
            .to_string();
        let content = fs::read_to_string(path)
            .with_context(|| anyhow!("Failed to read changes file: {:?}", path))?;
        let mut changes = ChangesFile::parse(&filename, &content)?;
        changes.path = path.to_path_buf();
        changes.signer = signer;
        Ok(changes)
    }

    /// The changes file name must be well-formed before anything derived
    /// from it can be trusted.
    pub fn check_file_name(&self) -> Vec<UploadIssue> {
        let mut issues = Vec::new();
        if !utils::is_taint_free(&self.filename) {
            issues.push(UploadIssue::rejection(format!(
                "Invalid characters in changes file name: {:?}",
                self.filename
            )));
            return issues;
        }
        if let Err(err) = utils::parse_changes_filename(&self.filename) {
            issues.push(UploadIssue::rejection(format!("{:#}", err)));
        }
        issues
    }

    pub fn check_addresses(&self) -> Vec<UploadIssue> {
        let mut issues = Vec::new();
        match &self.maintainer {
            Some(maintainer) if !maintainer.contains('@') => {
                issues.push(UploadIssue::rejection(format!(
                    "Maintainer address is not an email address: {:?}",
                    maintainer
                )));
            }
            Some(_) => (),
            None => issues.push(UploadIssue::rejection(
                "Changes file has no Maintainer field".to_string(),
            )),
        }
        if let Some(changed_by) = &self.changed_by {
            if !changed_by.contains('@') {
                issues.push(UploadIssue::rejection(format!(
                    "Changed-By address is not an email address: {:?}",
                    changed_by
                )));
            }
        }
        issues
    }

    /// The architecture the upload was built on, encoded in the changes
    /// file name. Used to resolve `all` binaries to a concrete build
    /// architecture.
    pub fn filename_archtag(&self) -> Result<String> {
        Ok(utils::parse_changes_filename(&self.filename)?.archtag)
    }
}

/// Process source uploads before binary ones so binaries can find their
/// source already in the queue.
pub fn order_changes_files(paths: &mut [PathBuf]) {
    paths.sort_by_key(|path| {
        let name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("")
            .to_string();
        (!name.contains("_source."), name)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANGES: &str = "\
Format: 1.8
Date: Thu, 21 May 2026 16:38:12 +0200
Source: hello
Binary: hello
Architecture: source
Version: 2.10-2
Distribution: crimson
Urgency: medium
Maintainer: Crimson Developers <devel@example.org>
Changed-By: Kathryn Janeway <kathryn@example.org>
Description:
 hello      - example package based on GNU hello
Changes:
 hello (2.10-2) crimson; urgency=medium
 .
   * Rebuild against new toolchain.
Files:
 d41d8cd98f00b204e9800998ecf8427e 1420 devel optional hello_2.10-2.dsc
 900150983cd24fb0d6963f7d28e17f72 40320 devel optional hello_2.10-2.debian.tar.xz
";

    #[test]
    fn test_parse_changes() {
        let changes = ChangesFile::parse("hello_2.10-2_source.changes", CHANGES).unwrap();
        assert_eq!(changes.source, "hello");
        assert_eq!(changes.version, "2.10-2");
        assert_eq!(changes.suite, "crimson");
        assert_eq!(changes.architectures, vec!["source".to_string()]);
        assert_eq!(changes.files.len(), 2);
        assert_eq!(changes.files[0].filename, "hello_2.10-2.dsc");
        assert_eq!(changes.files[0].component, "main");
        assert_eq!(changes.files[0].section, "devel");
        assert_eq!(changes.files[0].priority_name, "optional");
        assert_eq!(changes.files[0].size, 1420);
    }

    #[test]
    fn test_parse_checksums() {
        let content = format!(
            "{}Checksums-Sha256:\n 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824 1420 hello_2.10-2.dsc\n",
            CHANGES
        );
        let changes = ChangesFile::parse("hello_2.10-2_source.changes", &content).unwrap();
        let row = changes.sha256_for("hello_2.10-2.dsc").unwrap();
        assert_eq!(row.size, 1420);
        assert!(row.sha256.starts_with("2cf24dba"));
        assert!(changes.sha256_for("other.dsc").is_none());
    }

    #[test]
    fn test_parse_component_in_section() {
        let row = parse_file_row(
            "d41d8cd98f00b204e9800998ecf8427e 1420 universe/devel optional hello_2.10-2.dsc",
        )
        .unwrap();
        assert_eq!(row.component, "universe");
        assert_eq!(row.section, "devel");
    }

    #[test]
    fn test_parse_missing_field() {
        let content = "Source: hello\nVersion: 1.0\n";
        assert!(ChangesFile::parse("hello_1.0_source.changes", content).is_err());
    }

    #[test]
    fn test_parse_clearsigned() {
        let signed = format!(
            "-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA512\n\n{}-----BEGIN PGP SIGNATURE-----\nnot a real signature\n-----END PGP SIGNATURE-----\n",
            CHANGES
        );
        let changes = ChangesFile::parse("hello_2.10-2_source.changes", &signed).unwrap();
        assert_eq!(changes.source, "hello");
        assert_eq!(changes.files.len(), 2);
    }

    #[test]
    fn test_check_file_name() {
        let changes = ChangesFile::parse("hello_2.10-2_source.changes", CHANGES).unwrap();
        assert!(changes.check_file_name().is_empty());

        let mut tainted = changes.clone();
        tainted.filename = "../evil.changes".to_string();
        assert_eq!(tainted.check_file_name().len(), 1);
    }

    #[test]
    fn test_filename_archtag() {
        let changes = ChangesFile::parse("hello_2.10-2_amd64.changes", CHANGES).unwrap();
        assert_eq!(changes.filename_archtag().unwrap(), "amd64");
    }

    #[test]
    fn test_order_changes_files() {
        let mut paths = vec![
            PathBuf::from("spool/hello_2.10-2_amd64.changes"),
            PathBuf::from("spool/hello_2.10-2_source.changes"),
            PathBuf::from("spool/abc_1.0_i386.changes"),
        ];
        order_changes_files(&mut paths);
        assert_eq!(
            paths[0],
            PathBuf::from("spool/hello_2.10-2_source.changes")
        );
    }
}
