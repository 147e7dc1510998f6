use crate::errors::*;
use strum_macros::{AsRefStr, Display, EnumString};

/// Filenames are used to build shell-free paths and log lines, so only a
/// conservative character set is allowed through.
pub fn is_taint_free(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.starts_with('-')
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '~' | '-'))
}

pub fn valid_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => (),
        _ => return false,
    }
    name.len() >= 2
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '+' | '-'))
}

pub fn valid_version(version: &str) -> bool {
    !version.is_empty()
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | '~' | ':'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryFormat {
    Deb,
    Udeb,
    Ddeb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFileKind {
    Dsc,
    Diff,
    OrigTarball,
    DebianTarball,
    NativeTarball,
}

fn is_tarball_with_marker(filename: &str, marker: &str) -> Option<usize> {
    let idx = filename.rfind(marker)?;
    let rest = &filename[idx + marker.len()..];
    if matches!(rest, "" | ".gz" | ".bz2" | ".xz" | ".lzma") {
        Some(idx)
    } else {
        None
    }
}

pub fn source_file_kind(filename: &str) -> Option<SourceFileKind> {
    if filename.ends_with(".dsc") {
        Some(SourceFileKind::Dsc)
    } else if filename.ends_with(".diff.gz") {
        Some(SourceFileKind::Diff)
    } else if is_tarball_with_marker(filename, ".orig.tar").is_some() {
        Some(SourceFileKind::OrigTarball)
    } else if is_tarball_with_marker(filename, ".debian.tar").is_some() {
        Some(SourceFileKind::DebianTarball)
    } else if is_tarball_with_marker(filename, ".tar").is_some() {
        Some(SourceFileKind::NativeTarball)
    } else {
        None
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParsedSourceName {
    pub package: String,
    pub version: String,
    pub kind: SourceFileKind,
}

pub fn parse_source_filename(filename: &str) -> Result<ParsedSourceName> {
    let kind = source_file_kind(filename)
        .ok_or_else(|| format_err!("Not a source package file: {:?}", filename))?;

    let stem = match kind {
        SourceFileKind::Dsc => &filename[..filename.len() - ".dsc".len()],
        SourceFileKind::Diff => &filename[..filename.len() - ".diff.gz".len()],
        SourceFileKind::OrigTarball => {
            let idx = is_tarball_with_marker(filename, ".orig.tar").unwrap();
            &filename[..idx]
        }
        SourceFileKind::DebianTarball => {
            let idx = is_tarball_with_marker(filename, ".debian.tar").unwrap();
            &filename[..idx]
        }
        SourceFileKind::NativeTarball => {
            let idx = is_tarball_with_marker(filename, ".tar").unwrap();
            &filename[..idx]
        }
    };

    let (package, version) = stem
        .split_once('_')
        .ok_or_else(|| format_err!("Source filename has no version: {:?}", filename))?;

    if !valid_package_name(package) {
        bail!("Invalid package name: {:?}", package);
    }
    if !valid_version(version) {
        bail!("Invalid version: {:?}", version);
    }

    Ok(ParsedSourceName {
        package: package.to_string(),
        version: version.to_string(),
        kind,
    })
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParsedBinaryName {
    pub package: String,
    pub version: String,
    pub architecture: String,
    pub format: BinaryFormat,
}

pub fn parse_binary_filename(filename: &str) -> Result<ParsedBinaryName> {
    let (stem, format) = if let Some(stem) = filename.strip_suffix(".ddeb") {
        (stem, BinaryFormat::Ddeb)
    } else if let Some(stem) = filename.strip_suffix(".udeb") {
        (stem, BinaryFormat::Udeb)
    } else if let Some(stem) = filename.strip_suffix(".deb") {
        (stem, BinaryFormat::Deb)
    } else {
        bail!("Not a binary package file: {:?}", filename);
    };

    let parts = stem.split('_').collect::<Vec<_>>();
    let &[package, version, architecture] = parts.as_slice() else {
        bail!("Binary filename is not name_version_arch: {:?}", filename);
    };

    if !valid_package_name(package) {
        bail!("Invalid package name: {:?}", package);
    }
    if !valid_version(version) {
        bail!("Invalid version: {:?}", version);
    }

    Ok(ParsedBinaryName {
        package: package.to_string(),
        version: version.to_string(),
        architecture: architecture.to_string(),
        format,
    })
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParsedChangesName {
    pub package: String,
    pub version: String,
    /// The architecture the changes file was generated on, e.g. `source`
    /// or `amd64`. Arch-indep binaries resolve their build architecture
    /// through this tag.
    pub archtag: String,
}

pub fn parse_changes_filename(filename: &str) -> Result<ParsedChangesName> {
    let stem = filename
        .strip_suffix(".changes")
        .ok_or_else(|| format_err!("Not a changes file: {:?}", filename))?;

    let parts = stem.split('_').collect::<Vec<_>>();
    let &[package, version, archtag] = parts.as_slice() else {
        bail!("Changes filename is not name_version_arch: {:?}", filename);
    };

    if !valid_package_name(package) {
        bail!("Invalid package name: {:?}", package);
    }
    if !valid_version(version) {
        bail!("Invalid version: {:?}", version);
    }

    Ok(ParsedChangesName {
        package: package.to_string(),
        version: version.to_string(),
        archtag: archtag.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taint_free() {
        assert!(is_taint_free("hello_2.10-2_amd64.deb"));
        assert!(!is_taint_free("../../etc/passwd"));
        assert!(!is_taint_free("hello world.deb"));
        assert!(!is_taint_free(".hidden"));
        assert!(!is_taint_free(""));
    }

    #[test]
    fn test_valid_package_name() {
        assert!(valid_package_name("hello"));
        assert!(valid_package_name("libfoo2.0+really1"));
        assert!(!valid_package_name("Hello"));
        assert!(!valid_package_name("x"));
        assert!(!valid_package_name("-hello"));
    }

    #[test]
    fn test_source_file_kind() {
        assert_eq!(source_file_kind("hello_2.10-2.dsc"), Some(SourceFileKind::Dsc));
        assert_eq!(source_file_kind("hello_2.10-2.diff.gz"), Some(SourceFileKind::Diff));
        assert_eq!(
            source_file_kind("hello_2.10.orig.tar.gz"),
            Some(SourceFileKind::OrigTarball)
        );
        assert_eq!(
            source_file_kind("hello_2.10-2.debian.tar.xz"),
            Some(SourceFileKind::DebianTarball)
        );
        assert_eq!(
            source_file_kind("hello_2.10.tar.gz"),
            Some(SourceFileKind::NativeTarball)
        );
        assert_eq!(source_file_kind("hello_2.10-2_amd64.deb"), None);
    }

    #[test]
    fn test_parse_source_filename() {
        let parsed = parse_source_filename("hello_2.10-2.dsc").unwrap();
        assert_eq!(
            parsed,
            ParsedSourceName {
                package: "hello".to_string(),
                version: "2.10-2".to_string(),
                kind: SourceFileKind::Dsc,
            }
        );
    }

    #[test]
    fn test_parse_source_filename_orig() {
        let parsed = parse_source_filename("hello_2.10.orig.tar.gz").unwrap();
        assert_eq!(parsed.package, "hello");
        assert_eq!(parsed.version, "2.10");
        assert_eq!(parsed.kind, SourceFileKind::OrigTarball);
    }

    #[test]
    fn test_parse_binary_filename() {
        let parsed = parse_binary_filename("hello_2.10-2_amd64.deb").unwrap();
        assert_eq!(
            parsed,
            ParsedBinaryName {
                package: "hello".to_string(),
                version: "2.10-2".to_string(),
                architecture: "amd64".to_string(),
                format: BinaryFormat::Deb,
            }
        );
    }

    #[test]
    fn test_parse_binary_filename_ddeb() {
        let parsed = parse_binary_filename("hello-dbgsym_2.10-2_amd64.ddeb").unwrap();
        assert_eq!(parsed.package, "hello-dbgsym");
        assert_eq!(parsed.format, BinaryFormat::Ddeb);
    }

    #[test]
    fn test_parse_binary_filename_invalid() {
        assert!(parse_binary_filename("hello_2.10-2.deb").is_err());
        assert!(parse_binary_filename("hello.tar.gz").is_err());
    }

    #[test]
    fn test_parse_changes_filename() {
        let parsed = parse_changes_filename("hello_2.10-2_source.changes").unwrap();
        assert_eq!(parsed.package, "hello");
        assert_eq!(parsed.version, "2.10-2");
        assert_eq!(parsed.archtag, "source");
    }

    #[test]
    fn test_parse_changes_filename_invalid() {
        assert!(parse_changes_filename("hello_2.10-2.dsc").is_err());
        assert!(parse_changes_filename("hello.changes").is_err());
    }
}
