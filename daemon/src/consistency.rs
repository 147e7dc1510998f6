use crate::files::UploadFile;
use crate::report::UploadIssue;
use uploadd_common::utils::SourceFileKind;
use uploadd_common::DistroSeries;

/// What kind of upload this is, derived from the declared architecture
/// tokens during the overall consistency check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadFlags {
    pub sourceful: bool,
    pub binaryful: bool,
    pub archindep: bool,
    pub archdep: bool,
}

/// Classify the upload from its declared architecture line and cross-check
/// against the files that were actually uploaded.
///
/// An upload may list `powerpc` and `all` in its architecture line and yet
/// only carry `powerpc` binaries because of a build that was split across
/// builders. The declared tokens therefore act as a screen: whenever the
/// files show a property the declaration must show it too, but not the
/// other way around.
pub fn check_overall(declared: &[String], files: &[UploadFile]) -> (UploadFlags, Vec<UploadIssue>) {
    let mut issues = Vec::new();

    let mut remaining = declared.to_vec();
    let mut think = UploadFlags::default();

    if let Some(idx) = remaining.iter().position(|a| a == "source") {
        think.sourceful = true;
        remaining.remove(idx);
    }

    think.binaryful = !remaining.is_empty();

    if let Some(idx) = remaining.iter().position(|a| a == "all") {
        think.archindep = true;
        remaining.remove(idx);
    }

    if think.binaryful && !remaining.is_empty() {
        think.archdep = true;
    }

    let mut files_sourceful = false;
    let mut files_binaryful = false;
    let mut files_archindep = false;
    let mut files_archdep = false;

    for file in files {
        match file {
            UploadFile::Custom(_) => files_binaryful = true,
            UploadFile::Deb(binary) | UploadFile::Udeb(binary) | UploadFile::Ddeb(binary) => {
                files_binaryful = true;
                files_archindep = files_archindep || binary.is_archindep();
                files_archdep = files_archdep || !binary.is_archindep();
            }
            UploadFile::Source(_) => files_sourceful = true,
        }
    }

    if files_sourceful != think.sourceful {
        issues.push(UploadIssue::rejection(format!(
            "Mismatch in sourcefulness. (arch) {} != (files) {}",
            think.sourceful, files_sourceful
        )));
    }
    if files_binaryful != think.binaryful {
        issues.push(UploadIssue::rejection(format!(
            "Mismatch in binaryfulness. (arch) {} != (files) {}",
            think.binaryful, files_binaryful
        )));
    }

    if files_archindep && !think.archindep {
        issues.push(UploadIssue::rejection(
            "One or more files uploaded with architecture 'all' but changes file does not list 'all'.".to_string(),
        ));
    }

    if files_archdep && !think.archdep {
        issues.push(UploadIssue::rejection(
            "One or more files uploaded with specific architecture but changes file does not list it.".to_string(),
        ));
    }

    (think, issues)
}

/// A sourceful upload carries exactly one .dsc. All further source checks
/// hang off that file, so zero or several of them is unprocessable.
pub fn check_sourceful(files: &[UploadFile]) -> Vec<UploadIssue> {
    let mut issues = Vec::new();

    let dsc = files
        .iter()
        .filter(|file| {
            matches!(file, UploadFile::Source(source) if source.kind == SourceFileKind::Dsc)
        })
        .count();

    if dsc > 1 {
        issues.push(UploadIssue::rejection(
            "Changes file lists more than one .dsc".to_string(),
        ));
    }
    if dsc == 0 {
        issues.push(UploadIssue::rejection(
            "Sourceful upload without a .dsc".to_string(),
        ));
    }

    issues
}

/// The declared architecture count has to fit the series. Translation-only
/// tags don't count, `source` adds one slot in mixed uploads and `all`
/// adds one more since it's not a physical architecture.
pub fn check_binaryful(
    flags: UploadFlags,
    declared: &[String],
    series: &DistroSeries,
) -> Vec<UploadIssue> {
    let mut issues = Vec::new();

    let considered = declared
        .iter()
        .filter(|a| !a.ends_with("_translations"))
        .collect::<Vec<_>>();

    let mut max = 1;
    if flags.sourceful {
        max = series.architecture_count() + 1;
    }
    if considered.iter().any(|a| *a == "all") {
        max += 1;
    }

    if considered.len() > max {
        issues.push(UploadIssue::rejection(
            "Upload has more architectures than the series supports.".to_string(),
        ));
    }

    issues
}
