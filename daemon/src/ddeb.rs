use crate::files::UploadFile;
use crate::report::UploadIssue;
use std::collections::HashMap;
use uploadd_common::errors::*;

type DebugKey = (String, String, String);

fn format_key(key: &DebugKey) -> String {
    format!("{} {} ({})", key.0, key.1, key.2)
}

/// Match every debug package to the binary it was built from and link the
/// two in both directions. Debug packages are keyed by name, version and
/// architecture; the originating deb or udeb probes the index with its own
/// name plus the `-dbgsym` suffix.
///
/// Returns every problem found while matching: duplicated debug packages
/// and, after the pass, one error naming all debug packages that no binary
/// claimed.
pub fn match_ddebs(files: &mut [UploadFile]) -> Vec<UploadIssue> {
    let mut issues = Vec::new();
    let mut unmatched: HashMap<DebugKey, usize> = HashMap::new();

    for (idx, file) in files.iter().enumerate() {
        if let UploadFile::Ddeb(ddeb) = file {
            let key = (
                ddeb.package.clone(),
                ddeb.version.clone(),
                ddeb.architecture.clone(),
            );
            if unmatched.contains_key(&key) {
                issues.push(UploadIssue::rejection(format!(
                    "Duplicated debug packages: {}",
                    format_key(&key)
                )));
            } else {
                unmatched.insert(key, idx);
            }
        }
    }

    let mut links = Vec::new();
    for (idx, file) in files.iter().enumerate() {
        let binary = match file {
            UploadFile::Deb(binary) | UploadFile::Udeb(binary) => binary,
            _ => continue,
        };
        let key = (
            format!("{}-dbgsym", binary.package),
            binary.version.clone(),
            binary.architecture.clone(),
        );
        if let Some(ddeb_idx) = unmatched.remove(&key) {
            debug!("linking {} to debug package {}", binary.filename, files[ddeb_idx].filename());
            links.push((idx, ddeb_idx));
        }
    }

    for (binary_idx, ddeb_idx) in links {
        if let Some(binary) = files[binary_idx].as_binary_mut() {
            binary.debug_counterpart = Some(ddeb_idx);
        }
        if let Some(ddeb) = files[ddeb_idx].as_binary_mut() {
            ddeb.debug_counterpart = Some(binary_idx);
        }
    }

    if !unmatched.is_empty() {
        let mut orphans = unmatched.keys().map(format_key).collect::<Vec<_>>();
        orphans.sort();
        issues.push(UploadIssue::rejection(format!(
            "Orphaned debug packages: {}",
            orphans.join(", ")
        )));
    }

    issues
}
