use std::cmp::Ordering;

/// Compare two package versions with Debian semantics (epoch, upstream
/// version, revision).
pub fn compare(a: &str, b: &str) -> Ordering {
    deb_version::compare_versions(a, b)
}

/// An upload only counts as an upgrade if its version is strictly greater
/// than what the archive already has.
pub fn is_upgrade(proposed: &str, ancestry: &str) -> bool {
    compare(proposed, ancestry) == Ordering::Greater
}

/// Strip a leading epoch. Versions in filenames never carry one.
pub fn without_epoch(version: &str) -> &str {
    match version.split_once(':') {
        Some((epoch, rest)) if !epoch.is_empty() && epoch.bytes().all(|b| b.is_ascii_digit()) => rest,
        _ => version,
    }
}

/// Strip the Debian revision, leaving the upstream version.
pub fn without_revision(version: &str) -> &str {
    match version.rsplit_once('-') {
        Some((upstream, _)) => upstream,
        None => version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_revisions() {
        assert_eq!(compare("1.0-1", "1.0-2"), Ordering::Less);
        assert_eq!(compare("1.0-2", "1.0-1"), Ordering::Greater);
        assert_eq!(compare("1.0-1", "1.0-1"), Ordering::Equal);
    }

    #[test]
    fn test_compare_epoch_wins() {
        assert_eq!(compare("1:0.9", "1.0"), Ordering::Greater);
    }

    #[test]
    fn test_compare_tilde_sorts_low() {
        assert_eq!(compare("1.0~rc1", "1.0"), Ordering::Less);
    }

    #[test]
    fn test_compare_ubuntu_suffix() {
        assert_eq!(compare("2.10-1ubuntu1", "2.10-1"), Ordering::Greater);
    }

    #[test]
    fn test_is_upgrade_rejects_equal() {
        assert!(!is_upgrade("1.0-1", "1.0-1"));
        assert!(is_upgrade("1.0-2", "1.0-1"));
    }

    #[test]
    fn test_without_epoch() {
        assert_eq!(without_epoch("1:2.10-2"), "2.10-2");
        assert_eq!(without_epoch("2.10-2"), "2.10-2");
        // only digits before the colon form an epoch
        assert_eq!(without_epoch("a:b"), "a:b");
    }

    #[test]
    fn test_without_revision() {
        assert_eq!(without_revision("2.10-2"), "2.10");
        assert_eq!(without_revision("2.10-2ubuntu1"), "2.10");
        assert_eq!(without_revision("2.10"), "2.10");
    }
}
