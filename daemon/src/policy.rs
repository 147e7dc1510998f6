use crate::consistency::UploadFlags;
use crate::report::UploadIssue;
use std::str::FromStr;
use uploadd_common::errors::*;
use uploadd_common::{Archive, DistroSeries, Pocket};

/// Where a suite name like `crimson-security` points to.
pub fn parse_suite(suite: &str) -> (String, Pocket) {
    match suite.rsplit_once('-') {
        Some((name, tail)) => match Pocket::from_str(tail) {
            Ok(pocket) => (name.to_string(), pocket),
            Err(_) => (suite.to_string(), Pocket::Release),
        },
        None => (suite.to_string(), Pocket::Release),
    }
}

/// Component mapping applied to NEW packages that carry a component the
/// archive doesn't accept directly.
pub fn default_component_override(component: &str) -> &'static str {
    match component {
        "contrib" | "non-free" | "non-free-firmware" => "multiverse",
        _ => "universe",
    }
}

/// Everything the pipeline needs to know about where an upload is headed
/// and what the operator allows. The archive may be retargeted while the
/// upload is processed (partner components move to the partner archive).
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub series: DistroSeries,
    pub pocket: Pocket,
    pub archive: Archive,
    pub partner_archive: Option<String>,
    pub accept_sources: bool,
    pub accept_binaries: bool,
    pub auto_approve: bool,
    pub redirect_warning: Option<String>,
}

impl UploadPolicy {
    pub fn new(series: DistroSeries, archive: Archive) -> UploadPolicy {
        UploadPolicy {
            series,
            pocket: Pocket::Release,
            archive,
            partner_archive: None,
            accept_sources: true,
            accept_binaries: true,
            auto_approve: false,
            redirect_warning: None,
        }
    }

    /// Resolve the Distribution field of the changes file into a pocket of
    /// the configured series. A frozen series no longer takes uploads in
    /// its RELEASE pocket, they are redirected to PROPOSED with a warning.
    pub fn resolve_suite(&mut self, suite: &str) -> Result<()> {
        let (name, pocket) = parse_suite(suite);
        if name != self.series.name {
            bail!("Unable to find distroseries: {}", suite);
        }
        self.pocket = pocket;
        if self.series.frozen && pocket == Pocket::Release {
            self.pocket = Pocket::Proposed;
            self.redirect_warning = Some(format!(
                "Redirecting {} to {}-proposed",
                self.series.name, self.series.name
            ));
        }
        Ok(())
    }

    /// Reject upload types the operator has switched off.
    pub fn validate_upload_type(&self, flags: UploadFlags) -> Vec<UploadIssue> {
        let mut issues = Vec::new();
        if flags.sourceful && !self.accept_sources {
            issues.push(UploadIssue::rejection(
                "Sourceful uploads are not accepted by this archive.".to_string(),
            ));
        }
        if flags.binaryful && !self.accept_binaries {
            issues.push(UploadIssue::rejection(
                "Binary uploads are not accepted by this archive.".to_string(),
            ));
        }
        issues
    }

    /// Final policy checks once all overrides are known.
    pub fn check_upload(&self) -> Vec<UploadIssue> {
        let mut issues = Vec::new();
        if !self.series.frozen && matches!(self.pocket, Pocket::Updates | Pocket::Security) {
            issues.push(UploadIssue::rejection(format!(
                "Not permitted to upload to the {} pocket in a series that is not yet released.",
                self.pocket
            )));
        }
        issues
    }

    /// Whether a fully-known upload skips the human review queue.
    pub fn auto_approves(&self, needs_human_approval: bool) -> bool {
        if needs_human_approval {
            return false;
        }
        self.auto_approve || self.archive.kind.auto_accepts_unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uploadd_common::ArchiveKind;

    fn policy(frozen: bool) -> UploadPolicy {
        let mut series = DistroSeries::new(
            "crimson".to_string(),
            vec!["amd64".to_string()],
            "amd64".to_string(),
        );
        series.frozen = frozen;
        UploadPolicy::new(
            series,
            Archive::new("primary".to_string(), ArchiveKind::Primary),
        )
    }

    #[test]
    fn test_parse_suite() {
        assert_eq!(
            parse_suite("crimson-security"),
            ("crimson".to_string(), Pocket::Security)
        );
        assert_eq!(parse_suite("crimson"), ("crimson".to_string(), Pocket::Release));
        // unknown tails belong to the series name
        assert_eq!(
            parse_suite("crimson-cats"),
            ("crimson-cats".to_string(), Pocket::Release)
        );
    }

    #[test]
    fn test_resolve_suite() {
        let mut policy = policy(false);
        policy.resolve_suite("crimson-backports").unwrap();
        assert_eq!(policy.pocket, Pocket::Backports);
        assert!(policy.redirect_warning.is_none());
    }

    #[test]
    fn test_resolve_suite_unknown_series() {
        let mut policy = policy(false);
        assert!(policy.resolve_suite("emerald").is_err());
    }

    #[test]
    fn test_frozen_series_redirects_release() {
        let mut policy = policy(true);
        policy.resolve_suite("crimson").unwrap();
        assert_eq!(policy.pocket, Pocket::Proposed);
        assert!(policy.redirect_warning.is_some());
    }

    #[test]
    fn test_updates_needs_released_series() {
        let mut policy = policy(false);
        policy.resolve_suite("crimson-updates").unwrap();
        assert_eq!(policy.check_upload().len(), 1);

        let mut policy = policy_frozen_with_updates();
        assert!(policy.check_upload().is_empty());
        policy.pocket = Pocket::Security;
        assert!(policy.check_upload().is_empty());
    }

    fn policy_frozen_with_updates() -> UploadPolicy {
        let mut policy = policy(true);
        policy.resolve_suite("crimson-updates").unwrap();
        policy
    }

    #[test]
    fn test_default_component_override() {
        assert_eq!(default_component_override("contrib"), "multiverse");
        assert_eq!(default_component_override("non-free"), "multiverse");
        assert_eq!(default_component_override("main"), "universe");
    }

    #[test]
    fn test_auto_approves() {
        let mut policy = policy(false);
        assert!(!policy.auto_approves(false));
        policy.auto_approve = true;
        assert!(policy.auto_approves(false));
        assert!(!policy.auto_approves(true));

        let mut policy = self::policy(false);
        policy.archive = Archive::new("ppa".to_string(), ArchiveKind::Ppa);
        assert!(policy.auto_approves(false));
    }
}
