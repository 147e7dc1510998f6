use serde::{Deserialize, Serialize};
use uploadd_common::{DistroSeries, Pocket, Priority};

/// A previously published release of a package, as far as the pipeline
/// cares about it: enough to order versions and to copy overrides from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub package: String,
    pub version: String,
    pub component: String,
    pub section: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub pocket: Pocket,
    /// None for source publications.
    #[serde(default)]
    pub architecture: Option<String>,
}

/// Read access to the published history of the target archive. The real
/// archive database stays behind this seam.
pub trait PublicationLookup {
    /// The most recent published source of this package in the pocket.
    fn latest_source(&self, package: &str, pocket: Pocket) -> Option<&Publication>;
    /// The most recent published binary of this package on the
    /// architecture in the pocket.
    fn latest_binary(&self, package: &str, architecture: &str, pocket: Pocket)
        -> Option<&Publication>;
}

/// The uploaded file targets an architecture the series doesn't have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownArchitecture(pub String);

/// Ancestry is looked up in the target pocket first, falling back to
/// RELEASE. Post-release pockets routinely diverge (SECURITY can be lower
/// than PROPOSED and so on), so the only check that works automatically is
/// against the nearest pocket in this order; anything subtler is left to
/// the human review queue.
pub fn lookup_pockets(target: Pocket) -> Vec<Pocket> {
    if target == Pocket::Release {
        vec![Pocket::Release]
    } else {
        vec![target, Pocket::Release]
    }
}

pub fn source_ancestry<'a>(
    lookup: &'a dyn PublicationLookup,
    target: Pocket,
    package: &str,
) -> Option<&'a Publication> {
    for pocket in lookup_pockets(target) {
        if let Some(publication) = lookup.latest_source(package, pocket) {
            return Some(publication);
        }
    }
    None
}

/// Find the binary ancestry for a package on an architecture.
///
/// `all` binaries resolve through the series' nominated arch-indep
/// architecture. When `try_other_archs` is set, every other architecture
/// of the series is probed before moving to the next pocket; version
/// checks must run with it unset so only same-architecture history is
/// consulted.
pub fn binary_ancestry<'a>(
    lookup: &'a dyn PublicationLookup,
    series: &DistroSeries,
    target: Pocket,
    package: &str,
    architecture: &str,
    try_other_archs: bool,
) -> Result<Option<&'a Publication>, UnknownArchitecture> {
    let archtag = series.ancestry_architecture(architecture).to_string();
    if !series.has_architecture(&archtag) {
        return Err(UnknownArchitecture(architecture.to_string()));
    }

    for pocket in lookup_pockets(target) {
        if let Some(publication) = lookup.latest_binary(package, &archtag, pocket) {
            return Ok(Some(publication));
        }

        if !try_other_archs {
            continue;
        }

        for other in series.architectures.iter().filter(|a| **a != archtag) {
            if let Some(publication) = lookup.latest_binary(package, other, pocket) {
                return Ok(Some(publication));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveState;

    fn series() -> DistroSeries {
        DistroSeries::new(
            "crimson".to_string(),
            vec!["amd64".to_string(), "i386".to_string()],
            "amd64".to_string(),
        )
    }

    fn binary(package: &str, version: &str, arch: &str, pocket: Pocket) -> Publication {
        Publication {
            package: package.to_string(),
            version: version.to_string(),
            component: "main".to_string(),
            section: "devel".to_string(),
            priority: Some(Priority::Optional),
            pocket,
            architecture: Some(arch.to_string()),
        }
    }

    fn source(package: &str, version: &str, pocket: Pocket) -> Publication {
        Publication {
            package: package.to_string(),
            version: version.to_string(),
            component: "main".to_string(),
            section: "devel".to_string(),
            priority: None,
            pocket,
            architecture: None,
        }
    }

    #[test]
    fn test_lookup_pockets() {
        assert_eq!(lookup_pockets(Pocket::Release), vec![Pocket::Release]);
        assert_eq!(
            lookup_pockets(Pocket::Security),
            vec![Pocket::Security, Pocket::Release]
        );
    }

    #[test]
    fn test_target_pocket_shadows_release() {
        // the target pocket's publication wins even when RELEASE has a
        // newer one
        let mut state = ArchiveState::empty(series());
        state.sources.push(source("hello", "2.0-1", Pocket::Release));
        state.sources.push(source("hello", "1.0-1", Pocket::Security));

        let ancestry = source_ancestry(&state, Pocket::Security, "hello").unwrap();
        assert_eq!(ancestry.version, "1.0-1");
        assert_eq!(ancestry.pocket, Pocket::Security);
    }

    #[test]
    fn test_release_fallback() {
        let mut state = ArchiveState::empty(series());
        state.sources.push(source("hello", "2.0-1", Pocket::Release));

        let ancestry = source_ancestry(&state, Pocket::Updates, "hello").unwrap();
        assert_eq!(ancestry.pocket, Pocket::Release);
    }

    #[test]
    fn test_no_ancestry() {
        let state = ArchiveState::empty(series());
        assert!(source_ancestry(&state, Pocket::Release, "hello").is_none());
    }

    #[test]
    fn test_binary_unknown_architecture() {
        let state = ArchiveState::empty(series());
        let result = binary_ancestry(&state, &series(), Pocket::Release, "hello", "sparc", true);
        assert_eq!(result, Err(UnknownArchitecture("sparc".to_string())));
    }

    #[test]
    fn test_binary_all_uses_nominated_arch() {
        let mut state = ArchiveState::empty(series());
        state
            .binaries
            .push(binary("hello-doc", "1.0-1", "amd64", Pocket::Release));

        let ancestry =
            binary_ancestry(&state, &series(), Pocket::Release, "hello-doc", "all", false)
                .unwrap()
                .unwrap();
        assert_eq!(ancestry.architecture.as_deref(), Some("amd64"));
    }

    #[test]
    fn test_binary_other_archs_flag() {
        let mut state = ArchiveState::empty(series());
        state
            .binaries
            .push(binary("hello", "1.0-1", "i386", Pocket::Release));

        // strict: nothing published on amd64
        let strict =
            binary_ancestry(&state, &series(), Pocket::Release, "hello", "amd64", false).unwrap();
        assert!(strict.is_none());

        // relaxed: the i386 publication is good enough for overrides
        let relaxed =
            binary_ancestry(&state, &series(), Pocket::Release, "hello", "amd64", true)
                .unwrap()
                .unwrap();
        assert_eq!(relaxed.architecture.as_deref(), Some("i386"));
    }
}
