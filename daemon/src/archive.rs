use crate::ancestry::{Publication, PublicationLookup};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use uploadd_common::errors::*;
use uploadd_common::{version, DistroSeries, Pocket};

/// A snapshot of what the target archive has published, loaded from the
/// archive-state file the publisher exports. Stands in for the archive
/// database on the read side.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveState {
    pub series: DistroSeries,
    #[serde(default, rename = "source")]
    pub sources: Vec<Publication>,
    #[serde(default, rename = "binary")]
    pub binaries: Vec<Publication>,
}

impl ArchiveState {
    pub fn empty(series: DistroSeries) -> ArchiveState {
        ArchiveState {
            series,
            sources: Vec::new(),
            binaries: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<ArchiveState> {
        let buf = fs::read_to_string(path)
            .with_context(|| anyhow!("Failed to read archive state: {:?}", path))?;
        let state = toml::from_str::<ArchiveState>(&buf)
            .with_context(|| anyhow!("Failed to parse archive state: {:?}", path))?;
        debug!(
            "loaded archive state for {:?}: {} sources, {} binaries",
            state.series.name,
            state.sources.len(),
            state.binaries.len()
        );
        Ok(state)
    }
}

impl PublicationLookup for ArchiveState {
    fn latest_source(&self, package: &str, pocket: Pocket) -> Option<&Publication> {
        self.sources
            .iter()
            .filter(|p| p.package == package && p.pocket == pocket)
            .max_by(|a, b| version::compare(&a.version, &b.version))
    }

    fn latest_binary(
        &self,
        package: &str,
        architecture: &str,
        pocket: Pocket,
    ) -> Option<&Publication> {
        self.binaries
            .iter()
            .filter(|p| {
                p.package == package
                    && p.pocket == pocket
                    && p.architecture.as_deref() == Some(architecture)
            })
            .max_by(|a, b| version::compare(&a.version, &b.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_state() {
        let state = toml::from_str::<ArchiveState>(
            r#"
            [series]
            name = "crimson"
            architectures = ["amd64", "i386"]
            nominated_arch_indep = "amd64"

            [[source]]
            package = "hello"
            version = "2.10-1"
            component = "main"
            section = "devel"
            pocket = "release"

            [[binary]]
            package = "hello"
            version = "2.10-1"
            component = "main"
            section = "devel"
            priority = "optional"
            pocket = "release"
            architecture = "amd64"
            "#,
        )
        .unwrap();
        assert_eq!(state.series.name, "crimson");
        assert_eq!(state.sources.len(), 1);
        assert_eq!(state.binaries.len(), 1);
        assert_eq!(state.binaries[0].architecture.as_deref(), Some("amd64"));
    }

    #[test]
    fn test_latest_source_picks_highest_version() {
        let series = DistroSeries::new(
            "crimson".to_string(),
            vec!["amd64".to_string()],
            "amd64".to_string(),
        );
        let mut state = ArchiveState::empty(series);
        for v in ["1.0-1", "1.2-1", "1.1-1"] {
            state.sources.push(Publication {
                package: "hello".to_string(),
                version: v.to_string(),
                component: "main".to_string(),
                section: "devel".to_string(),
                priority: None,
                pocket: Pocket::Release,
                architecture: None,
            });
        }
        let latest = state.latest_source("hello", Pocket::Release).unwrap();
        assert_eq!(latest.version, "1.2-1");
        assert!(state.latest_source("hello", Pocket::Updates).is_none());
        assert!(state.latest_source("world", Pocket::Release).is_none());
    }
}
