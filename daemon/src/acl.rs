use std::collections::HashMap;
use uploadd_common::config::AclConfig;
use uploadd_common::errors::*;
use uploadd_common::{DistroSeries, Pocket};

/// Decides whether the signer of a source upload may upload this package.
/// Binary uploads never reach this check, they arrive through the build
/// infrastructure.
pub trait AclPolicy {
    #[allow(clippy::too_many_arguments)]
    fn check_upload(
        &self,
        signer: &str,
        series: &DistroSeries,
        package: &str,
        component: &str,
        pocket: Pocket,
        not_new: bool,
    ) -> Option<String>;
}

/// Accepts everything. Used for dry runs and for build uploads that were
/// already authenticated upstream.
pub struct AllowAll;

impl AclPolicy for AllowAll {
    fn check_upload(
        &self,
        _signer: &str,
        _series: &DistroSeries,
        _package: &str,
        _component: &str,
        _pocket: Pocket,
        _not_new: bool,
    ) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Default)]
struct SignerGrant {
    components: Vec<String>,
    packages: Vec<String>,
}

/// Upload rights loaded from the config file: a signer is granted whole
/// components or individual source packages. Per-package grants only apply
/// to packages that already exist in the archive, so anything NEW needs a
/// component grant.
#[derive(Debug, Clone, Default)]
pub struct ConfigAcl {
    grants: HashMap<String, SignerGrant>,
}

impl ConfigAcl {
    pub fn new(config: &AclConfig) -> ConfigAcl {
        let mut grants = HashMap::new();
        for (signer, signer_config) in &config.signers {
            debug!(
                "granting {:?} components={:?} packages={:?}",
                signer, signer_config.components, signer_config.packages
            );
            grants.insert(
                signer.clone(),
                SignerGrant {
                    components: signer_config.components.clone(),
                    packages: signer_config.packages.clone(),
                },
            );
        }
        ConfigAcl { grants }
    }
}

impl AclPolicy for ConfigAcl {
    fn check_upload(
        &self,
        signer: &str,
        series: &DistroSeries,
        package: &str,
        component: &str,
        pocket: Pocket,
        not_new: bool,
    ) -> Option<String> {
        let Some(grant) = self.grants.get(signer) else {
            return Some(format!(
                "The signer of this package has no upload rights to this archive. ({:?})",
                signer
            ));
        };

        if grant.components.iter().any(|c| c == component) {
            return None;
        }

        if not_new && grant.packages.iter().any(|p| p == package) {
            return None;
        }

        Some(format!(
            "The signer of this package is lacking the upload rights for the source package {:?}, component {:?} in {}-{}.",
            package, component, series.name, pocket
        ))
    }
}
