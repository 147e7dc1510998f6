use crate::acl::AclPolicy;
use crate::ancestry::{self, PublicationLookup, UnknownArchitecture};
use crate::changes::ChangesFile;
use crate::consistency::{self, UploadFlags};
use crate::ddeb;
use crate::files::{self, UploadFile};
use crate::policy::{self, UploadPolicy};
use crate::queue::{NewQueueEntry, Notifier, QueueSink};
use crate::report::{EarlyReturn, IssueLog, UploadIssue};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use uploadd_common::errors::*;
use uploadd_common::utils::SourceFileKind;
use uploadd_common::{version, Archive, ArchiveKind, UploadStatus, PARTNER_COMPONENT};

/// The steps an upload moves through, strictly in order. Before
/// `ConsistencyChecked` a broken upload bails out early, after that all
/// problems are collected so the uploader gets one complete report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Initialized,
    FileNameChecked,
    AddressesProcessed,
    FilesProcessed,
    ConsistencyChecked,
    OverridesApplied,
    AclChecked,
    PolicyChecked,
    Accepted,
    Rejected,
}

/// The collaborators an upload is checked against. Injected by the caller,
/// the pipeline performs no lookups of its own.
pub struct PipelineContext<'a> {
    pub policy: UploadPolicy,
    pub publications: &'a dyn PublicationLookup,
    pub acl: &'a dyn AclPolicy,
    /// Check the payload files next to the changes file against their
    /// declared sizes and checksums. Off for dry runs on a bare changes
    /// file.
    pub verify_payloads: bool,
}

/// An upload in the process of coming into being: parsed but not yet
/// decided on. Drives the upload through every check, collecting all
/// rejections and warnings, and finally turns it into a queue entry or a
/// rejection report.
pub struct NascentUpload {
    pub changes: ChangesFile,
    pub files: Vec<UploadFile>,
    pub flags: UploadFlags,
    pub issues: IssueLog,
    state: PipelineState,
    queue_id: Option<usize>,
}

impl NascentUpload {
    pub fn new(changes: ChangesFile) -> NascentUpload {
        NascentUpload {
            changes,
            files: Vec::new(),
            flags: UploadFlags::default(),
            issues: IssueLog::new(),
            state: PipelineState::Initialized,
            queue_id: None,
        }
    }

    pub fn from_changes_path(path: &Path, signer: Option<String>) -> Result<NascentUpload> {
        Ok(NascentUpload::new(ChangesFile::load(path, signer)?))
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// True if any portion of the upload is NEW to the archive.
    pub fn is_new(&self) -> bool {
        self.files.iter().any(|file| file.is_new())
    }

    pub fn components(&self) -> BTreeSet<String> {
        self.files
            .iter()
            .map(|file| file.component().to_string())
            .collect()
    }

    pub fn is_partner(&self) -> bool {
        self.components().contains(PARTNER_COMPONENT)
    }

    pub fn verdict(&self) -> UploadStatus {
        if self.issues.is_rejected() {
            UploadStatus::Rejected
        } else {
            UploadStatus::Accepted
        }
    }

    /// Run every check against the upload. Never fails: anything that goes
    /// wrong ends up in the issue log and in the verdict.
    pub fn process(&mut self, ctx: &mut PipelineContext) -> UploadStatus {
        debug!("Beginning processing of {}", self.changes.filename);
        match self.run_pipeline(ctx) {
            Ok(()) => debug!("Finished checking upload."),
            Err(EarlyReturn) => {
                debug!("An error occurred that prevented further processing.")
            }
        }
        if self.issues.is_rejected() {
            self.state = PipelineState::Rejected;
        }
        self.verdict()
    }

    fn run_pipeline(&mut self, ctx: &mut PipelineContext) -> std::result::Result<(), EarlyReturn> {
        // the target series and pocket gate everything else
        if let Err(err) = ctx.policy.resolve_suite(&self.changes.suite) {
            self.issues.reject(format!("{:#}", err));
            return Err(EarlyReturn);
        }
        if let Some(warning) = ctx.policy.redirect_warning.clone() {
            self.issues.warn(warning);
        }

        self.issues.absorb(self.changes.check_file_name());
        self.issues.checkpoint()?;
        self.state = PipelineState::FileNameChecked;

        self.issues.absorb(self.changes.check_addresses());
        self.issues.checkpoint()?;
        self.state = PipelineState::AddressesProcessed;

        self.process_files();
        self.issues.checkpoint()?;
        self.state = PipelineState::FilesProcessed;

        if ctx.verify_payloads {
            self.verify_payloads();
        }

        self.check_consistency(ctx);
        self.state = PipelineState::ConsistencyChecked;

        self.apply_overrides(ctx);
        self.override_archive(ctx);
        self.state = PipelineState::OverridesApplied;

        self.verify_acl(ctx);
        self.state = PipelineState::AclChecked;

        self.issues.absorb(ctx.policy.check_upload());
        self.state = PipelineState::PolicyChecked;

        Ok(())
    }

    fn process_files(&mut self) {
        let mut issues = Vec::new();
        for row in &self.changes.files {
            match files::classify_row(row, &mut issues) {
                Ok(file) => self.files.push(file),
                Err(err) => issues.push(UploadIssue::rejection(format!("{:#}", err))),
            }
        }
        self.issues.absorb(issues);
    }

    /// Check the payload files on disk against the sizes and checksums the
    /// changes file declares for them.
    fn verify_payloads(&mut self) {
        let dir = self.changes.path.parent().unwrap_or_else(|| Path::new("."));
        let mut issues = Vec::new();

        for row in &self.changes.files {
            let path = dir.join(&row.filename);
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(_) => {
                    issues.push(UploadIssue::rejection(format!(
                        "Unable to read {} from the upload",
                        row.filename
                    )));
                    continue;
                }
            };

            if metadata.len() != row.size {
                issues.push(UploadIssue::rejection(format!(
                    "File size mismatch for {}: listed {}, actual {}",
                    row.filename,
                    row.size,
                    metadata.len()
                )));
                continue;
            }

            if let Some(checksum) = self.changes.sha256_for(&row.filename) {
                match fs::read(&path) {
                    Ok(buf) => {
                        let digest = Sha256::digest(&buf);
                        let actual = digest
                            .iter()
                            .map(|b| format!("{:02x}", b))
                            .collect::<String>();
                        if actual != checksum.sha256 {
                            issues.push(UploadIssue::rejection(format!(
                                "File {} mentioned in the changes has a checksum mismatch. {} != {}",
                                row.filename, actual, checksum.sha256
                            )));
                        }
                    }
                    Err(_) => {
                        issues.push(UploadIssue::rejection(format!(
                            "Unable to read {} from the upload",
                            row.filename
                        )));
                    }
                }
            }
        }

        self.issues.absorb(issues);
    }

    fn check_consistency(&mut self, ctx: &PipelineContext) {
        let (flags, issues) = consistency::check_overall(&self.changes.architectures, &self.files);
        self.flags = flags;
        self.issues.absorb(issues);

        if self.flags.sourceful {
            self.issues.absorb(consistency::check_sourceful(&self.files));
        }
        if self.flags.binaryful {
            self.issues.absorb(consistency::check_binaryful(
                self.flags,
                &self.changes.architectures,
                &ctx.policy.series,
            ));
            let issues = ddeb::match_ddebs(&mut self.files);
            self.issues.absorb(issues);
        }

        debug!("Verifying files in upload.");
        let mut issues = Vec::new();
        for file in &self.files {
            issues.extend(files::verify_file(
                file,
                &self.changes.architectures,
                &self.changes.version,
            ));
        }
        self.issues.absorb(issues);

        self.issues.absorb(ctx.policy.validate_upload_type(self.flags));
    }

    //
    // Version and override handling
    //

    fn check_version(&mut self, filename: &str, proposed: &str, archive_version: &str) {
        if !version::is_upgrade(proposed, archive_version) {
            self.issues.reject(format!(
                "{}: Version older than that in the archive. {} <= {}",
                filename, proposed, archive_version
            ));
        }
    }

    /// Look up ancestry for every source and binary in the upload and copy
    /// its overrides. Anything without ancestry is tagged NEW and gets the
    /// default overrides instead.
    fn apply_overrides(&mut self, ctx: &PipelineContext) {
        debug!("Finding and applying overrides.");
        for idx in 0..self.files.len() {
            if self.files[idx].is_dsc() {
                self.apply_source_overrides(idx, ctx);
            } else if self.files[idx].as_binary().is_some() {
                self.apply_binary_overrides(idx, ctx);
            }
        }
        self.override_ddebs();
    }

    fn apply_source_overrides(&mut self, idx: usize, ctx: &PipelineContext) {
        let (package, upload_version, filename) = {
            let Some(source) = self.files[idx].as_source() else {
                return;
            };
            (
                source.package.clone(),
                source.version.clone(),
                source.filename.clone(),
            )
        };

        debug!("Checking for {}/{} source ancestry", package, upload_version);
        let ancestry =
            ancestry::source_ancestry(ctx.publications, ctx.policy.pocket, &package).cloned();

        if let Some(ancestry) = ancestry {
            debug!("{} (source) exists in {}", package, ancestry.pocket);
            self.check_version(&filename, &upload_version, &ancestry.version);
            let apply = !ctx.policy.archive.is_ppa();
            if let UploadFile::Source(source) = &mut self.files[idx] {
                if apply {
                    source.component = ancestry.component;
                    source.section = ancestry.section;
                }
                source.is_new = false;
            }
        } else {
            debug!("{}: (source) NEW", package);
            self.apply_unknown_overrides(idx, ctx, None);
        }
    }

    fn apply_binary_overrides(&mut self, idx: usize, ctx: &PipelineContext) {
        let (package, upload_version, filename, architecture, ancestry_name) = {
            let Some(binary) = self.files[idx].as_binary() else {
                return;
            };
            // a ddeb shares ancestry with the deb it was split from; if it
            // is unmatched, rejection is already guaranteed
            let ancestry_name = if matches!(self.files[idx], UploadFile::Ddeb(_)) {
                binary
                    .debug_counterpart
                    .and_then(|i| self.files[i].as_binary())
                    .map(|deb| deb.package.clone())
                    .unwrap_or_else(|| binary.package.clone())
            } else {
                binary.package.clone()
            };
            (
                binary.package.clone(),
                binary.version.clone(),
                binary.filename.clone(),
                binary.architecture.clone(),
                ancestry_name,
            )
        };

        debug!(
            "Checking for {}/{}/{} binary ancestry",
            package, upload_version, architecture
        );
        let found = ancestry::binary_ancestry(
            ctx.publications,
            &ctx.policy.series,
            ctx.policy.pocket,
            &ancestry_name,
            &architecture,
            true,
        );

        match found {
            Err(UnknownArchitecture(arch)) => {
                self.issues
                    .reject(format!("{}: Unable to find arch: {}", package, arch));
            }
            Ok(Some(ancestry)) => {
                let ancestry = ancestry.clone();
                debug!(
                    "{} (binary) exists in {}/{}",
                    package,
                    ancestry.architecture.as_deref().unwrap_or("all"),
                    ancestry.pocket
                );
                let apply = !ctx.policy.archive.is_ppa();
                if let Some(binary) = self.files[idx].as_binary_mut() {
                    if apply {
                        binary.component = ancestry.component;
                        binary.section = ancestry.section;
                        if let Some(priority) = ancestry.priority {
                            binary.priority = priority;
                        }
                    }
                    binary.is_new = false;
                }

                // version ordering only holds within one architecture; if
                // this architecture has no history the binary is NEW there
                // and any version is fine. Copy archives skip the check,
                // their ancestry comes from a primary that may have moved.
                let same_arch = ancestry::binary_ancestry(
                    ctx.publications,
                    &ctx.policy.series,
                    ctx.policy.pocket,
                    &ancestry_name,
                    &architecture,
                    false,
                )
                .ok()
                .flatten()
                .cloned();
                if let Some(same_arch) = same_arch {
                    if !ctx.policy.archive.is_copy() {
                        self.check_version(&filename, &upload_version, &same_arch.version);
                    }
                }
            }
            Ok(None) => {
                debug!("{}: (binary) NEW", package);
                // a brand-new binary of a known source keeps the source's
                // component
                let source_component = ancestry::source_ancestry(
                    ctx.publications,
                    ctx.policy.pocket,
                    &self.changes.source,
                )
                .map(|publication| publication.component.clone());
                self.apply_unknown_overrides(idx, ctx, source_component);
            }
        }
    }

    /// Actions for files the archive has never seen. PPA and copy-archive
    /// uploads are auto-accepted and left untouched, partner files keep
    /// their component, everything else is tagged NEW and mapped through
    /// the default component overrides.
    fn apply_unknown_overrides(
        &mut self,
        idx: usize,
        ctx: &PipelineContext,
        component_hint: Option<String>,
    ) {
        if ctx.policy.archive.kind.auto_accepts_unknown() {
            return;
        }

        let is_partner = self.files[idx].component() == PARTNER_COMPONENT;

        let override_component = |current: &str| -> String {
            match &component_hint {
                Some(component) => component.clone(),
                None => policy::default_component_override(current).to_string(),
            }
        };

        match &mut self.files[idx] {
            UploadFile::Source(source) => {
                source.is_new = true;
                if !is_partner {
                    source.component = override_component(&source.component);
                }
            }
            UploadFile::Deb(binary) | UploadFile::Udeb(binary) | UploadFile::Ddeb(binary) => {
                binary.is_new = true;
                if !is_partner {
                    binary.component = override_component(&binary.component);
                }
            }
            UploadFile::Custom(_) => (),
        }
    }

    /// Debug packages must carry the same overrides as their counterpart
    /// binaries so domination can supersede both in lockstep. Runs after
    /// the matcher and the override pass.
    fn override_ddebs(&mut self) {
        for idx in 0..self.files.len() {
            if !matches!(self.files[idx], UploadFile::Ddeb(_)) {
                continue;
            }
            let Some(deb_idx) = self.files[idx]
                .as_binary()
                .and_then(|binary| binary.debug_counterpart)
            else {
                continue;
            };
            let (component, section, priority) = {
                let Some(deb) = self.files[deb_idx].as_binary() else {
                    continue;
                };
                (deb.component.clone(), deb.section.clone(), deb.priority)
            };
            if let Some(ddeb) = self.files[idx].as_binary_mut() {
                ddeb.component = component;
                ddeb.section = section;
                ddeb.priority = priority;
            }
        }
    }

    /// Move partner uploads to the partner archive. An upload is either
    /// all partner or not partner at all, mixtures are rejected with the
    /// archive left as it was.
    fn override_archive(&mut self, ctx: &mut PipelineContext) {
        let components = self.components();
        if !components.contains(PARTNER_COMPONENT) {
            return;
        }

        if components.len() != 1 {
            self.issues
                .reject("Cannot mix partner files with non-partner.");
            return;
        }

        // partner uploads to PPAs stay in the PPA
        if ctx.policy.archive.is_ppa() {
            return;
        }

        match ctx.policy.partner_archive.clone() {
            Some(name) => {
                debug!("Retargeting upload to partner archive {:?}", name);
                ctx.policy.archive = Archive::new(name, ArchiveKind::Partner);
            }
            None => {
                self.issues.reject(format!(
                    "Partner archive for series {:?} not found",
                    ctx.policy.series.name
                ));
            }
        }
    }

    /// Check the signer's upload rights. Binary uploads are never checked,
    /// they come in via the build infrastructure; the only file that
    /// matters is the .dsc since it is what ends up in the archive.
    fn verify_acl(&mut self, ctx: &PipelineContext) {
        if self.flags.binaryful {
            return;
        }

        let Some(signer) = self.changes.signer.clone() else {
            debug!("No signer, therefore ACL not processed");
            return;
        };

        let Some((package, component)) = self.files.iter().find_map(|file| {
            file.as_source()
                .filter(|source| source.kind == SourceFileKind::Dsc)
                .map(|source| (source.package.clone(), source.component.clone()))
        }) else {
            return;
        };

        if let Some(reason) = ctx.acl.check_upload(
            &signer,
            &ctx.policy.series,
            &package,
            &component,
            ctx.policy.pocket,
            !self.is_new(),
        ) {
            self.issues.reject(reason);
        }
    }

    //
    // Acceptance and rejection
    //

    fn needs_human_approval(&self) -> bool {
        self.files.iter().any(|file| {
            matches!(
                file,
                UploadFile::Custom(custom)
                    if custom.format.map(|f| !f.auto_approved()).unwrap_or(false)
            )
        })
    }

    fn queue_entry(&self, ctx: &PipelineContext) -> NewQueueEntry {
        NewQueueEntry {
            changes_filename: self.changes.filename.clone(),
            package: self.changes.source.clone(),
            version: self.changes.version.clone(),
            series: ctx.policy.series.name.clone(),
            pocket: ctx.policy.pocket,
            archive: ctx.policy.archive.clone(),
            rejections: self.issues.rejections().to_vec(),
            warnings: self.issues.warnings().to_vec(),
        }
    }

    /// Turn the processed upload into a queue entry or a rejection report.
    /// A fault while accepting degrades to a rejection: this pipeline never
    /// exits through an unhandled error.
    pub fn finish(
        &mut self,
        ctx: &PipelineContext,
        queue: &mut dyn QueueSink,
        notifier: &dyn Notifier,
    ) -> UploadStatus {
        if self.issues.is_rejected() {
            self.do_reject(ctx, queue, notifier);
            self.state = PipelineState::Rejected;
            return UploadStatus::Rejected;
        }

        match self.do_accept(ctx, queue, notifier) {
            Ok(()) => {
                self.state = PipelineState::Accepted;
                UploadStatus::Accepted
            }
            Err(err) => {
                error!("Exception while accepting: {:#}", err);
                self.issues.reject(format!("{:#}", err));
                self.do_reject(ctx, queue, notifier);
                self.state = PipelineState::Rejected;
                UploadStatus::Rejected
            }
        }
    }

    fn do_accept(
        &mut self,
        ctx: &PipelineContext,
        queue: &mut dyn QueueSink,
        notifier: &dyn Notifier,
    ) -> Result<()> {
        debug!("Creating queue entry");
        let entry = self.queue_entry(ctx);
        let id = queue.create_entry(entry.clone())?;
        self.queue_id = Some(id);

        if self.is_new() {
            // new packages wait in the NEW queue for a human
        } else if ctx.policy.auto_approves(self.needs_human_approval()) {
            queue.accept(id)?;
        } else {
            debug!("Setting it to UNAPPROVED");
            queue.set_unapproved(id)?;
        }

        let summary = self.issues.warning_message();
        notifier.notify_accept(&entry, summary.as_deref())?;
        Ok(())
    }

    fn do_reject(
        &mut self,
        ctx: &PipelineContext,
        queue: &mut dyn QueueSink,
        notifier: &dyn Notifier,
    ) {
        let entry = self.queue_entry(ctx);

        // failures in here are logged and swallowed, the rejection report
        // must still reach the uploader
        let id = match self.queue_id {
            Some(id) => Some(id),
            None => match queue.create_entry(entry.clone()) {
                Ok(id) => {
                    self.queue_id = Some(id);
                    Some(id)
                }
                Err(err) => {
                    error!("Failed to create queue entry for rejection: {:#}", err);
                    None
                }
            },
        };

        if let Some(id) = id {
            if let Err(err) = queue.set_rejected(id) {
                error!("Failed to mark queue entry rejected: {:#}", err);
            }
        }

        if let Err(err) = notifier.notify_reject(&entry, &self.issues.rejection_message()) {
            error!("Failed to send rejection notice: {:#}", err);
        }
    }
}
