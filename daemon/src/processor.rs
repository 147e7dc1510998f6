use crate::acl::AclPolicy;
use crate::ancestry::PublicationLookup;
use crate::changes;
use crate::policy::UploadPolicy;
use crate::queue::{Notifier, QueueSink};
use crate::upload::{NascentUpload, PipelineContext};
use std::fs;
use std::path::{Path, PathBuf};
use uploadd_common::errors::*;
use uploadd_common::UploadStatus;

/// On-disk layout of the upload spool. Every upload session is a leaf
/// directory under incoming/ and ends up in exactly one of the other
/// three after processing.
pub struct SpoolDirs {
    pub incoming: PathBuf,
    pub accepted: PathBuf,
    pub rejected: PathBuf,
    pub failed: PathBuf,
}

impl SpoolDirs {
    pub fn new(root: &Path) -> SpoolDirs {
        SpoolDirs {
            incoming: root.join("incoming"),
            accepted: root.join("accepted"),
            rejected: root.join("rejected"),
            failed: root.join("failed"),
        }
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.incoming,
            &self.accepted,
            &self.rejected,
            &self.failed,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| anyhow!("Failed to create spool dir: {:?}", dir))?;
        }
        Ok(())
    }

    fn destination(&self, status: UploadStatus) -> &Path {
        match status {
            UploadStatus::Accepted => &self.accepted,
            UploadStatus::Rejected => &self.rejected,
            UploadStatus::Failed => &self.failed,
        }
    }
}

/// The signature on a changes file is verified before the file lands in
/// the spool; the verifier leaves the signer identity in a sidecar file
/// next to it.
fn signer_for(changes_path: &Path) -> Option<String> {
    let sidecar = changes_path.with_extension("changes.signer");
    fs::read_to_string(sidecar)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Walks the incoming spool and runs every upload through the acceptance
/// pipeline. One upload at a time, one changes file at a time; there is
/// nothing concurrent in here.
pub struct UploadProcessor<'a> {
    dirs: SpoolDirs,
    policy: UploadPolicy,
    publications: &'a dyn PublicationLookup,
    acl: &'a dyn AclPolicy,
}

impl<'a> UploadProcessor<'a> {
    pub fn new(
        dirs: SpoolDirs,
        policy: UploadPolicy,
        publications: &'a dyn PublicationLookup,
        acl: &'a dyn AclPolicy,
    ) -> UploadProcessor<'a> {
        UploadProcessor {
            dirs,
            policy,
            publications,
            acl,
        }
    }

    /// Upload directories under incoming/, in stable name order.
    pub fn locate_uploads(&self) -> Result<Vec<PathBuf>> {
        let mut leafs = Vec::new();
        if !self.dirs.incoming.exists() {
            return Ok(leafs);
        }
        for entry in fs::read_dir(&self.dirs.incoming)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                leafs.push(entry.path());
            }
        }
        leafs.sort();
        Ok(leafs)
    }

    fn locate_changes_files(leaf: &Path) -> Result<Vec<PathBuf>> {
        let mut changes_files = Vec::new();
        for entry in fs::read_dir(leaf)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("changes") {
                changes_files.push(path);
            }
        }
        changes::order_changes_files(&mut changes_files);
        Ok(changes_files)
    }

    /// Process every changes file in one upload directory. The worst
    /// outcome of the batch decides where the directory is moved.
    pub fn process_upload(
        &self,
        leaf: &Path,
        queue: &mut dyn QueueSink,
        notifier: &dyn Notifier,
    ) -> UploadStatus {
        info!("Processing upload {:?}", leaf);

        let changes_files = match Self::locate_changes_files(leaf) {
            Ok(files) => files,
            Err(err) => {
                error!("Failed to scan upload {:?}: {:#}", leaf, err);
                return UploadStatus::Failed;
            }
        };
        if changes_files.is_empty() {
            warn!("Upload {:?} contains no changes files", leaf);
            return UploadStatus::Failed;
        }

        let mut result = UploadStatus::Accepted;
        for path in changes_files {
            let status = self.process_changes_file(&path, queue, notifier);
            result = result.merge(status);
        }
        result
    }

    pub fn process_changes_file(
        &self,
        path: &Path,
        queue: &mut dyn QueueSink,
        notifier: &dyn Notifier,
    ) -> UploadStatus {
        debug!("Considering changesfile {:?}", path);

        let mut upload = match NascentUpload::from_changes_path(path, signer_for(path)) {
            Ok(upload) => upload,
            Err(err) => {
                // a changes file that cannot even be parsed is rejected
                // rather than failed, retrying won't make it better
                error!("Unable to process {:?}: {:#}", path, err);
                return UploadStatus::Rejected;
            }
        };

        let mut ctx = PipelineContext {
            policy: self.policy.clone(),
            publications: self.publications,
            acl: self.acl,
            verify_payloads: true,
        };
        upload.process(&mut ctx);
        upload.finish(&ctx, queue, notifier)
    }

    /// Process everything currently in the spool, moving each upload to
    /// its result directory. Returns the number of uploads handled.
    pub fn process_all(
        &self,
        queue: &mut dyn QueueSink,
        notifier: &dyn Notifier,
    ) -> Result<usize> {
        let mut processed = 0;
        for leaf in self.locate_uploads()? {
            let status = self.process_upload(&leaf, queue, notifier);
            self.move_upload(&leaf, status)?;
            processed += 1;
        }
        Ok(processed)
    }

    fn move_upload(&self, leaf: &Path, status: UploadStatus) -> Result<()> {
        let name = leaf
            .file_name()
            .ok_or_else(|| format_err!("Upload path has no name: {:?}", leaf))?;
        let target = self.dirs.destination(status).join(name);
        info!("Moving upload {:?} to {}", leaf, &*status);
        fs::rename(leaf, &target)
            .with_context(|| anyhow!("Failed to move upload to {:?}", target))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AllowAll;
    use crate::archive::ArchiveState;
    use crate::queue::{LogNotifier, MemoryQueue, QueueDisposition};
    use uploadd_common::{Archive, ArchiveKind, DistroSeries};

    const SOURCE_CHANGES: &str = "\
Source: hello
Version: 2.10-2
Architecture: source
Distribution: crimson
Maintainer: Crimson Developers <devel@example.org>
Files:
 d41d8cd98f00b204e9800998ecf8427e 1420 devel optional hello_2.10-2.dsc
 900150983cd24fb0d6963f7d28e17f72 40320 devel optional hello_2.10-2.debian.tar.xz
";

    fn series() -> DistroSeries {
        DistroSeries::new(
            "crimson".to_string(),
            vec!["amd64".to_string()],
            "amd64".to_string(),
        )
    }

    fn write_upload(incoming: &Path, leaf: &str, changes_name: &str, content: &str) -> PathBuf {
        let dir = incoming.join(leaf);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(changes_name), content).unwrap();
        dir
    }

    fn write_payload(dir: &Path, name: &str, size: usize) {
        fs::write(dir.join(name), vec![b'x'; size]).unwrap();
    }

    #[test]
    fn test_spool_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = SpoolDirs::new(tmp.path());
        dirs.ensure().unwrap();
        let leaf = write_upload(
            &dirs.incoming,
            "upload-1",
            "hello_2.10-2_source.changes",
            SOURCE_CHANGES,
        );
        write_payload(&leaf, "hello_2.10-2.dsc", 1420);
        write_payload(&leaf, "hello_2.10-2.debian.tar.xz", 40320);

        let state = ArchiveState::empty(series());
        let policy = UploadPolicy::new(
            series(),
            Archive::new("primary".to_string(), ArchiveKind::Primary),
        );
        let dirs = SpoolDirs::new(tmp.path());
        let processor = UploadProcessor::new(dirs, policy, &state, &AllowAll);

        let mut queue = MemoryQueue::new();
        let processed = processor.process_all(&mut queue, &LogNotifier).unwrap();
        assert_eq!(processed, 1);

        // clean NEW upload: accepted into the NEW queue, spool dir moved
        assert!(tmp.path().join("accepted/upload-1").exists());
        assert!(!tmp.path().join("incoming/upload-1").exists());
        assert_eq!(queue.entries.len(), 1);
        assert_eq!(queue.entries[0].disposition, QueueDisposition::New);
    }

    #[test]
    fn test_garbage_changes_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = SpoolDirs::new(tmp.path());
        dirs.ensure().unwrap();
        write_upload(
            &dirs.incoming,
            "upload-1",
            "garbage_1.0_source.changes",
            "this is not a changes file\n",
        );

        let state = ArchiveState::empty(series());
        let policy = UploadPolicy::new(
            series(),
            Archive::new("primary".to_string(), ArchiveKind::Primary),
        );
        let processor =
            UploadProcessor::new(SpoolDirs::new(tmp.path()), policy, &state, &AllowAll);

        let mut queue = MemoryQueue::new();
        processor.process_all(&mut queue, &LogNotifier).unwrap();
        assert!(tmp.path().join("rejected/upload-1").exists());
    }

    #[test]
    fn test_missing_payload_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = SpoolDirs::new(tmp.path());
        dirs.ensure().unwrap();
        let leaf = write_upload(
            &dirs.incoming,
            "upload-1",
            "hello_2.10-2_source.changes",
            SOURCE_CHANGES,
        );
        // only one of the two listed payloads is present, and with the
        // wrong size
        write_payload(&leaf, "hello_2.10-2.dsc", 7);

        let state = ArchiveState::empty(series());
        let policy = UploadPolicy::new(
            series(),
            Archive::new("primary".to_string(), ArchiveKind::Primary),
        );
        let processor =
            UploadProcessor::new(SpoolDirs::new(tmp.path()), policy, &state, &AllowAll);

        let mut queue = MemoryQueue::new();
        processor.process_all(&mut queue, &LogNotifier).unwrap();
        assert!(tmp.path().join("rejected/upload-1").exists());
        assert_eq!(queue.entries.len(), 1);
        assert_eq!(queue.entries[0].disposition, QueueDisposition::Rejected);
        assert_eq!(queue.entries[0].rejections.len(), 2);
    }

    #[test]
    fn test_empty_upload_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = SpoolDirs::new(tmp.path());
        dirs.ensure().unwrap();
        fs::create_dir_all(dirs.incoming.join("upload-1")).unwrap();

        let state = ArchiveState::empty(series());
        let policy = UploadPolicy::new(
            series(),
            Archive::new("primary".to_string(), ArchiveKind::Primary),
        );
        let processor =
            UploadProcessor::new(SpoolDirs::new(tmp.path()), policy, &state, &AllowAll);

        let mut queue = MemoryQueue::new();
        processor.process_all(&mut queue, &LogNotifier).unwrap();
        assert!(tmp.path().join("failed/upload-1").exists());
    }

    #[test]
    fn test_signer_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let changes = tmp.path().join("hello_2.10-2_source.changes");
        fs::write(&changes, SOURCE_CHANGES).unwrap();
        assert_eq!(signer_for(&changes), None);

        fs::write(
            tmp.path().join("hello_2.10-2_source.changes.signer"),
            "kathryn@example.org\n",
        )
        .unwrap();
        assert_eq!(signer_for(&changes), Some("kathryn@example.org".to_string()));
    }
}
