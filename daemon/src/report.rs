use uploadd_common::errors::*;

/// A single problem found while checking an upload. Warnings ride along on
/// the acceptance mail, rejections block the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadIssue {
    Rejection(String),
    Warning(String),
}

impl UploadIssue {
    pub fn rejection<S: Into<String>>(msg: S) -> UploadIssue {
        UploadIssue::Rejection(msg.into())
    }

    pub fn warning<S: Into<String>>(msg: S) -> UploadIssue {
        UploadIssue::Warning(msg.into())
    }
}

/// Continuing to check this upload would be meaningless, e.g. the changes
/// file could not be parsed at all. Caught at the top of the pipeline and
/// turned into a normal rejection report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarlyReturn;

/// Collects everything that is wrong with an upload so a single pass can
/// report all problems instead of only the first one.
#[derive(Debug, Default, Clone)]
pub struct IssueLog {
    rejections: Vec<String>,
    warnings: Vec<String>,
}

impl IssueLog {
    pub fn new() -> IssueLog {
        IssueLog::default()
    }

    pub fn reject<S: Into<String>>(&mut self, msg: S) {
        let msg = msg.into();
        debug!("upload rejected: {}", msg);
        self.rejections.push(msg);
    }

    pub fn warn<S: Into<String>>(&mut self, msg: S) {
        let msg = msg.into();
        debug!("upload warning: {}", msg);
        self.warnings.push(msg);
    }

    pub fn record(&mut self, issue: UploadIssue) {
        match issue {
            UploadIssue::Rejection(msg) => self.reject(msg),
            UploadIssue::Warning(msg) => self.warn(msg),
        }
    }

    pub fn absorb<I: IntoIterator<Item = UploadIssue>>(&mut self, issues: I) {
        for issue in issues {
            self.record(issue);
        }
    }

    pub fn is_rejected(&self) -> bool {
        !self.rejections.is_empty()
    }

    pub fn rejections(&self) -> &[String] {
        &self.rejections
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn rejection_message(&self) -> String {
        self.rejections.join("\n")
    }

    pub fn warning_message(&self) -> Option<String> {
        if self.warnings.is_empty() {
            return None;
        }
        Some(format!("\nUpload Warnings:\n{}", self.warnings.join("\n")))
    }

    /// Bail out of the pipeline if anything was rejected so far. Used after
    /// the steps where carrying on with broken state would produce noise
    /// instead of useful errors.
    pub fn checkpoint(&self) -> std::result::Result<(), EarlyReturn> {
        if self.is_rejected() {
            Err(EarlyReturn)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_reject() {
        let mut log = IssueLog::new();
        log.warn("something minor");
        assert!(!log.is_rejected());
        assert!(log.checkpoint().is_ok());
    }

    #[test]
    fn test_rejections_trip_checkpoint() {
        let mut log = IssueLog::new();
        log.reject("broken");
        assert!(log.is_rejected());
        assert_eq!(log.checkpoint(), Err(EarlyReturn));
    }

    #[test]
    fn test_messages() {
        let mut log = IssueLog::new();
        assert_eq!(log.warning_message(), None);
        log.reject("first");
        log.reject("second");
        log.warn("heads up");
        assert_eq!(log.rejection_message(), "first\nsecond");
        assert_eq!(
            log.warning_message().unwrap(),
            "\nUpload Warnings:\nheads up"
        );
    }

    #[test]
    fn test_absorb() {
        let mut log = IssueLog::new();
        log.absorb(vec![
            UploadIssue::warning("w"),
            UploadIssue::rejection("r"),
        ]);
        assert_eq!(log.warnings(), &["w".to_string()]);
        assert_eq!(log.rejections(), &["r".to_string()]);
    }
}
