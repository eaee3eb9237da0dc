use crate::analyzer::FileChange;
use crate::error::Result;
use crate::scm::{CommitRecord, DiffSummary, SourceControl};

/// Canned [SourceControl] implementation for tests.
///
/// Built up with the `with_*` methods; every read returns the configured
/// data verbatim.
#[derive(Debug, Clone, Default)]
pub struct MockSourceControl {
    tag: Option<String>,
    branch: String,
    commits: Vec<CommitRecord>,
    diff: DiffSummary,
}

impl MockSourceControl {
    pub fn new() -> Self {
        MockSourceControl {
            branch: "main".to_string(),
            ..MockSourceControl::default()
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = branch.to_string();
        self
    }

    pub fn with_commits(mut self, messages: &[&str]) -> Self {
        self.commits = messages
            .iter()
            .enumerate()
            .map(|(i, message)| CommitRecord {
                hash: format!("{:07x}", i + 1),
                message: message.to_string(),
                author: "tester".to_string(),
            })
            .collect();
        self
    }

    pub fn with_files(mut self, files: Vec<FileChange>) -> Self {
        self.diff.added_lines = files.iter().map(|f| f.added_lines).sum();
        self.diff.deleted_lines = files.iter().map(|f| f.deleted_lines).sum();
        self.diff.files = files;
        self
    }
}

impl SourceControl for MockSourceControl {
    fn latest_tag(&self) -> Result<Option<String>> {
        Ok(self.tag.clone())
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    fn commits_since(&self, _tag: Option<&str>) -> Result<Vec<CommitRecord>> {
        Ok(self.commits.clone())
    }

    fn diff_since(&self, _tag: Option<&str>) -> Result<DiffSummary> {
        Ok(self.diff.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_returns_configured_data() {
        let scm = MockSourceControl::new()
            .with_tag("v2.1.0")
            .with_branch("develop")
            .with_commits(&["feat: a", "fix: b"]);

        assert_eq!(scm.latest_tag().unwrap().as_deref(), Some("v2.1.0"));
        assert_eq!(scm.current_branch().unwrap(), "develop");
        let commits = scm.commits_since(Some("v2.1.0")).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].message, "feat: a");
    }

    #[test]
    fn test_mock_defaults() {
        let scm = MockSourceControl::new();
        assert_eq!(scm.latest_tag().unwrap(), None);
        assert_eq!(scm.current_branch().unwrap(), "main");
        assert!(scm.commits_since(None).unwrap().is_empty());
        assert!(scm.diff_since(None).unwrap().files.is_empty());
    }
}
