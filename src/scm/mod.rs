//! Source-control reading abstraction
//!
//! The pipeline only ever reads from source control: the latest tag, the
//! current branch, and the commits and diff accumulated since that tag.
//! [SourceControl] abstracts those reads so the pipeline can run against a
//! real repository ([git2_reader::Git2Reader]) or a canned fixture
//! ([mock::MockSourceControl]) in tests.

pub mod git2_reader;
pub mod mock;

pub use git2_reader::Git2Reader;
pub use mock::MockSourceControl;

use crate::analyzer::FileChange;
use crate::error::Result;

/// One commit as seen by the analyzer
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    /// Shortened commit hash
    pub hash: String,
    /// First line of the commit message
    pub message: String,
    pub author: String,
}

/// Per-file changes plus line totals since a reference point
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    pub files: Vec<FileChange>,
    pub added_lines: u32,
    pub deleted_lines: u32,
}

/// Read-only view of the repository the release runs against.
///
/// Implementors must be `Send + Sync`; the pipeline may hold the reader
/// across its worker fan-out.
pub trait SourceControl: Send + Sync {
    /// The most recent tag reachable from HEAD, if any exists
    fn latest_tag(&self) -> Result<Option<String>>;

    /// Name of the currently checked-out branch
    fn current_branch(&self) -> Result<String>;

    /// Commits from `tag` (exclusive) to HEAD, newest first.
    ///
    /// With no tag, every commit reachable from HEAD is returned.
    fn commits_since(&self, tag: Option<&str>) -> Result<Vec<CommitRecord>>;

    /// Cumulative diff from `tag` to HEAD.
    ///
    /// With no tag, the diff is taken against the empty tree, so every
    /// tracked file counts as new.
    fn diff_since(&self, tag: Option<&str>) -> Result<DiffSummary>;
}
