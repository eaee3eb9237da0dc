use crate::analyzer::FileChange;
use crate::error::Result;
use crate::scm::{CommitRecord, DiffSummary, SourceControl};
use git2::{Delta, DescribeFormatOptions, DescribeOptions, Patch, Repository, Tree};
use std::path::Path;
use std::sync::Mutex;

/// [SourceControl] backed by a real repository via the `git2` crate.
///
/// The repository handle lives behind a mutex; every read takes it for the
/// duration of the operation.
pub struct Git2Reader {
    repo: Mutex<Repository>,
}

impl Git2Reader {
    /// Open or discover the repository containing `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::discover(path)?;
        Ok(Git2Reader {
            repo: Mutex::new(repo),
        })
    }
}

impl SourceControl for Git2Reader {
    fn latest_tag(&self) -> Result<Option<String>> {
        let repo = self.repo.lock().unwrap_or_else(|e| e.into_inner());
        // Equivalent of `git describe --tags --abbrev=0`; a repository
        // without any reachable tag is not an error
        let described = repo
            .describe(DescribeOptions::new().describe_tags())
            .and_then(|d| d.format(Some(DescribeFormatOptions::new().abbreviated_size(0))));
        Ok(described.ok())
    }

    fn current_branch(&self) -> Result<String> {
        let repo = self.repo.lock().unwrap_or_else(|e| e.into_inner());
        let head = repo.head()?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }

    fn commits_since(&self, tag: Option<&str>) -> Result<Vec<CommitRecord>> {
        let repo = self.repo.lock().unwrap_or_else(|e| e.into_inner());
        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        if let Some(tag) = tag {
            let tagged = repo.revparse_single(tag)?.peel_to_commit()?.id();
            revwalk.hide(tagged)?;
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            let commit = repo.find_commit(oid)?;
            let mut hash = oid.to_string();
            hash.truncate(7);
            commits.push(CommitRecord {
                hash,
                message: commit.summary().unwrap_or("(empty message)").to_string(),
                author: commit.author().name().unwrap_or("unknown").to_string(),
            });
        }
        Ok(commits)
    }

    fn diff_since(&self, tag: Option<&str>) -> Result<DiffSummary> {
        let repo = self.repo.lock().unwrap_or_else(|e| e.into_inner());
        let head_tree = repo.head()?.peel_to_commit()?.tree()?;
        let old_tree: Option<Tree> = match tag {
            Some(tag) => Some(repo.revparse_single(tag)?.peel_to_commit()?.tree()?),
            None => None,
        };

        let diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&head_tree), None)?;

        let mut summary = DiffSummary::default();
        for (idx, delta) in diff.deltas().enumerate() {
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.display().to_string())
                .unwrap_or_default();

            let (added, deleted) = match Patch::from_diff(&diff, idx)? {
                Some(patch) => {
                    let (_, additions, deletions) = patch.line_stats()?;
                    (additions as u32, deletions as u32)
                }
                None => (0, 0),
            };

            summary.added_lines += added;
            summary.deleted_lines += deleted;
            summary.files.push(FileChange {
                path,
                added_lines: added,
                deleted_lines: deleted,
                is_new: delta.status() == Delta::Added,
                is_deleted: delta.status() == Delta::Deleted,
            });
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Tester").unwrap();
            config.set_str("user.email", "tester@example.com").unwrap();
        }
        repo
    }

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(name), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let signature = repo.signature().unwrap();
        let parent = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap();
    }

    fn tag_head(repo: &Repository, name: &str) {
        let head = repo.head().unwrap().peel(git2::ObjectType::Commit).unwrap();
        repo.tag_lightweight(name, &head, false).unwrap();
    }

    #[test]
    fn test_repo_without_tags() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        commit_file(&repo, "a.txt", "one\n", "feat: initial import");

        let reader = Git2Reader::open(dir.path()).unwrap();
        assert_eq!(reader.latest_tag().unwrap(), None);

        let commits = reader.commits_since(None).unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "feat: initial import");
        assert_eq!(commits[0].author, "Tester");
        assert_eq!(commits[0].hash.len(), 7);
    }

    #[test]
    fn test_commits_and_diff_since_tag() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        commit_file(&repo, "a.txt", "one\n", "feat: initial import");
        tag_head(&repo, "v1.0.0");
        commit_file(&repo, "b.txt", "two\nthree\n", "fix: add b");
        commit_file(&repo, "a.txt", "one\nmore\n", "docs: extend a");

        let reader = Git2Reader::open(dir.path()).unwrap();
        assert_eq!(reader.latest_tag().unwrap().as_deref(), Some("v1.0.0"));

        let commits = reader.commits_since(Some("v1.0.0")).unwrap();
        assert_eq!(commits.len(), 2);
        let messages: Vec<_> = commits.iter().map(|c| c.message.as_str()).collect();
        assert!(messages.contains(&"fix: add b"));
        assert!(messages.contains(&"docs: extend a"));
        assert!(!messages.contains(&"feat: initial import"));

        let diff = reader.diff_since(Some("v1.0.0")).unwrap();
        assert_eq!(diff.files.len(), 2);
        let new_file = diff.files.iter().find(|f| f.path == "b.txt").unwrap();
        assert!(new_file.is_new);
        assert_eq!(new_file.added_lines, 2);
        let modified = diff.files.iter().find(|f| f.path == "a.txt").unwrap();
        assert!(!modified.is_new);
        assert_eq!(diff.added_lines, 3);
    }

    #[test]
    fn test_current_branch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        commit_file(&repo, "a.txt", "one\n", "chore: init");

        let reader = Git2Reader::open(dir.path()).unwrap();
        let branch = reader.current_branch().unwrap();
        // Default branch name depends on the host git configuration
        assert!(branch == "main" || branch == "master");
    }
}
