use crate::domain::Bump;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Category a commit falls into after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCategory {
    Feature,
    Fix,
    Docs,
    Style,
    Refactor,
    Perf,
    Test,
    Build,
    Ci,
    Chore,
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeCategory::Feature => "feat",
            ChangeCategory::Fix => "fix",
            ChangeCategory::Docs => "docs",
            ChangeCategory::Style => "style",
            ChangeCategory::Refactor => "refactor",
            ChangeCategory::Perf => "perf",
            ChangeCategory::Test => "test",
            ChangeCategory::Build => "build",
            ChangeCategory::Ci => "ci",
            ChangeCategory::Chore => "chore",
        };
        f.write_str(s)
    }
}

/// One changed file in the diff since the last release
#[derive(Debug, Clone, Serialize)]
pub struct FileChange {
    pub path: String,
    pub added_lines: u32,
    pub deleted_lines: u32,
    pub is_new: bool,
    pub is_deleted: bool,
}

/// Classification of a single commit message
#[derive(Debug, Clone, Serialize)]
pub struct CommitAnalysis {
    pub message: String,
    pub category: ChangeCategory,
    pub scope: Option<String>,
    pub breaking: bool,
}

/// Aggregated view of everything that changed since the last release
#[derive(Debug, Clone, Serialize)]
pub struct ChangeAnalysisResult {
    pub total_commits: u32,
    pub breaking_changes: u32,
    pub new_features: u32,
    pub bug_fixes: u32,
    pub other_changes: u32,
    pub files_modified: u32,
    pub files_added: u32,
    pub files_deleted: u32,
    pub lines_added: u32,
    pub lines_deleted: u32,
    pub suggested_bump: Bump,
    pub confidence: f64,
    pub details: Vec<CommitAnalysis>,
}

/// Classifies commit messages and aggregates diff statistics into a
/// suggested version bump with a confidence score.
///
/// Messages following the conventional grammar `type(scope)!: subject` are
/// classified directly; anything else degrades to keyword heuristics and
/// ultimately to chore, so analysis never fails on malformed input.
pub struct ChangeAnalyzer {
    conventional: Regex,
    breaking: Regex,
    feature_hints: Vec<Regex>,
    fix_hints: Vec<Regex>,
}

impl Default for ChangeAnalyzer {
    fn default() -> Self {
        ChangeAnalyzer::new()
    }
}

impl ChangeAnalyzer {
    pub fn new() -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("static pattern compiles");
        ChangeAnalyzer {
            conventional: compile(
                r"^(feat|fix|docs|style|refactor|perf|test|build|ci|chore|revert)(\(.+\))?!?:\s*.+",
            ),
            breaking: compile(r"BREAKING\s*CHANGE:|^[^:]+!:"),
            feature_hints: vec![
                compile(r"(?i)^feat(\(.+\))?!?:"),
                compile(r"(?i)add\s+(new\s+)?(feature|functionality|support)"),
                compile(r"(?i)implement\s+new"),
                compile(r"(?i)introduce\s+"),
            ],
            fix_hints: vec![
                compile(r"(?i)^fix(\(.+\))?:"),
                compile(r"(?i)fix\s+(bug|issue|error)"),
                compile(r"(?i)resolve\s+(issue|bug)"),
                compile(r"(?i)patch\s+"),
            ],
        }
    }

    /// Classify a single commit message
    pub fn analyze_commit_message(&self, message: &str) -> CommitAnalysis {
        if let Some(captures) = self.conventional.captures(message) {
            let category = parse_commit_type(&captures[1]);
            let scope = captures
                .get(2)
                .map(|m| m.as_str().trim_matches(|c| c == '(' || c == ')').to_string())
                .filter(|s| !s.is_empty());
            let breaking = message.contains("!:") || self.breaking.is_match(message);
            return CommitAnalysis {
                message: message.to_string(),
                category,
                scope,
                breaking,
            };
        }

        CommitAnalysis {
            message: message.to_string(),
            category: self.infer_commit_type(message),
            scope: None,
            breaking: self.breaking.is_match(message),
        }
    }

    fn infer_commit_type(&self, message: &str) -> ChangeCategory {
        if self.feature_hints.iter().any(|p| p.is_match(message)) {
            return ChangeCategory::Feature;
        }
        if self.fix_hints.iter().any(|p| p.is_match(message)) {
            return ChangeCategory::Fix;
        }

        let lower = message.to_lowercase();
        if lower.contains("refactor") {
            ChangeCategory::Refactor
        } else if lower.contains("performance") || lower.contains("optimize") {
            ChangeCategory::Perf
        } else if lower.contains("test") {
            ChangeCategory::Test
        } else if lower.contains("doc") {
            ChangeCategory::Docs
        } else {
            ChangeCategory::Chore
        }
    }

    /// Aggregate commits and file changes into one analysis result.
    ///
    /// # Arguments
    /// * `commits` - Commit messages since the last release, any order
    /// * `file_changes` - Per-file diff statistics since the last release
    pub fn analyze_changes(
        &self,
        commits: &[String],
        file_changes: &[FileChange],
    ) -> ChangeAnalysisResult {
        let mut result = ChangeAnalysisResult {
            total_commits: 0,
            breaking_changes: 0,
            new_features: 0,
            bug_fixes: 0,
            other_changes: 0,
            files_modified: file_changes.len() as u32,
            files_added: 0,
            files_deleted: 0,
            lines_added: 0,
            lines_deleted: 0,
            suggested_bump: Bump::None,
            confidence: 0.0,
            details: Vec::with_capacity(commits.len()),
        };

        for commit in commits {
            let analysis = self.analyze_commit_message(commit);
            result.total_commits += 1;
            if analysis.breaking {
                result.breaking_changes += 1;
            }
            match analysis.category {
                ChangeCategory::Feature => result.new_features += 1,
                ChangeCategory::Fix => result.bug_fixes += 1,
                _ => result.other_changes += 1,
            }
            result.details.push(analysis);
        }

        for change in file_changes {
            result.lines_added += change.added_lines;
            result.lines_deleted += change.deleted_lines;
            if change.is_new {
                result.files_added += 1;
            }
            if change.is_deleted {
                result.files_deleted += 1;
            }
        }

        result.suggested_bump = suggest_bump(&result);
        result.confidence = calculate_confidence(&result);
        result
    }
}

fn parse_commit_type(type_str: &str) -> ChangeCategory {
    match type_str.to_lowercase().as_str() {
        "feat" => ChangeCategory::Feature,
        "fix" => ChangeCategory::Fix,
        "docs" => ChangeCategory::Docs,
        "style" => ChangeCategory::Style,
        "refactor" => ChangeCategory::Refactor,
        "perf" => ChangeCategory::Perf,
        "test" => ChangeCategory::Test,
        "build" => ChangeCategory::Build,
        "ci" => ChangeCategory::Ci,
        _ => ChangeCategory::Chore,
    }
}

fn suggest_bump(result: &ChangeAnalysisResult) -> Bump {
    if result.breaking_changes > 0 {
        Bump::Major
    } else if result.new_features > 0 {
        Bump::Minor
    } else if result.bug_fixes > 0 || result.other_changes > 0 {
        Bump::Patch
    } else {
        Bump::None
    }
}

fn calculate_confidence(result: &ChangeAnalysisResult) -> f64 {
    let mut confidence = 0.5;

    if result.total_commits > 0 {
        confidence += 0.1;
    }
    if result.breaking_changes > 0 || result.new_features > 0 || result.bug_fixes > 0 {
        confidence += 0.2;
    }
    if !result.details.is_empty() {
        let clear = result
            .details
            .iter()
            .filter(|c| {
                matches!(c.category, ChangeCategory::Feature | ChangeCategory::Fix) || c.breaking
            })
            .count();
        confidence += clear as f64 / result.details.len() as f64 * 0.2;
    }

    confidence.min(1.0)
}
