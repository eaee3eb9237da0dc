//! Human- and machine-readable rendering of a release run.

use crate::analyzer::ChangeAnalysisResult;
use crate::engine::VersionDecision;
use crate::error::Result;
use crate::pipeline::ReleaseResult;
use console::style;
use std::fmt::Write;

/// Output format selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Render a finished run as a styled text report
pub fn render_text(result: &ReleaseResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", style("=== RELEASE RESULT ===").bold());
    let _ = writeln!(out, "Release ID: {}", result.release_id);
    let outcome = if result.success {
        style("success").green()
    } else {
        style("failed").red()
    };
    let _ = writeln!(out, "Outcome: {} ({})", outcome, result.state);
    let _ = writeln!(out, "Previous Version: {}", result.previous_version);
    let _ = writeln!(out, "New Version: {}", result.new_version);
    let _ = writeln!(out, "Bump: {}", result.bump);
    let _ = writeln!(out, "Duration: {}ms", result.duration_ms);

    if !result.build_results.is_empty() {
        let _ = writeln!(out, "\n{}", style("=== BUILD RESULTS ===").bold());
        for build in &result.build_results {
            let _ = writeln!(
                out,
                "Platform {}/{}: {} ({}ms)",
                build.platform.os, build.platform.arch, status_of(build.status), build.duration_ms
            );
        }
    }

    if !result.test_results.is_empty() {
        let _ = writeln!(out, "\n{}", style("=== TEST RESULTS ===").bold());
        for test in &result.test_results {
            let _ = writeln!(
                out,
                "Suite {}: {} (Coverage: {:.2}%)",
                test.suite,
                status_of(test.status),
                test.coverage * 100.0
            );
        }
    }

    if !result.deploy_results.is_empty() {
        let _ = writeln!(out, "\n{}", style("=== DEPLOY RESULTS ===").bold());
        for deploy in &result.deploy_results {
            let _ = writeln!(
                out,
                "Environment {}: {} ({}ms)",
                deploy.environment,
                status_of(deploy.status),
                deploy.duration_ms
            );
            if let Some(rollback) = &deploy.rollback {
                let _ = writeln!(
                    out,
                    "  Rollback: {} (Previous: {})",
                    if rollback.success { "success" } else { "failed" },
                    rollback.previous_version
                );
            }
        }
    }

    if let Some(error) = &result.error {
        let _ = writeln!(out, "\n{}: {}", style("Error").red().bold(), error);
    }

    out
}

/// Render a dry-run preview: the decision plus the analysis behind it
pub fn render_preview(
    decision: &VersionDecision,
    analysis: &ChangeAnalysisResult,
    commits: &[String],
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", style("=== DRY RUN MODE ===").bold());
    let _ = writeln!(out, "Current Version: {}", decision.current);
    let _ = writeln!(out, "New Version: {}", decision.new);
    let _ = writeln!(out, "Bump: {}", decision.bump);
    let _ = writeln!(out, "Reason: {}", decision.reason);
    let _ = writeln!(out, "Confidence: {:.2}%", decision.confidence * 100.0);
    let _ = writeln!(out, "Requires Approval: {}", decision.requires_approval);

    let _ = writeln!(out, "\n{}", style("=== CHANGE ANALYSIS ===").bold());
    let _ = writeln!(out, "Total Commits: {}", analysis.total_commits);
    let _ = writeln!(out, "Breaking Changes: {}", analysis.breaking_changes);
    let _ = writeln!(out, "New Features: {}", analysis.new_features);
    let _ = writeln!(out, "Bug Fixes: {}", analysis.bug_fixes);
    let _ = writeln!(out, "Files Modified: {}", analysis.files_modified);
    let _ = writeln!(out, "Lines Added: {}", analysis.lines_added);
    let _ = writeln!(out, "Lines Deleted: {}", analysis.lines_deleted);

    if !commits.is_empty() {
        let _ = writeln!(out, "\n{}", style("=== COMMITS ===").bold());
        for (i, commit) in commits.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, commit);
        }
    }

    out
}

/// The full run as one pretty-printed JSON document
pub fn render_json(result: &ReleaseResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

fn status_of(status: crate::domain::TaskStatus) -> console::StyledObject<&'static str> {
    if status.is_success() {
        style("SUCCESS").green()
    } else {
        style("FAILED").red()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ChangeAnalyzer;
    use crate::config::AutoReleaseConfig;
    use crate::domain::{Bump, Version};
    use crate::engine::VersionEngine;
    use crate::pipeline::ReleaseState;

    fn sample_result() -> ReleaseResult {
        ReleaseResult {
            release_id: "release-42".to_string(),
            success: true,
            state: ReleaseState::Completed,
            previous_version: "1.0.0".to_string(),
            new_version: "1.1.0".to_string(),
            bump: Bump::Minor,
            analysis: None,
            decision: None,
            build_results: Vec::new(),
            test_results: Vec::new(),
            deploy_results: Vec::new(),
            duration_ms: 1234,
            error: None,
        }
    }

    #[test]
    fn test_text_report_core_fields() {
        let text = render_text(&sample_result());
        assert!(text.contains("Release ID: release-42"));
        assert!(text.contains("New Version: 1.1.0"));
        assert!(text.contains("Bump: minor"));
        // Empty stages produce no section headers
        assert!(!text.contains("BUILD RESULTS"));
    }

    #[test]
    fn test_text_report_shows_error() {
        let mut result = sample_result();
        result.success = false;
        result.state = ReleaseState::Failed;
        result.error = Some("[BUILD_FAILED] build failed for 1 platform(s)".to_string());
        let text = render_text(&result);
        assert!(text.contains("BUILD_FAILED"));
        assert!(text.contains("Failed"));
    }

    #[test]
    fn test_json_report_round_trips() {
        let json = render_json(&sample_result()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["release_id"], "release-42");
        assert_eq!(doc["success"], true);
        assert_eq!(doc["bump"], "minor");
    }

    #[test]
    fn test_preview_report() {
        let commits = vec!["feat: add exporter".to_string()];
        let analysis = ChangeAnalyzer::new().analyze_changes(&commits, &[]);
        let decision =
            VersionEngine::new(AutoReleaseConfig::default()).decide(&Version::new(1, 0, 0), &analysis);

        let text = render_preview(&decision, &analysis, &commits);
        assert!(text.contains("DRY RUN MODE"));
        assert!(text.contains("New Version: 1.1.0"));
        assert!(text.contains("1. feat: add exporter"));
    }
}
