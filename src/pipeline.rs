use crate::analyzer::{ChangeAnalysisResult, ChangeAnalyzer, FileChange};
use crate::build::{BuildManager, BuildResult};
use crate::config::ReleaseConfig;
use crate::deploy::{DeployManager, DeployResult};
use crate::domain::{Bump, Version};
use crate::engine::{VersionDecision, VersionEngine};
use crate::error::{ErrorCode, ReleaseFailure, Result};
use crate::handler::ErrorHandler;
use crate::logger::{ReleaseLogger, Stage};
use crate::testing::{TestManager, TestResult};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Pipeline state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReleaseState {
    Idle,
    Analyzing,
    VersionDeciding,
    Building,
    Testing,
    Deploying,
    Completed,
    Failed,
    RolledBack,
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReleaseState::Idle => "Idle",
            ReleaseState::Analyzing => "Analyzing",
            ReleaseState::VersionDeciding => "VersionDeciding",
            ReleaseState::Building => "Building",
            ReleaseState::Testing => "Testing",
            ReleaseState::Deploying => "Deploying",
            ReleaseState::Completed => "Completed",
            ReleaseState::Failed => "Failed",
            ReleaseState::RolledBack => "RolledBack",
        };
        f.write_str(s)
    }
}

/// Per-run switches from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_tests: bool,
    pub skip_deploy: bool,
}

/// Everything a finished (or aborted) run produced
#[derive(Debug, Serialize)]
pub struct ReleaseResult {
    pub release_id: String,
    pub success: bool,
    pub state: ReleaseState,
    pub previous_version: String,
    pub new_version: String,
    pub bump: Bump,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ChangeAnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<VersionDecision>,
    pub build_results: Vec<BuildResult>,
    pub test_results: Vec<TestResult>,
    pub deploy_results: Vec<DeployResult>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Orchestrates one release end to end.
///
/// States advance strictly forward: `Idle → Analyzing → VersionDeciding →
/// Building → Testing → Deploying → Completed | Failed`, with `Failed →
/// RolledBack` taken only when an automatic rollback's health re-check
/// succeeded. Skipped or disabled stages still pass through their state
/// with an empty result, so the audit trail always shows the full path.
pub struct ReleasePipeline {
    analyzer: ChangeAnalyzer,
    engine: VersionEngine,
    build_manager: BuildManager,
    test_manager: TestManager,
    deploy_manager: DeployManager,
    logger: Arc<ReleaseLogger>,
    handler: ErrorHandler,
    state: ReleaseState,
    project_name: String,
    release_id: String,
}

impl ReleasePipeline {
    /// Wire up a pipeline from a validated configuration
    pub fn new(config: ReleaseConfig, project_name: &str) -> Result<Self> {
        config.validate()?;

        let release_id = generate_release_id();
        let logger = Arc::new(ReleaseLogger::new(config.logging.clone(), &release_id)?);
        let handler = ErrorHandler::new(Arc::clone(&logger));

        Ok(ReleasePipeline {
            analyzer: ChangeAnalyzer::new(),
            engine: VersionEngine::new(config.auto_release.clone()),
            build_manager: BuildManager::new(config.build.clone(), Arc::clone(&logger)),
            test_manager: TestManager::new(config.test.clone(), Arc::clone(&logger)),
            deploy_manager: DeployManager::new(config.deploy.clone(), Arc::clone(&logger)),
            logger,
            handler,
            state: ReleaseState::Idle,
            project_name: project_name.to_string(),
            release_id,
        })
    }

    pub fn state(&self) -> ReleaseState {
        self.state
    }

    pub fn release_id(&self) -> &str {
        &self.release_id
    }

    pub fn logger(&self) -> Arc<ReleaseLogger> {
        Arc::clone(&self.logger)
    }

    /// Expose the error handler so callers can register custom recoveries
    pub fn error_handler(&self) -> &ErrorHandler {
        &self.handler
    }

    /// Register an extra version rule before execution
    pub fn add_version_rule(&mut self, rule: crate::engine::VersionRule) {
        self.engine.add_rule(rule);
    }

    /// Analysis and version decision only, with no side effects beyond logs
    pub fn preview(
        &mut self,
        commits: &[String],
        file_changes: &[FileChange],
        current_version: &str,
    ) -> Result<VersionDecision> {
        let current = Version::parse(current_version)?;
        let analysis = self.analyze(commits, file_changes);
        Ok(self.decide(&current, &analysis))
    }

    /// Run the whole release.
    ///
    /// The returned [ReleaseResult] is produced in every case; `success`
    /// and `error` carry the outcome, and every stage result gathered
    /// before an abort is retained.
    pub fn execute(
        &mut self,
        commits: &[String],
        file_changes: &[FileChange],
        current_version: &str,
        options: RunOptions,
    ) -> ReleaseResult {
        let started = Instant::now();
        let mut result = ReleaseResult {
            release_id: self.release_id.clone(),
            success: false,
            state: ReleaseState::Idle,
            previous_version: current_version.to_string(),
            new_version: String::new(),
            bump: Bump::None,
            analysis: None,
            decision: None,
            build_results: Vec::new(),
            test_results: Vec::new(),
            deploy_results: Vec::new(),
            duration_ms: 0,
            error: None,
        };

        self.logger.info(
            "Starting release pipeline",
            Some(json!({
                "release_id": self.release_id,
                "project": self.project_name,
                "current_version": current_version,
            })),
        );

        let current = match Version::parse(current_version) {
            Ok(version) => version,
            Err(e) => {
                let failure = ReleaseFailure::fatal(
                    ErrorCode::VersionParse,
                    Stage::Analysis,
                    "Failed to parse current version",
                )
                .with_cause(&e);
                return self.finish_failed(result, failure, started);
            }
        };

        let analysis = self.analyze(commits, file_changes);
        result.analysis = Some(analysis.clone());

        let decision = self.decide(&current, &analysis);
        result.new_version = decision.new.to_string();
        result.bump = decision.bump;
        if decision.requires_approval {
            self.logger.warn(
                "Version bump requires manual approval",
                Some(json!({
                    "current_version": decision.current.to_string(),
                    "new_version": decision.new.to_string(),
                    "bump": decision.bump.to_string(),
                    "reason": decision.reason,
                })),
            );
        }
        let new_version = decision.new.clone();
        result.decision = Some(decision);

        // Build
        self.state = ReleaseState::Building;
        let (build_results, build_failure) =
            self.build_manager.build(&new_version, &self.project_name);
        result.build_results = build_results;
        if let Some(failure) = build_failure {
            if let Err(failure) = self.handler.handle(failure) {
                return self.finish_failed(result, failure, started);
            }
        }

        // Test
        self.state = ReleaseState::Testing;
        if options.skip_tests {
            self.logger
                .info("Test stage skipped by request", None);
        } else {
            let (test_results, test_failure) = self.test_manager.run_tests();
            result.test_results = test_results;
            if let Some(failure) = test_failure {
                if let Err(failure) = self.handler.handle(failure) {
                    return self.finish_failed(result, failure, started);
                }
            }
        }

        // Deploy
        self.state = ReleaseState::Deploying;
        if options.skip_deploy {
            self.logger
                .info("Deploy stage skipped by request", None);
        } else {
            let (deploy_results, deploy_failure) =
                self.deploy_manager.deploy(&new_version, &current);
            result.deploy_results = deploy_results;
            if let Some(failure) = deploy_failure {
                // Recovery policy decides logging; the run is failed either way
                let _ = self.handler.handle(failure.clone());
                return self.finish_failed(result, failure, started);
            }
        }

        self.state = ReleaseState::Completed;
        self.logger.set_stage(Stage::Complete);
        result.state = self.state;
        result.success = true;
        result.duration_ms = started.elapsed().as_millis() as u64;
        self.logger.info(
            "Release pipeline completed",
            Some(json!({
                "success": true,
                "duration_ms": result.duration_ms,
            })),
        );
        result
    }

    fn analyze(&mut self, commits: &[String], file_changes: &[FileChange]) -> ChangeAnalysisResult {
        self.state = ReleaseState::Analyzing;
        self.logger.set_stage(Stage::Analysis);
        self.logger.info(
            "Analyzing code changes",
            Some(json!({
                "commits": commits.len(),
                "file_changes": file_changes.len(),
            })),
        );

        let analysis = self.analyzer.analyze_changes(commits, file_changes);

        self.logger.info(
            "Change analysis completed",
            Some(json!({
                "breaking_changes": analysis.breaking_changes,
                "new_features": analysis.new_features,
                "bug_fixes": analysis.bug_fixes,
                "suggested_bump": analysis.suggested_bump.to_string(),
                "confidence": analysis.confidence,
            })),
        );
        analysis
    }

    fn decide(&mut self, current: &Version, analysis: &ChangeAnalysisResult) -> VersionDecision {
        self.state = ReleaseState::VersionDeciding;
        self.logger.set_stage(Stage::VersionDecision);
        self.logger.info(
            "Determining version bump",
            Some(json!({ "current_version": current.to_string() })),
        );

        let decision = self.engine.decide(current, analysis);

        self.logger.info(
            "Version decision made",
            Some(json!({
                "current_version": decision.current.to_string(),
                "new_version": decision.new.to_string(),
                "bump": decision.bump.to_string(),
                "reason": decision.reason,
                "confidence": decision.confidence,
                "requires_approval": decision.requires_approval,
            })),
        );
        decision
    }

    fn finish_failed(
        &mut self,
        mut result: ReleaseResult,
        failure: ReleaseFailure,
        started: Instant,
    ) -> ReleaseResult {
        self.state = ReleaseState::Failed;

        // Failed moves to RolledBack only when the rollback's health
        // re-check actually came back healthy
        let rolled_back = result
            .deploy_results
            .iter()
            .filter_map(|r| r.rollback.as_ref())
            .any(|rollback| rollback.success);
        if rolled_back {
            self.state = ReleaseState::RolledBack;
        }

        result.state = self.state;
        result.success = false;
        result.error = Some(failure.to_string());
        result.duration_ms = started.elapsed().as_millis() as u64;
        self.logger.info(
            "Release pipeline completed",
            Some(json!({
                "success": false,
                "state": self.state.to_string(),
                "duration_ms": result.duration_ms,
            })),
        );
        result
    }
}

fn generate_release_id() -> String {
    format!("release-{}", Utc::now().timestamp_millis())
}
