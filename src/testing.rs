use crate::config::TestConfig;
use crate::domain::TaskStatus;
use crate::error::{ErrorCode, ReleaseFailure};
use crate::logger::{ReleaseLogger, Stage};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one test suite run
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub suite: String,
    pub status: TaskStatus,
    pub coverage: f64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub test_log: String,
}

/// Runs the configured test suites and enforces the coverage gate.
///
/// Suites run sequentially or fan out via rayon depending on configuration.
/// Sequential runs abort as soon as a required suite fails; in parallel mode
/// there is no cross-task cancellation, so the required check happens after
/// the join. Coverage is averaged over the suites that reported a value and
/// compared against the configured minimum afterwards.
pub struct TestManager {
    config: TestConfig,
    logger: Arc<ReleaseLogger>,
}

impl TestManager {
    pub fn new(config: TestConfig, logger: Arc<ReleaseLogger>) -> Self {
        TestManager { config, logger }
    }

    pub fn run_tests(&self) -> (Vec<TestResult>, Option<ReleaseFailure>) {
        if !self.config.enabled {
            self.logger
                .info("Tests are disabled in configuration", None);
            return (Vec::new(), None);
        }

        self.logger.set_stage(Stage::Test);
        self.logger.info(
            "Starting test execution",
            Some(json!({
                "suites": self.config.suites,
                "min_coverage": self.config.min_coverage,
                "parallel": self.config.parallel,
            })),
        );

        let (results, aborted) = if self.config.parallel {
            let results: Vec<TestResult> = self
                .config
                .suites
                .par_iter()
                .map(|suite| self.run_suite(suite))
                .collect();
            let aborted = results
                .iter()
                .find(|r| r.status.is_failed() && self.is_required(&r.suite))
                .map(|r| self.required_failure(&r.suite));
            (results, aborted)
        } else {
            let mut results = Vec::with_capacity(self.config.suites.len());
            let mut aborted = None;
            for suite in &self.config.suites {
                let result = self.run_suite(suite);
                let failed_required = result.status.is_failed() && self.is_required(suite);
                results.push(result);
                if failed_required {
                    aborted = Some(self.required_failure(suite));
                    break;
                }
            }
            (results, aborted)
        };

        if let Some(failure) = aborted {
            return (results, Some(failure));
        }

        if let Some(failure) = self.validate_coverage(&results) {
            return (results, Some(failure));
        }

        self.logger.info(
            "Test execution completed",
            Some(json!({
                "total_suites": results.len(),
                "passed": results.iter().filter(|r| r.status.is_success()).count(),
                "failed": results.iter().filter(|r| r.status.is_failed()).count(),
            })),
        );
        (results, None)
    }

    fn run_suite(&self, suite: &str) -> TestResult {
        let started = Instant::now();
        self.logger
            .debug("Running test suite", Some(json!({ "suite": suite })));

        let mut result = TestResult {
            suite: suite.to_string(),
            status: TaskStatus::Running,
            coverage: 0.0,
            duration_ms: 0,
            error: None,
            test_log: String::new(),
        };

        let mut command = Command::new(&self.config.command);
        command.arg("--coverage");
        if self.config.parallel {
            command.arg("--workers=4");
        }
        command.arg(suite);

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match crate::process::run_with_timeout(&mut command, timeout) {
            Ok(run) => {
                result.test_log = run.output.clone();
                if run.timed_out {
                    result.error = Some(format!(
                        "test suite timed out after {}s",
                        self.config.timeout_secs
                    ));
                    result.status = TaskStatus::Failed;
                } else if !run.success {
                    result.error =
                        Some(format!("test runner exited with {:?}", run.exit_code));
                    result.status = TaskStatus::Failed;
                } else {
                    result.status = TaskStatus::Success;
                    result.coverage = parse_coverage(&run.output);
                }
            }
            Err(e) => {
                result.error = Some(format!("cannot spawn test runner: {}", e));
                result.status = TaskStatus::Failed;
            }
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        if result.status.is_failed() {
            self.logger.error(
                "Test suite failed",
                result.error.as_deref(),
                Some(json!({ "suite": suite })),
            );
        } else {
            self.logger.debug(
                "Test suite completed",
                Some(json!({
                    "suite": suite,
                    "coverage": result.coverage,
                    "duration_ms": result.duration_ms,
                })),
            );
        }
        result
    }

    fn is_required(&self, suite: &str) -> bool {
        self.config
            .required_tests
            .iter()
            .any(|required| suite.contains(required.as_str()))
    }

    fn required_failure(&self, suite: &str) -> ReleaseFailure {
        ReleaseFailure::fatal(
            ErrorCode::TestFailed,
            Stage::Test,
            format!("required test suite {} failed", suite),
        )
    }

    /// Mean coverage over the suites that reported a value, against the gate
    fn validate_coverage(&self, results: &[TestResult]) -> Option<ReleaseFailure> {
        let reporting: Vec<f64> = results
            .iter()
            .filter(|r| r.status.is_success() && r.coverage > 0.0)
            .map(|r| r.coverage)
            .collect();
        if reporting.is_empty() {
            return None;
        }

        let average = reporting.iter().sum::<f64>() / reporting.len() as f64;
        if average < self.config.min_coverage {
            return Some(ReleaseFailure::fatal(
                ErrorCode::TestFailed,
                Stage::Test,
                format!(
                    "coverage {:.2}% is below minimum threshold {:.2}%",
                    average * 100.0,
                    self.config.min_coverage * 100.0
                ),
            ));
        }
        None
    }
}

/// Extract a `coverage: NN.N%` figure from runner output, as a fraction
fn parse_coverage(output: &str) -> f64 {
    for line in output.lines() {
        if !line.contains("coverage:") {
            continue;
        }
        let mut fields = line.split_whitespace().peekable();
        while let Some(field) = fields.next() {
            if field == "coverage:" {
                if let Some(value) = fields.peek() {
                    if let Ok(percent) = value.trim_end_matches('%').parse::<f64>() {
                        return percent / 100.0;
                    }
                }
            }
        }
    }
    0.0
}
