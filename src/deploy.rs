use crate::config::{DeployConfig, EnvironmentConfig};
use crate::domain::{TaskStatus, Version};
use crate::error::{ErrorCode, ReleaseFailure};
use crate::logger::{ReleaseLogger, Stage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rollout strategy for one environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStrategy {
    Rolling,
    BlueGreen,
    Canary,
}

impl DeployStrategy {
    /// Unknown strategy names fall back to rolling
    fn parse(name: &str) -> Self {
        match name {
            "blue-green" => DeployStrategy::BlueGreen,
            "canary" => DeployStrategy::Canary,
            _ => DeployStrategy::Rolling,
        }
    }
}

/// Record of a rollback attempt after a failed deployment
#[derive(Debug, Clone, Serialize)]
pub struct RollbackInfo {
    pub previous_version: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub success: bool,
}

/// Outcome of deploying to one environment
#[derive(Debug, Clone, Serialize)]
pub struct DeployResult {
    pub environment: String,
    pub status: TaskStatus,
    pub version: String,
    pub health_check_url: String,
    pub healthy: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackInfo>,
}

/// Deploys to each auto-deploy environment in order, health-checking every
/// rollout and rolling back automatically when configured to.
///
/// The first failed environment halts the run; results for environments that
/// completed are kept. Under the "automatic" rollback strategy a failure
/// triggers a rollback and a second health check, whose outcome decides
/// whether the failure stays recoverable or escalates.
pub struct DeployManager {
    config: DeployConfig,
    logger: Arc<ReleaseLogger>,
}

impl DeployManager {
    pub fn new(config: DeployConfig, logger: Arc<ReleaseLogger>) -> Self {
        DeployManager { config, logger }
    }

    pub fn deploy(
        &self,
        version: &Version,
        previous: &Version,
    ) -> (Vec<DeployResult>, Option<ReleaseFailure>) {
        if !self.config.enabled {
            self.logger
                .info("Deployment is disabled in configuration", None);
            return (Vec::new(), None);
        }

        self.logger.set_stage(Stage::Deploy);
        self.logger.info(
            "Starting deployment process",
            Some(json!({
                "version": version.to_string(),
                "environments": self.config.environments.len(),
            })),
        );

        let mut results = Vec::new();
        for env in &self.config.environments {
            if !env.auto_deploy {
                self.logger.info(
                    "Skipping environment (auto-deploy disabled)",
                    Some(json!({ "environment": env.name })),
                );
                continue;
            }

            let mut result = self.deploy_to_environment(env, version);
            if result.status.is_failed() {
                let reason = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "deployment failed".to_string());
                let code = if result.healthy {
                    ErrorCode::DeployFailed
                } else {
                    ErrorCode::HealthCheckFailed
                };

                let mut failure = ReleaseFailure::recoverable(
                    code,
                    Stage::Deploy,
                    format!("deployment failed for environment {}", env.name),
                )
                .with_cause(&reason);

                if self.config.rollback_strategy == "automatic" {
                    let rollback = self.rollback(env, previous, &reason);
                    if !rollback.success {
                        // A failed rollback leaves the environment broken
                        failure = ReleaseFailure::fatal(
                            ErrorCode::RollbackFailed,
                            Stage::Rollback,
                            format!("rollback failed for environment {}", env.name),
                        )
                        .with_cause(&reason);
                    }
                    result.rollback = Some(rollback);
                }

                results.push(result);
                return (results, Some(failure));
            }

            results.push(result);
        }

        self.logger.info(
            "Deployment process completed",
            Some(json!({ "deployments": results.len() })),
        );
        (results, None)
    }

    fn deploy_to_environment(&self, env: &EnvironmentConfig, version: &Version) -> DeployResult {
        let started = Instant::now();
        let health_url = self.health_check_url(env);
        let mut result = DeployResult {
            environment: env.name.clone(),
            status: TaskStatus::Running,
            version: version.to_string(),
            health_check_url: health_url.clone(),
            healthy: false,
            duration_ms: 0,
            error: None,
            rollback: None,
        };

        self.logger.info(
            "Deploying to environment",
            Some(json!({
                "environment": env.name,
                "version": version.to_string(),
                "strategy": env.deploy_strategy,
            })),
        );

        self.run_strategy(DeployStrategy::parse(&env.deploy_strategy), env);

        let checker = HealthChecker::new(self.config.clone(), Arc::clone(&self.logger));
        result.healthy = checker.check(&health_url);
        result.duration_ms = started.elapsed().as_millis() as u64;

        if !result.healthy {
            result.status = TaskStatus::Failed;
            result.error = Some("health check failed".to_string());
            return result;
        }

        result.status = TaskStatus::Success;
        self.logger.info(
            "Deployment successful",
            Some(json!({
                "environment": env.name,
                "version": version.to_string(),
                "duration_ms": result.duration_ms,
            })),
        );
        result
    }

    // Rollout actions are stand-ins for the real orchestration layer
    fn run_strategy(&self, strategy: DeployStrategy, env: &EnvironmentConfig) {
        let label = match strategy {
            DeployStrategy::Rolling => "Executing rolling deployment",
            DeployStrategy::BlueGreen => "Executing blue-green deployment",
            DeployStrategy::Canary => "Executing canary deployment",
        };
        self.logger
            .debug(label, Some(json!({ "environment": env.name })));
    }

    fn rollback(
        &self,
        env: &EnvironmentConfig,
        previous: &Version,
        reason: &str,
    ) -> RollbackInfo {
        self.logger.set_stage(Stage::Rollback);
        self.logger.warn(
            "Initiating rollback",
            Some(json!({ "environment": env.name, "reason": reason })),
        );

        // Stand-in rollback procedure; the re-check decides success
        self.logger.debug(
            "Executing rollback procedure",
            Some(json!({ "environment": env.name })),
        );

        let checker = HealthChecker::new(self.config.clone(), Arc::clone(&self.logger));
        let healthy = checker.check(&self.health_check_url(env));

        let info = RollbackInfo {
            previous_version: previous.to_string(),
            timestamp: Utc::now(),
            reason: reason.to_string(),
            success: healthy,
        };

        if info.success {
            self.logger.info(
                "Rollback successful",
                Some(json!({
                    "environment": env.name,
                    "previous_version": info.previous_version,
                })),
            );
        } else {
            self.logger.error(
                "Rollback failed",
                Some("health check failed after rollback"),
                Some(json!({ "environment": env.name })),
            );
        }
        info
    }

    fn health_check_url(&self, env: &EnvironmentConfig) -> String {
        if !env.health_check_url.is_empty() {
            return env.health_check_url.clone();
        }
        let base = env
            .variables
            .get("BASE_URL")
            .cloned()
            .unwrap_or_else(|| "http://localhost:8080".to_string());
        format!("{}{}", base, self.config.health_check_path)
    }
}

/// Timed HTTP health probe; any 2xx response counts as healthy
pub struct HealthChecker {
    config: DeployConfig,
    logger: Arc<ReleaseLogger>,
}

impl HealthChecker {
    pub fn new(config: DeployConfig, logger: Arc<ReleaseLogger>) -> Self {
        HealthChecker { config, logger }
    }

    pub fn check(&self, url: &str) -> bool {
        self.logger
            .debug("Performing health check", Some(json!({ "url": url })));

        let client = match reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.health_check_timeout_secs))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                self.logger
                    .error("Failed to build health check client", Some(&e.to_string()), None);
                return false;
            }
        };

        match client.get(url).send() {
            Ok(response) => {
                let healthy = response.status().is_success();
                self.logger.debug(
                    "Health check completed",
                    Some(json!({
                        "url": url,
                        "status": response.status().as_u16(),
                        "healthy": healthy,
                    })),
                );
                healthy
            }
            Err(e) => {
                self.logger
                    .error("Health check request failed", Some(&e.to_string()), None);
                false
            }
        }
    }

    /// Probe up to `max_retries` times, sleeping `interval` between attempts
    pub fn check_with_retry(&self, url: &str, max_retries: u32, interval: Duration) -> bool {
        for attempt in 0..max_retries {
            if self.check(url) {
                return true;
            }
            if attempt + 1 < max_retries {
                self.logger.debug(
                    "Health check failed, retrying",
                    Some(json!({ "attempt": attempt + 1, "max_tries": max_retries })),
                );
                std::thread::sleep(interval);
            }
        }
        false
    }
}
