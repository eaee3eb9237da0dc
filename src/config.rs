use crate::error::{ReleaseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Complete configuration for a release run.
///
/// Stored as a TOML document with one section per pipeline concern. Every
/// field carries a serde default so a partial file is always usable, and a
/// missing file is generated with the defaults on first load.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReleaseConfig {
    #[serde(default)]
    pub versioning: VersioningConfig,

    #[serde(default)]
    pub auto_release: AutoReleaseConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub test: TestConfig,

    #[serde(default)]
    pub deploy: DeployConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Versioning strategy and branch mappings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VersioningConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default)]
    pub prerelease_enabled: bool,

    #[serde(default = "default_prerelease_identifier")]
    pub prerelease_identifier: String,

    #[serde(default = "default_commit_message_patterns")]
    pub commit_message_patterns: Vec<String>,

    #[serde(default = "default_branch_patterns")]
    pub branch_patterns: HashMap<String, String>,
}

fn default_strategy() -> String {
    "semantic".to_string()
}

fn default_prerelease_identifier() -> String {
    "rc".to_string()
}

fn default_commit_message_patterns() -> Vec<String> {
    vec![
        r"^feat(\(.+\))?!?:".to_string(),
        r"^fix(\(.+\))?:".to_string(),
        r"^BREAKING CHANGE:".to_string(),
    ]
}

fn default_branch_patterns() -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("main".to_string(), "release".to_string());
    map.insert("develop".to_string(), "prerelease".to_string());
    map.insert("feature/*".to_string(), "none".to_string());
    map
}

impl Default for VersioningConfig {
    fn default() -> Self {
        VersioningConfig {
            strategy: default_strategy(),
            prerelease_enabled: false,
            prerelease_identifier: default_prerelease_identifier(),
            commit_message_patterns: default_commit_message_patterns(),
            branch_patterns: default_branch_patterns(),
        }
    }
}

/// Automatic release triggers and the approval advisory ceilings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AutoReleaseConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_trigger_branches")]
    pub trigger_branches: Vec<String>,

    #[serde(default = "default_true")]
    pub require_approval: bool,

    #[serde(default = "default_approval_threshold")]
    pub approval_threshold: f64,

    /// Scheduling policy read by external automation; parsed and preserved,
    /// not enforced by the pipeline itself.
    #[serde(default = "default_max_auto_bump_level")]
    pub max_auto_bump_level: String,

    #[serde(default = "default_quiet_period_hours")]
    pub quiet_period_hours: u32,

    #[serde(default = "default_min_commits_threshold")]
    pub min_commits_threshold: u32,

    #[serde(default = "default_max_files_changed")]
    pub max_files_changed: u32,

    #[serde(default = "default_max_lines_added")]
    pub max_lines_added: u32,
}

fn default_true() -> bool {
    true
}

fn default_trigger_branches() -> Vec<String> {
    vec!["main".to_string()]
}

fn default_approval_threshold() -> f64 {
    0.8
}

fn default_max_auto_bump_level() -> String {
    "minor".to_string()
}

fn default_quiet_period_hours() -> u32 {
    2
}

fn default_min_commits_threshold() -> u32 {
    1
}

fn default_max_files_changed() -> u32 {
    50
}

fn default_max_lines_added() -> u32 {
    2000
}

impl Default for AutoReleaseConfig {
    fn default() -> Self {
        AutoReleaseConfig {
            enabled: true,
            trigger_branches: default_trigger_branches(),
            require_approval: true,
            approval_threshold: default_approval_threshold(),
            max_auto_bump_level: default_max_auto_bump_level(),
            quiet_period_hours: default_quiet_period_hours(),
            min_commits_threshold: default_min_commits_threshold(),
            max_files_changed: default_max_files_changed(),
            max_lines_added: default_max_lines_added(),
        }
    }
}

/// One compilation target.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub os: String,
    pub arch: String,
    #[serde(default)]
    pub suffix: String,
}

/// Compiler invocation, target platforms, and artifact naming.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BuildConfig {
    #[serde(default = "default_build_command")]
    pub command: String,

    #[serde(default = "default_build_args")]
    pub args: Vec<String>,

    #[serde(default = "default_platforms")]
    pub platforms: Vec<PlatformConfig>,

    #[serde(default = "default_artifact_naming")]
    pub artifact_naming: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_build_timeout")]
    pub timeout_secs: u64,
}

fn default_build_command() -> String {
    "cargo".to_string()
}

fn default_build_args() -> Vec<String> {
    vec!["build".to_string(), "--release".to_string()]
}

fn default_platforms() -> Vec<PlatformConfig> {
    [
        ("windows", "amd64", ".exe"),
        ("windows", "arm64", ".exe"),
        ("linux", "amd64", ""),
        ("linux", "arm64", ""),
        ("darwin", "amd64", ""),
        ("darwin", "arm64", ""),
    ]
    .iter()
    .map(|(os, arch, suffix)| PlatformConfig {
        os: os.to_string(),
        arch: arch.to_string(),
        suffix: suffix.to_string(),
    })
    .collect()
}

fn default_artifact_naming() -> String {
    "{name}-{version}-{os}-{arch}{suffix}".to_string()
}

fn default_output_dir() -> String {
    "./dist".to_string()
}

fn default_build_timeout() -> u64 {
    1800
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            command: default_build_command(),
            args: default_build_args(),
            platforms: default_platforms(),
            artifact_naming: default_artifact_naming(),
            output_dir: default_output_dir(),
            cache_enabled: true,
            timeout_secs: default_build_timeout(),
        }
    }
}

/// Test suite execution and the coverage gate.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TestConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_test_command")]
    pub command: String,

    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,

    #[serde(default = "default_test_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_test_suites")]
    pub suites: Vec<String>,

    #[serde(default = "default_true")]
    pub parallel: bool,

    #[serde(default = "default_required_tests")]
    pub required_tests: Vec<String>,
}

fn default_test_command() -> String {
    "cargo".to_string()
}

fn default_min_coverage() -> f64 {
    0.8
}

fn default_test_timeout() -> u64 {
    600
}

fn default_test_suites() -> Vec<String> {
    vec!["unit".to_string(), "integration".to_string()]
}

fn default_required_tests() -> Vec<String> {
    vec!["unit".to_string(), "integration".to_string()]
}

impl Default for TestConfig {
    fn default() -> Self {
        TestConfig {
            enabled: true,
            command: default_test_command(),
            min_coverage: default_min_coverage(),
            timeout_secs: default_test_timeout(),
            suites: default_test_suites(),
            parallel: true,
            required_tests: default_required_tests(),
        }
    }
}

/// One deployment target.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EnvironmentConfig {
    pub name: String,

    #[serde(default)]
    pub env_type: String,

    #[serde(default)]
    pub auto_deploy: bool,

    #[serde(default = "default_deploy_strategy")]
    pub deploy_strategy: String,

    #[serde(default)]
    pub health_check_url: String,

    #[serde(default)]
    pub variables: HashMap<String, String>,
}

fn default_deploy_strategy() -> String {
    "rolling".to_string()
}

/// Environments, rollout strategies, and health checking.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeployConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_environments")]
    pub environments: Vec<EnvironmentConfig>,

    #[serde(default = "default_rollback_strategy")]
    pub rollback_strategy: String,

    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,

    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout_secs: u64,
}

fn default_environments() -> Vec<EnvironmentConfig> {
    vec![
        EnvironmentConfig {
            name: "staging".to_string(),
            env_type: "testing".to_string(),
            auto_deploy: true,
            deploy_strategy: "rolling".to_string(),
            health_check_url: String::new(),
            variables: HashMap::new(),
        },
        EnvironmentConfig {
            name: "production".to_string(),
            env_type: "production".to_string(),
            auto_deploy: false,
            deploy_strategy: "blue-green".to_string(),
            health_check_url: String::new(),
            variables: HashMap::new(),
        },
    ]
}

fn default_rollback_strategy() -> String {
    "automatic".to_string()
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_health_check_timeout() -> u64 {
    30
}

impl Default for DeployConfig {
    fn default() -> Self {
        DeployConfig {
            enabled: true,
            environments: default_environments(),
            rollback_strategy: default_rollback_strategy(),
            health_check_path: default_health_check_path(),
            health_check_timeout_secs: default_health_check_timeout(),
        }
    }
}

/// Notification channels. Parsed and passed through; delivery is not wired.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default)]
    pub webhooks: Vec<String>,
}

/// Audit log destination and rotation limits.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_path")]
    pub output_path: String,

    #[serde(default = "default_log_max_size")]
    pub max_size_mb: u64,

    #[serde(default = "default_log_max_backups")]
    pub max_backups: u32,

    #[serde(default = "default_log_max_age")]
    pub max_age_days: u32,

    #[serde(default = "default_true")]
    pub compress: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_path() -> String {
    "./logs/release.log".to_string()
}

fn default_log_max_size() -> u64 {
    100
}

fn default_log_max_backups() -> u32 {
    3
}

fn default_log_max_age() -> u32 {
    7
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            output_path: default_log_path(),
            max_size_mb: default_log_max_size(),
            max_backups: default_log_max_backups(),
            max_age_days: default_log_max_age(),
            compress: true,
        }
    }
}

impl ReleaseConfig {
    /// Load configuration from `path`, generating and persisting the defaults
    /// when the file does not exist yet.
    ///
    /// # Arguments
    /// * `path` - Location of the TOML configuration file
    ///
    /// # Returns
    /// * `Ok(ReleaseConfig)` - Loaded or freshly generated configuration
    /// * `Err` - If the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = ReleaseConfig::default();
            config.save(path)?;
            return Ok(config);
        }

        let text = fs::read_to_string(path)?;
        let config: ReleaseConfig = toml::from_str(&text)?;
        Ok(config)
    }

    /// Persist the configuration as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| ReleaseError::config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Check semantic constraints the type system cannot express.
    ///
    /// Negative rotation limits are already rejected at deserialization by
    /// the unsigned field types.
    pub fn validate(&self) -> Result<()> {
        if self.auto_release.enabled && self.auto_release.trigger_branches.is_empty() {
            return Err(ReleaseError::config(
                "auto release enabled but no trigger branches configured",
            ));
        }

        if self.test.enabled && !(0.0..=1.0).contains(&self.test.min_coverage) {
            return Err(ReleaseError::config(
                "test coverage must be between 0 and 1",
            ));
        }

        if self.logging.output_path.is_empty() {
            return Err(ReleaseError::config("logging output path cannot be empty"));
        }

        Ok(())
    }

    /// True when a push to `branch` should trigger an automatic release
    pub fn should_auto_release(&self, branch: &str) -> bool {
        self.auto_release.enabled
            && self
                .auto_release
                .trigger_branches
                .iter()
                .any(|trigger| trigger == branch)
    }

    /// Resolve the versioning strategy for `branch` via the configured glob
    /// patterns; unmatched branches get "none".
    pub fn branch_strategy(&self, branch: &str) -> String {
        for (pattern, strategy) in &self.versioning.branch_patterns {
            if let Ok(pattern) = glob::Pattern::new(pattern) {
                if pattern.matches(branch) {
                    return strategy.clone();
                }
            }
        }
        "none".to_string()
    }
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        ReleaseConfig {
            versioning: VersioningConfig::default(),
            auto_release: AutoReleaseConfig::default(),
            build: BuildConfig::default(),
            test: TestConfig::default(),
            deploy: DeployConfig::default(),
            notifications: NotificationsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Pick the configuration location for a project directory.
///
/// Prefers `release.toml` in the project, falling back to
/// `release-pilot/release.toml` under the user config directory.
pub fn default_config_path(project_dir: &Path) -> PathBuf {
    let local = project_dir.join("release.toml");
    if local.exists() {
        return local;
    }
    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("release-pilot").join("release.toml");
        if global.exists() {
            return global;
        }
    }
    local
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReleaseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.build.platforms.len(), 6);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: ReleaseConfig = toml::from_str(
            r#"
            [test]
            min_coverage = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.test.min_coverage, 0.5);
        assert!(config.test.parallel);
        assert_eq!(config.build.command, "cargo");
        assert_eq!(config.logging.max_backups, 3);
    }

    #[test]
    fn test_policy_fields_load_and_default() {
        let config: ReleaseConfig = toml::from_str(
            r#"
            [versioning]
            commit_message_patterns = ["^feat:"]

            [auto_release]
            max_auto_bump_level = "major"
            quiet_period_hours = 6

            [build]
            cache_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.versioning.commit_message_patterns, vec!["^feat:"]);
        assert_eq!(config.auto_release.max_auto_bump_level, "major");
        assert_eq!(config.auto_release.quiet_period_hours, 6);
        assert_eq!(config.auto_release.min_commits_threshold, 1);
        assert!(!config.build.cache_enabled);

        let defaults = ReleaseConfig::default();
        assert_eq!(defaults.auto_release.max_auto_bump_level, "minor");
        assert_eq!(defaults.auto_release.quiet_period_hours, 2);
        assert_eq!(defaults.auto_release.min_commits_threshold, 1);
        assert!(defaults.build.cache_enabled);
        assert_eq!(defaults.versioning.commit_message_patterns.len(), 3);
    }

    #[test]
    fn test_validate_rejects_missing_trigger_branches() {
        let mut config = ReleaseConfig::default();
        config.auto_release.trigger_branches.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_coverage() {
        let mut config = ReleaseConfig::default();
        config.test.min_coverage = 1.5;
        assert!(config.validate().is_err());

        config.test.min_coverage = -0.1;
        assert!(config.validate().is_err());

        // The gate is not checked when testing is disabled
        config.test.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_log_path() {
        let mut config = ReleaseConfig::default();
        config.logging.output_path.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_should_auto_release() {
        let config = ReleaseConfig::default();
        assert!(config.should_auto_release("main"));
        assert!(!config.should_auto_release("develop"));

        let mut disabled = config.clone();
        disabled.auto_release.enabled = false;
        assert!(!disabled.should_auto_release("main"));
    }

    #[test]
    fn test_branch_strategy_glob_patterns() {
        let config = ReleaseConfig::default();
        assert_eq!(config.branch_strategy("main"), "release");
        assert_eq!(config.branch_strategy("develop"), "prerelease");
        assert_eq!(config.branch_strategy("feature/login"), "none");
        assert_eq!(config.branch_strategy("hotfix/urgent"), "none");
    }
}
