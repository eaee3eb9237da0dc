use crate::config::{BuildConfig, PlatformConfig};
use crate::domain::{TaskStatus, Version};
use crate::error::{ErrorCode, ReleaseFailure};
use crate::logger::{ReleaseLogger, Stage};
use crate::process::{self, ProcessOutput};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of compiling one platform target
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub platform: PlatformConfig,
    pub status: TaskStatus,
    pub output_path: String,
    pub size_bytes: u64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub build_log: String,
}

/// Compiles every configured platform concurrently.
///
/// Each platform gets its own compiler invocation with the target exported
/// through `RELEASE_TARGET_OS` / `RELEASE_TARGET_ARCH` and the expected
/// artifact location through `RELEASE_ARTIFACT`. A build succeeds only when
/// the command exits zero and the artifact file actually exists.
pub struct BuildManager {
    config: BuildConfig,
    logger: Arc<ReleaseLogger>,
}

impl BuildManager {
    pub fn new(config: BuildConfig, logger: Arc<ReleaseLogger>) -> Self {
        BuildManager { config, logger }
    }

    /// Build all platforms; every per-platform result is returned even when
    /// some fail, alongside one aggregate failure if any did.
    pub fn build(
        &self,
        version: &Version,
        project_name: &str,
    ) -> (Vec<BuildResult>, Option<ReleaseFailure>) {
        self.logger.set_stage(Stage::Build);
        self.logger.info(
            "Starting build process",
            Some(json!({
                "version": version.to_string(),
                "platforms": self.config.platforms.len(),
            })),
        );

        let results: Vec<BuildResult> = self
            .config
            .platforms
            .par_iter()
            .map(|platform| self.build_platform(platform, version, project_name))
            .collect();

        let failed = results.iter().filter(|r| r.status.is_failed()).count();
        if failed > 0 {
            let failure = ReleaseFailure::fatal(
                ErrorCode::BuildFailed,
                Stage::Build,
                format!("build failed for {} platform(s)", failed),
            );
            return (results, Some(failure));
        }

        self.logger.info(
            "Build process completed",
            Some(json!({ "artifacts": results.len() })),
        );
        (results, None)
    }

    fn build_platform(
        &self,
        platform: &PlatformConfig,
        version: &Version,
        project_name: &str,
    ) -> BuildResult {
        let started = Instant::now();
        self.logger.debug(
            "Building platform",
            Some(json!({ "os": platform.os, "arch": platform.arch })),
        );

        let artifact = self.artifact_name(project_name, version, platform);
        let output_path = Path::new(&self.config.output_dir).join(&artifact);

        let mut result = BuildResult {
            platform: platform.clone(),
            status: TaskStatus::Running,
            output_path: output_path.display().to_string(),
            size_bytes: 0,
            duration_ms: 0,
            error: None,
            build_log: String::new(),
        };

        if let Err(e) = fs::create_dir_all(&self.config.output_dir) {
            return self.fail(result, started, format!("cannot create output dir: {}", e));
        }

        match self.run_compiler(platform, version, &output_path) {
            Ok(run) => {
                result.build_log = run.output.clone();
                if run.timed_out {
                    let msg = format!(
                        "build timed out after {}s",
                        self.config.timeout_secs
                    );
                    return self.fail(result, started, msg);
                }
                if !run.success {
                    let msg = format!(
                        "build command failed with exit code {:?}",
                        run.exit_code
                    );
                    return self.fail(result, started, msg);
                }
            }
            Err(e) => {
                return self.fail(result, started, format!("cannot spawn compiler: {}", e));
            }
        }

        // Zero exit alone is not enough; the artifact must exist
        match fs::metadata(&output_path) {
            Ok(meta) => result.size_bytes = meta.len(),
            Err(_) => {
                let msg = format!("artifact missing after build: {}", output_path.display());
                return self.fail(result, started, msg);
            }
        }

        result.status = TaskStatus::Success;
        result.duration_ms = started.elapsed().as_millis() as u64;
        self.logger.debug(
            "Build completed for platform",
            Some(json!({
                "os": platform.os,
                "arch": platform.arch,
                "output": result.output_path,
                "size": result.size_bytes,
                "duration_ms": result.duration_ms,
            })),
        );
        result
    }

    fn run_compiler(
        &self,
        platform: &PlatformConfig,
        version: &Version,
        output_path: &Path,
    ) -> std::io::Result<ProcessOutput> {
        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .arg(format!("--version-stamp={}", version))
            .env("RELEASE_TARGET_OS", &platform.os)
            .env("RELEASE_TARGET_ARCH", &platform.arch)
            .env("RELEASE_ARTIFACT", output_path);
        process::run_with_timeout(&mut command, Duration::from_secs(self.config.timeout_secs))
    }

    fn fail(&self, mut result: BuildResult, started: Instant, message: String) -> BuildResult {
        result.status = TaskStatus::Failed;
        result.duration_ms = started.elapsed().as_millis() as u64;
        self.logger.error(
            "Build failed for platform",
            Some(&message),
            Some(json!({
                "os": result.platform.os,
                "arch": result.platform.arch,
            })),
        );
        result.error = Some(message);
        result
    }

    /// Render the artifact file name from the configured template
    fn artifact_name(
        &self,
        project_name: &str,
        version: &Version,
        platform: &PlatformConfig,
    ) -> String {
        self.config
            .artifact_naming
            .replace("{name}", project_name)
            .replace("{version}", &version.to_string())
            .replace("{os}", &platform.os)
            .replace("{arch}", &platform.arch)
            .replace("{suffix}", &platform.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingConfig;

    fn quiet_logger() -> Arc<ReleaseLogger> {
        let config = LoggingConfig {
            output_path: String::new(),
            ..LoggingConfig::default()
        };
        Arc::new(ReleaseLogger::new(config, "test-run").unwrap())
    }

    fn platform(os: &str, arch: &str, suffix: &str) -> PlatformConfig {
        PlatformConfig {
            os: os.to_string(),
            arch: arch.to_string(),
            suffix: suffix.to_string(),
        }
    }

    fn manager(dir: &Path, command: &str, args: &[&str], platforms: Vec<PlatformConfig>) -> BuildManager {
        let config = BuildConfig {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            platforms,
            output_dir: dir.display().to_string(),
            timeout_secs: 10,
            ..BuildConfig::default()
        };
        BuildManager::new(config, quiet_logger())
    }

    #[test]
    fn test_artifact_name_template() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), "true", &[], vec![]);
        let name = manager.artifact_name(
            "myapp",
            &Version::new(1, 2, 3),
            &platform("windows", "amd64", ".exe"),
        );
        assert_eq!(name, "myapp-1.2.3-windows-amd64.exe");

        let name = manager.artifact_name(
            "myapp",
            &Version::new(1, 2, 3),
            &platform("linux", "arm64", ""),
        );
        assert_eq!(name, "myapp-1.2.3-linux-arm64");
    }

    #[test]
    fn test_successful_build_records_artifact_size() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(
            dir.path(),
            "sh",
            &["-c", "printf content > \"$RELEASE_ARTIFACT\""],
            vec![platform("linux", "amd64", "")],
        );

        let (results, failure) = manager.build(&Version::new(1, 0, 0), "app");
        assert!(failure.is_none());
        assert_eq!(results.len(), 1);
        assert!(results[0].status.is_success());
        assert_eq!(results[0].size_bytes, 7);
    }

    #[test]
    fn test_target_environment_is_exported() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(
            dir.path(),
            "sh",
            &[
                "-c",
                "printf '%s/%s' \"$RELEASE_TARGET_OS\" \"$RELEASE_TARGET_ARCH\" > \"$RELEASE_ARTIFACT\"",
            ],
            vec![platform("darwin", "arm64", "")],
        );

        let (results, failure) = manager.build(&Version::new(2, 0, 0), "app");
        assert!(failure.is_none());
        let content = fs::read_to_string(&results[0].output_path).unwrap();
        assert_eq!(content, "darwin/arm64");
    }

    #[test]
    fn test_missing_artifact_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        // Command exits zero but never writes the artifact
        let manager = manager(
            dir.path(),
            "true",
            &[],
            vec![platform("linux", "amd64", "")],
        );

        let (results, failure) = manager.build(&Version::new(1, 0, 0), "app");
        assert!(results[0].status.is_failed());
        assert!(results[0].error.as_ref().unwrap().contains("artifact missing"));
        assert_eq!(failure.unwrap().code, ErrorCode::BuildFailed);
    }

    #[test]
    fn test_partial_failure_keeps_all_results() {
        let dir = tempfile::tempdir().unwrap();
        // Fails only for windows; other targets produce their artifact
        let manager = manager(
            dir.path(),
            "sh",
            &[
                "-c",
                "[ \"$RELEASE_TARGET_OS\" = windows ] && exit 1; printf ok > \"$RELEASE_ARTIFACT\"",
            ],
            vec![
                platform("linux", "amd64", ""),
                platform("windows", "amd64", ".exe"),
                platform("darwin", "arm64", ""),
            ],
        );

        let (results, failure) = manager.build(&Version::new(1, 0, 0), "app");
        assert_eq!(results.len(), 3);
        let failed: Vec<_> = results.iter().filter(|r| r.status.is_failed()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].platform.os, "windows");
        assert!(failure.unwrap().to_string().contains("1 platform(s)"));
    }

    #[test]
    fn test_build_timeout_fails_only_that_platform() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            command: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "[ \"$RELEASE_TARGET_OS\" = slow ] && exec sleep 30; printf ok > \"$RELEASE_ARTIFACT\""
                    .to_string(),
            ],
            platforms: vec![platform("linux", "amd64", ""), platform("slow", "amd64", "")],
            output_dir: dir.path().display().to_string(),
            timeout_secs: 1,
            ..BuildConfig::default()
        };
        let manager = BuildManager::new(config, quiet_logger());

        let (results, failure) = manager.build(&Version::new(1, 0, 0), "app");
        assert!(failure.is_some());
        let slow = results.iter().find(|r| r.platform.os == "slow").unwrap();
        assert!(slow.error.as_ref().unwrap().contains("timed out"));
        let fast = results.iter().find(|r| r.platform.os == "linux").unwrap();
        assert!(fast.status.is_success());
    }
}
