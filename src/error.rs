use crate::logger::Stage;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Unified error type for release-pilot operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Version parsing error: {0}")]
    Version(String),

    #[error("Source control error: {0}")]
    Scm(String),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Failure(#[from] ReleaseFailure),
}

/// Convenience type alias for Results in release-pilot
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// Create a version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        ReleaseError::Version(msg.into())
    }

    /// Create a source control error with context
    pub fn scm(msg: impl Into<String>) -> Self {
        ReleaseError::Scm(msg.into())
    }
}

/// Stable failure codes used for error dispatch and log records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    VersionParse,
    BuildFailed,
    TestFailed,
    DeployFailed,
    HealthCheckFailed,
    RollbackFailed,
    ConfigInvalid,
    SourceControl,
    Network,
    Timeout,
    PermissionDenied,
}

impl ErrorCode {
    /// Stable textual code, part of the log/export format
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::VersionParse => "VERSION_PARSE_ERROR",
            ErrorCode::BuildFailed => "BUILD_FAILED",
            ErrorCode::TestFailed => "TEST_FAILED",
            ErrorCode::DeployFailed => "DEPLOY_FAILED",
            ErrorCode::HealthCheckFailed => "HEALTH_CHECK_FAILED",
            ErrorCode::RollbackFailed => "ROLLBACK_FAILED",
            ErrorCode::ConfigInvalid => "CONFIG_INVALID",
            ErrorCode::SourceControl => "SCM_ERROR",
            ErrorCode::Network => "NETWORK_ERROR",
            ErrorCode::Timeout => "TIMEOUT_ERROR",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed stage failure carrying dispatch metadata.
///
/// Every failure that can abort a release stage is wrapped in one of these
/// before it reaches the error handler, so the handler can decide between
/// recovery and abort by code and recoverability.
#[derive(Error, Debug, Clone)]
#[error("[{}] {message}{}", .code.as_str(), .cause.as_ref().map(|c| format!(": {}", c)).unwrap_or_default())]
pub struct ReleaseFailure {
    pub code: ErrorCode,
    pub stage: Stage,
    pub message: String,
    pub cause: Option<String>,
    pub recoverable: bool,
    pub timestamp: DateTime<Utc>,
}

impl ReleaseFailure {
    /// Create a failure with the current timestamp
    pub fn new(
        code: ErrorCode,
        stage: Stage,
        message: impl Into<String>,
        cause: Option<String>,
        recoverable: bool,
    ) -> Self {
        ReleaseFailure {
            code,
            stage,
            message: message.into(),
            cause,
            recoverable,
            timestamp: Utc::now(),
        }
    }

    /// Fatal failure (aborts the stage unless a custom handler intervenes)
    pub fn fatal(code: ErrorCode, stage: Stage, message: impl Into<String>) -> Self {
        ReleaseFailure::new(code, stage, message, None, false)
    }

    /// Recoverable failure (eligible for policy recovery)
    pub fn recoverable(code: ErrorCode, stage: Stage, message: impl Into<String>) -> Self {
        ReleaseFailure::new(code, stage, message, None, true)
    }

    /// Attach the original error text
    pub fn with_cause(mut self, cause: impl ToString) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReleaseError::config("missing trigger branches");
        assert_eq!(
            err.to_string(),
            "Configuration error: missing trigger branches"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ReleaseError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_constructors() {
        assert!(ReleaseError::version("bad").to_string().contains("Version"));
        assert!(ReleaseError::scm("bad")
            .to_string()
            .contains("Source control"));
    }

    #[test]
    fn test_failure_display_with_cause() {
        let failure = ReleaseFailure::fatal(ErrorCode::BuildFailed, Stage::Build, "build broke")
            .with_cause("exit status 1");
        assert_eq!(
            failure.to_string(),
            "[BUILD_FAILED] build broke: exit status 1"
        );
    }

    #[test]
    fn test_failure_display_without_cause() {
        let failure =
            ReleaseFailure::recoverable(ErrorCode::DeployFailed, Stage::Deploy, "deploy broke");
        assert_eq!(failure.to_string(), "[DEPLOY_FAILED] deploy broke");
        assert!(failure.recoverable);
    }

    #[test]
    fn test_error_codes_are_stable() {
        let pairs = [
            (ErrorCode::VersionParse, "VERSION_PARSE_ERROR"),
            (ErrorCode::BuildFailed, "BUILD_FAILED"),
            (ErrorCode::TestFailed, "TEST_FAILED"),
            (ErrorCode::DeployFailed, "DEPLOY_FAILED"),
            (ErrorCode::HealthCheckFailed, "HEALTH_CHECK_FAILED"),
            (ErrorCode::RollbackFailed, "ROLLBACK_FAILED"),
            (ErrorCode::ConfigInvalid, "CONFIG_INVALID"),
            (ErrorCode::SourceControl, "SCM_ERROR"),
            (ErrorCode::Network, "NETWORK_ERROR"),
            (ErrorCode::Timeout, "TIMEOUT_ERROR"),
            (ErrorCode::PermissionDenied, "PERMISSION_DENIED"),
        ];
        for (code, text) in pairs {
            assert_eq!(code.as_str(), text);
        }
    }
}
