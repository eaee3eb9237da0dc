use crate::error::{ErrorCode, ReleaseFailure};
use crate::logger::ReleaseLogger;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type RecoveryFn = Box<dyn Fn(&ReleaseFailure) -> Result<(), ReleaseFailure> + Send + Sync>;

/// Central failure dispatcher for the pipeline.
///
/// Every stage failure passes through [ErrorHandler::handle], which guarantees
/// an error-level audit record before any recovery decision. Callers may
/// register a recovery function per error code; unhandled recoverable
/// failures are logged and swallowed, unhandled fatal ones abort the stage.
pub struct ErrorHandler {
    logger: Arc<ReleaseLogger>,
    recoveries: Mutex<HashMap<ErrorCode, RecoveryFn>>,
}

impl ErrorHandler {
    pub fn new(logger: Arc<ReleaseLogger>) -> Self {
        ErrorHandler {
            logger,
            recoveries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a recovery function for one error code, replacing any
    /// previous registration.
    pub fn register<F>(&self, code: ErrorCode, recovery: F)
    where
        F: Fn(&ReleaseFailure) -> Result<(), ReleaseFailure> + Send + Sync + 'static,
    {
        let mut recoveries = self.recoveries.lock().unwrap_or_else(|e| e.into_inner());
        recoveries.insert(code, Box::new(recovery));
    }

    /// Dispatch a failure.
    ///
    /// # Returns
    /// * `Ok(())` - The failure was recovered and the stage may continue
    /// * `Err(failure)` - The failure stands and the stage must abort
    pub fn handle(&self, failure: ReleaseFailure) -> Result<(), ReleaseFailure> {
        // The audit record always lands before recovery is attempted
        self.logger.error(
            &failure.message,
            failure.cause.as_deref(),
            Some(json!({
                "code": failure.code.as_str(),
                "stage": failure.stage.to_string(),
                "recoverable": failure.recoverable,
            })),
        );

        let recoveries = self.recoveries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(recovery) = recoveries.get(&failure.code) {
            return recovery(&failure);
        }

        if failure.recoverable {
            self.logger.warn(
                &format!("Recovered from {} by policy, continuing", failure.code),
                None,
            );
            return Ok(());
        }

        Err(failure)
    }
}
