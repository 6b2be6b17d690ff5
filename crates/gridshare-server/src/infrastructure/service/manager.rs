//! Service-manager boundary: installing, removing and controlling the
//! gridshare service.
//!
//! The OS-specific installer lives behind the [`ServiceManager`] trait.  This
//! module holds the logic that sits on top of it and does not depend on any
//! OS: uninstalling with a bounded wait for the removal to take effect, and
//! rebuilding the argument list from the command line stored at install time.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for service-manager operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceControlError {
    #[error("service {0:?} is already installed")]
    AlreadyExists(String),

    #[error("service {0:?} is not installed")]
    NotInstalled(String),

    #[error("permission denied by the service manager")]
    PermissionDenied,

    #[error("service {name:?} was still installed after {attempts} checks")]
    Timeout { name: String, attempts: u32 },

    /// An OS error code with no specific meaning here.
    #[error("service manager error code {0}")]
    Unknown(i32),
}

/// Operations an OS service manager provides.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceManager: Send + Sync {
    /// Registers the service to run `command_line`.
    fn install(&self, name: &str, command_line: &str) -> Result<(), ServiceControlError>;

    /// Marks the service for removal.  Removal may complete later.
    fn uninstall(&self, name: &str) -> Result<(), ServiceControlError>;

    fn is_installed(&self, name: &str) -> Result<bool, ServiceControlError>;

    fn start(&self, name: &str) -> Result<(), ServiceControlError>;

    fn stop(&self, name: &str) -> Result<(), ServiceControlError>;

    /// The command line stored at install time, if any.
    fn stored_command_line(&self, name: &str) -> Option<String>;
}

/// How long [`uninstall_and_wait`] polls for the removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(100),
        }
    }
}

/// Stops and uninstalls `name`, then waits until the manager no longer
/// reports it as installed.
///
/// A failure to stop is logged and ignored; the service may simply not be
/// running.
///
/// # Errors
///
/// Returns the error from [`ServiceManager::uninstall`] or
/// [`ServiceManager::is_installed`], or [`ServiceControlError::Timeout`] if
/// the service is still present after `policy.attempts` checks.
pub fn uninstall_and_wait(
    manager: &dyn ServiceManager,
    name: &str,
    policy: RetryPolicy,
) -> Result<(), ServiceControlError> {
    if let Err(e) = manager.stop(name) {
        debug!(name, error = %e, "stop before uninstall failed");
    }
    manager.uninstall(name)?;

    for attempt in 1..=policy.attempts {
        if !manager.is_installed(name)? {
            info!(name, attempt, "service removed");
            return Ok(());
        }
        if attempt < policy.attempts {
            thread::sleep(policy.interval);
        }
    }

    warn!(name, attempts = policy.attempts, "service removal did not complete");
    Err(ServiceControlError::Timeout {
        name: name.to_string(),
        attempts: policy.attempts,
    })
}

/// Splits a stored command line into arguments.
///
/// Arguments are separated by spaces or tabs.  An argument starting with a
/// double quote runs to the next double quote and may contain whitespace;
/// the quotes are removed.  Returns `None` if a quote is never closed or the
/// closing quote is not followed by whitespace or the end of the line.
pub fn split_command_line(line: &str) -> Option<Vec<String>> {
    let is_blank = |c: char| c == ' ' || c == '\t';
    let mut args = Vec::new();
    let mut rest = line.trim_start_matches(is_blank);

    while !rest.is_empty() {
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"')?;
            let after = &quoted[end + 1..];
            if !after.is_empty() && !after.starts_with(is_blank) {
                return None;
            }
            args.push(quoted[..end].to_string());
            rest = after;
        } else {
            let end = rest.find(is_blank).unwrap_or(rest.len());
            args.push(rest[..end].to_string());
            rest = &rest[end..];
        }
        rest = rest.trim_start_matches(is_blank);
    }
    Some(args)
}

/// Arguments the service should run with.
///
/// `argv[0]` is the service name.  When nothing follows it, the stored
/// command line (if any) supplies the rest; a stored line that cannot be
/// split is ignored with a warning.
pub fn service_arguments(argv: &[String], stored: Option<&str>) -> Vec<String> {
    if argv.len() > 1 {
        return argv.to_vec();
    }
    let mut args: Vec<String> = argv.to_vec();
    let Some(line) = stored.filter(|l| !l.trim().is_empty()) else {
        return args;
    };
    match split_command_line(line) {
        Some(extra) => args.extend(extra),
        None => warn!(line, "stored command line is malformed; ignoring it"),
    }
    args
}
