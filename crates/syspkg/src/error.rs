//! Error types for system package operations.
//!
//! Errors are categorized so callers can print the right advice. Every
//! package failure is fatal to provisioning; nothing here retries.

use thiserror::Error;

/// Categories of package errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Mirror or repository unreachable
    Network,
    /// Package not known to the package manager
    NotFound,
    /// Not running as root, or the package database is locked
    Permission,
    /// Distribution not supported
    Unsupported,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Package repository unreachable",
            Self::NotFound => "Package not found",
            Self::Permission => "Permission denied",
            Self::Unsupported => "Unsupported distribution",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check network access to the distribution mirrors",
            Self::NotFound => "Enable the repository that ships the package (e.g. EPEL on CentOS)",
            Self::Permission => "Run as root and make sure no other package manager is running",
            Self::Unsupported => "Supported: Debian, Ubuntu, CentOS and Fedora",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during package operations.
#[derive(Debug, Error)]
pub enum Error {
    /// None of the known distribution markers were found
    #[error("unsupported operating system: no known distribution marker found")]
    UnsupportedOs,

    /// Querying installed state failed to run at all
    #[error("failed to query package {package}: {message}")]
    Query {
        /// Package being queried
        package: String,
        /// Underlying error
        message: String,
    },

    /// The package manager exited unsuccessfully
    #[error("failed to install {}: {message}", packages.join(", "))]
    InstallFailed {
        /// Packages in the failed transaction
        packages: Vec<String>,
        /// Standard error output from the failed command
        message: String,
    },

    /// Refreshing package metadata failed
    #[error("failed to refresh package lists: {message}")]
    RefreshFailed {
        /// Standard error output from the failed command
        message: String,
    },
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnsupportedOs => ErrorCategory::Unsupported,
            Error::Query { .. } => ErrorCategory::Other,
            Error::InstallFailed { message, .. } | Error::RefreshFailed { message } => {
                categorize(message)
            }
        }
    }
}

/// Classify package manager stderr.
fn categorize(stderr: &str) -> ErrorCategory {
    let lower = stderr.to_lowercase();

    if lower.contains("could not resolve")
        || lower.contains("temporary failure")
        || lower.contains("failed to fetch")
        || lower.contains("cannot download")
        || lower.contains("timed out")
    {
        return ErrorCategory::Network;
    }

    if lower.contains("unable to locate package")
        || lower.contains("no package")
        || lower.contains("no match for argument")
    {
        return ErrorCategory::NotFound;
    }

    if lower.contains("permission denied")
        || lower.contains("are you root")
        || lower.contains("could not get lock")
    {
        return ErrorCategory::Permission;
    }

    ErrorCategory::Other
}

/// Result type alias for package operations.
pub type Result<T> = std::result::Result<T, Error>;
