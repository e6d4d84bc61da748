//! Error types for artifact operations.
//!
//! Errors are categorized so the caller can pick appropriate user feedback.
//! Nothing in this crate retries; the category only drives the advice shown.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for artifact operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of artifact errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors.
    Network,
    /// CPU architecture not supported.
    Platform,
    /// Release, tag or asset not found.
    NotFound,
    /// Permission denied while writing files.
    Permission,
    /// Corrupt or malicious archive.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Platform => "Unsupported architecture",
            Self::NotFound => "Release or asset not found",
            Self::Permission => "Permission denied",
            Self::Format => "Invalid archive",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the host's internet connection and GitHub reachability",
            Self::Platform => "Only x86_64, aarch64 and armv7l hosts are supported",
            Self::NotFound => "Verify the repository and version are correct",
            Self::Permission => "Run as root or check directory permissions",
            Self::Format => "The downloaded archive may be corrupted, try again",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while resolving, fetching or extracting artifacts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `uname -m` reported a machine outside the supported set.
    #[error("unsupported CPU architecture: {machine}")]
    UnsupportedArch {
        /// Raw machine string.
        machine: String,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Downloading an archive failed.
    #[error("failed to fetch {url}: {message}")]
    Fetch {
        /// Source URL.
        url: String,
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Unpacking an archive failed.
    #[error("failed to extract {}: {message}", archive.display())]
    Extract {
        /// Archive being unpacked.
        archive: PathBuf,
        /// Error message.
        message: String,
    },

    /// No version was requested and the latest release could not be determined.
    #[error("could not resolve the latest release of {repo}")]
    VersionResolution {
        /// Repository queried.
        repo: String,
    },

    /// IO error during file operations.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Create an extraction error.
    pub fn extract(archive: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Extract {
            archive: archive.into(),
            message: message.to_string(),
        }
    }

    /// HTTP status attached to this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::Fetch { status, .. } => *status,
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnsupportedArch { .. } => ErrorCategory::Platform,
            Error::Http { status, .. } | Error::Fetch { status, .. } => {
                if *status == Some(404) {
                    ErrorCategory::NotFound
                } else {
                    ErrorCategory::Network
                }
            }
            Error::Extract { .. } => ErrorCategory::Format,
            Error::VersionResolution { .. } => ErrorCategory::NotFound,
            Error::Io { source, .. } => {
                if source.kind() == io::ErrorKind::PermissionDenied {
                    ErrorCategory::Permission
                } else {
                    ErrorCategory::Other
                }
            }
            Error::InvalidResponse(_) => ErrorCategory::Format,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_advice() {
        assert!(!ErrorCategory::Network.advice().is_empty());
        assert!(!ErrorCategory::Platform.advice().is_empty());
        assert!(!ErrorCategory::Format.advice().is_empty());
    }

    #[test]
    fn test_fetch_404_is_not_found() {
        let err = Error::Fetch {
            url: "https://example.com/a.zip".to_string(),
            message: "HTTP 404".to_string(),
            status: Some(404),
        };
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_http_error_is_network() {
        let err = Error::http("connection reset", Some(502));
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_unsupported_arch_display() {
        let err = Error::UnsupportedArch {
            machine: "mips".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Platform);
        assert!(err.to_string().contains("mips"));
    }

    #[test]
    fn test_io_permission_denied_category() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        let err = Error::io("/var/lib/panel", io_err);
        assert_eq!(err.category(), ErrorCategory::Permission);
    }

    #[test]
    fn test_extract_display_names_archive() {
        let err = Error::extract("/opt/panel/source.tar.gz", "unexpected EOF");
        let display = err.to_string();
        assert!(display.contains("source.tar.gz"));
        assert!(display.contains("unexpected EOF"));
    }
}
