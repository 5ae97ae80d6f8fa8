//! Error types and handling for ferrosync
//!
//! A single error enum covers every failure a sync pass can produce. Whether a
//! failure aborts the pass or is recorded per item is decided by the caller.
//! [`Error::should_retry`] decides whether a failed login is attempted again.

use std::path::PathBuf;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - the item failed, the pass continues
    Medium,
    /// High severity - operation should be aborted
    High,
    /// Critical severity - the whole pass must stop
    Critical,
}

/// Main error type for ferrosync operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No usable credential or otherwise invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Every login attempt failed
    #[error("Connection failed after {retries} retries: {cause}")]
    Connection {
        /// Number of retries that were configured (attempts = retries + 1)
        retries: u32,
        /// Failure of the last attempt
        #[source]
        cause: Box<Error>,
    },

    /// The server rejected the credential
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message from the login attempt
        message: String,
    },

    /// Transport level failure
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {seconds} seconds")]
    Timeout {
        /// Number of seconds after which the operation timed out
        seconds: u64,
    },

    /// A path contained a parent traversal segment
    #[error("Path rejected, contains '..' segment: {path}")]
    PathSecurity {
        /// The offending path as supplied
        path: String,
    },

    /// A remote directory segment could not be created
    #[error("Unable to create remote directory '{path}': {message}")]
    RemoteDirectory {
        /// Remote directory that failed
        path: String,
        /// Underlying failure
        message: String,
    },

    /// Upload rejected or failed
    #[error("Upload of '{path}' failed: {message}")]
    Upload {
        /// Remote destination path
        path: String,
        /// Underlying failure
        message: String,
    },

    /// Deletion rejected or failed
    #[error("Delete of '{path}' failed: {message}")]
    Delete {
        /// Remote path
        path: String,
        /// Underlying failure
        message: String,
    },

    /// Any other remote primitive failed
    #[error("Remote error: {message}")]
    Remote {
        /// Error message from the remote side
        message: String,
    },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// File not found
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found
        path: PathBuf,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration errors
    Config,
    /// Connection exhausted its retries
    Connection,
    /// Login rejected
    Authentication,
    /// Network errors
    Network,
    /// Timeout
    Timeout,
    /// Traversal attempt
    PathSecurity,
    /// Directory creation
    RemoteDirectory,
    /// Upload failures
    Upload,
    /// Delete failures
    Delete,
    /// Other remote primitive failures
    Remote,
    /// Local I/O related errors
    Io,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::PathSecurity { .. } => ErrorKind::PathSecurity,
            Self::RemoteDirectory { .. } => ErrorKind::RemoteDirectory,
            Self::Upload { .. } => ErrorKind::Upload,
            Self::Delete { .. } => ErrorKind::Delete,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Io { .. } | Self::FileNotFound { .. } => ErrorKind::Io,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config { .. } | Self::Connection { .. } => ErrorSeverity::Critical,
            Self::PathSecurity { .. } => ErrorSeverity::High,
            Self::Authentication { .. } | Self::Network { .. } | Self::Timeout { .. } => {
                ErrorSeverity::Medium
            }
            Self::RemoteDirectory { .. }
            | Self::Upload { .. }
            | Self::Delete { .. }
            | Self::Remote { .. }
            | Self::Io { .. }
            | Self::FileNotFound { .. }
            | Self::Other { .. } => ErrorSeverity::Medium,
        }
    }

    /// Whether the same attempt could succeed later
    ///
    /// Transport and login failures may be transient. Configuration, path and
    /// per-item failures repeat identically.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::Authentication { .. }
            | Self::Remote { .. }
            | Self::Io { .. }
            | Self::Other { .. } => true,
            Self::Config { .. }
            | Self::Connection { .. }
            | Self::PathSecurity { .. }
            | Self::FileNotFound { .. }
            | Self::RemoteDirectory { .. }
            | Self::Upload { .. }
            | Self::Delete { .. } => false,
        }
    }

    /// Whether a failed connection attempt should be retried
    pub fn should_retry(&self) -> bool {
        self.is_recoverable() && self.severity() <= ErrorSeverity::Medium
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new authentication error
    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new remote error
    pub fn remote<S: Into<String>>(message: S) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a new path security error
    pub fn path_security<S: Into<String>>(path: S) -> Self {
        Self::PathSecurity { path: path.into() }
    }

    /// Create a new remote directory error
    pub fn remote_directory<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::RemoteDirectory {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new upload error
    pub fn upload<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Upload {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new delete error
    pub fn delete<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Delete {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
