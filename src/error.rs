use std::fmt;
use std::io;

/// Failure while setting up a request for POST ingestion.
///
/// Aborts the single request; the daemon keeps serving. The request's
/// completion step still runs so the session reference is released.
#[derive(Debug)]
pub enum SetupError {
    /// POST to the workout path without a usable identifier segment
    InvalidWorkoutPath {
        /// The request path as received
        path: String,
    },
    /// No workout file exists for the identifier
    WorkoutNotFound {
        /// The workout identifier
        id: String,
    },
    /// The body is not `application/x-www-form-urlencoded`
    UnsupportedEncoding {
        /// The content type the client sent, if any
        content_type: Option<String>,
    },
    /// The workout file exists but could not be read or parsed
    Io(io::Error),
}

impl SetupError {
    /// HTTP status the aborted request is answered with.
    pub fn status(&self) -> u16 {
        match self {
            SetupError::InvalidWorkoutPath { .. } | SetupError::WorkoutNotFound { .. } => 404,
            SetupError::UnsupportedEncoding { .. } => 415,
            SetupError::Io(_) => 500,
        }
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::InvalidWorkoutPath { path } => {
                write!(f, "invalid workout path '{}'", path)
            }
            SetupError::WorkoutNotFound { id } => write!(f, "workout '{}' not found", id),
            SetupError::UnsupportedEncoding { content_type } => write!(
                f,
                "unsupported form encoding '{}'",
                content_type.as_deref().unwrap_or("<none>")
            ),
            SetupError::Io(e) => write!(f, "workout load failed: {}", e),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetupError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure while writing a recomputed workout back to disk.
///
/// The in-memory timer has already been recomputed when this is returned;
/// there is no rollback.
#[derive(Debug)]
pub enum PersistError {
    /// The timer was not loaded from a file
    MissingBackingFile,
    /// Writing the temporary file or replacing the original failed
    Io(io::Error),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::MissingBackingFile => write!(f, "workout has no backing file"),
            PersistError::Io(e) => write!(f, "workout write failed: {}", e),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Io(e) => Some(e),
            PersistError::MissingBackingFile => None,
        }
    }
}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        PersistError::Io(e)
    }
}

/// Failure reported by the host configuration accessors.
#[derive(Debug)]
pub enum ConfigError {
    /// The host refused a submitted value
    Rejected {
        /// Form name of the variable
        name: String,
        /// Human readable reason
        reason: String,
    },
    /// The variable is not known to the host
    Unknown {
        /// Form name of the variable
        name: String,
    },
    /// Profile storage failed
    Io(io::Error),
    /// Profile contents could not be (de)serialized
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Rejected { name, reason } => {
                write!(f, "value for '{}' rejected: {}", name, reason)
            }
            ConfigError::Unknown { name } => write!(f, "unknown configuration variable '{}'", name),
            ConfigError::Io(e) => write!(f, "profile I/O failed: {}", e),
            ConfigError::Json(e) => write!(f, "profile encoding failed: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

/// Failure starting or running the reactor loop.
#[derive(Debug)]
pub enum DaemonError {
    /// The listening socket could not be bound
    Bind {
        /// Address the daemon tried to bind
        addr: String,
        /// Reason reported by the network layer
        reason: String,
    },
    /// The listener thread could not be started
    Io(io::Error),
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonError::Bind { addr, reason } => write!(f, "cannot bind {}: {}", addr, reason),
            DaemonError::Io(e) => write!(f, "reactor I/O failed: {}", e),
        }
    }
}

impl std::error::Error for DaemonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DaemonError::Io(e) => Some(e),
            DaemonError::Bind { .. } => None,
        }
    }
}

impl From<io::Error> for DaemonError {
    fn from(e: io::Error) -> Self {
        DaemonError::Io(e)
    }
}
