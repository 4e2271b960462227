//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Durable store could not be reached, timed out, or rejected a call.
    StoreUnavailable(String),
    /// An explicitly requested session id does not exist.
    SessionNotFound(String),
    /// The session exists but has already been completed.
    SessionClosed(String),
    /// An operation requiring an active session found none registered.
    NoActiveSession,
    /// Session log creation or append failure.
    LogIo(String),
    /// Generic file-system or I/O operation failure.
    Io(String),
    /// Version-control harvest failure.
    Harvest(String),
    /// Embedding generation failure.
    Embedding(String),
    /// Malformed request on the wire protocol.
    Protocol(String),
    /// Caller supplied invalid parameters.
    InvalidInput(String),
    /// Relative path failed validation against its root.
    PathViolation(String),
    /// Workspace start lock could not be acquired in time.
    LockTimeout(String),
}

impl AppError {
    /// Stable machine-readable error kind, used on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionClosed(_) => "session_closed",
            Self::NoActiveSession => "no_active_session",
            Self::LogIo(_) => "log_io",
            Self::Io(_) => "io",
            Self::Harvest(_) => "harvest",
            Self::Embedding(_) => "embedding",
            Self::Protocol(_) => "protocol",
            Self::InvalidInput(_) => "invalid_input",
            Self::PathViolation(_) => "path_violation",
            Self::LockTimeout(_) => "lock_timeout",
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::StoreUnavailable(msg) => write!(f, "store unavailable: {msg}"),
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::SessionClosed(id) => write!(f, "session closed: {id}"),
            Self::NoActiveSession => {
                write!(f, "no active session: start a session first")
            }
            Self::LogIo(msg) => write!(f, "log io: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Harvest(msg) => write!(f, "harvest: {msg}"),
            Self::Embedding(msg) => write!(f, "embedding: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::PathViolation(msg) => write!(f, "path violation: {msg}"),
            Self::LockTimeout(msg) => write!(f, "lock timeout: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
