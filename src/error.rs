//! Error types shared by the session controller.

use std::fmt;

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Errors returned by the background task registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry already holds its maximum number of tasks.
    CapacityExceeded { limit: usize },
    /// A task with this id is already registered.
    DuplicateId(String),
    /// No task with this id is registered.
    NotFound(String),
    /// The task already reached `Done` or `Failed`.
    AlreadyTerminal(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded { limit } => {
                write!(f, "background task limit reached ({limit} tasks)")
            }
            Self::DuplicateId(id) => write!(f, "background task `{id}` already exists"),
            Self::NotFound(id) => write!(f, "no background task with id `{id}`"),
            Self::AlreadyTerminal(id) => write!(f, "background task `{id}` already finished"),
        }
    }
}

impl std::error::Error for RegistryError {}

// ---------------------------------------------------------------------------
// GateError
// ---------------------------------------------------------------------------

/// Errors from the permission gate that prevent a request from being asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The UI side of the gate has shut down.
    UiUnavailable,
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UiUnavailable => write!(f, "approval UI is unavailable"),
        }
    }
}

impl std::error::Error for GateError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

/// Failure of an agent run, kept as a flattened message chain.
///
/// Agent runs cross a task boundary, so the error is carried as owned text
/// (outermost context first) rather than as a boxed error object. The chain
/// is what rate-limit classification inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    chain: Vec<String>,
    cancelled: bool,
}

impl RunError {
    /// Build a single-message error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            chain: vec![message.into()],
            cancelled: false,
        }
    }

    /// Error reported when a run observed its cancellation signal.
    pub fn cancelled() -> Self {
        Self {
            chain: vec!["run cancelled".to_string()],
            cancelled: true,
        }
    }

    /// Flatten an error and all of its `source()` causes.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = vec![err.to_string()];
        let mut source = err.source();
        while let Some(inner) = source {
            chain.push(inner.to_string());
            source = inner.source();
        }
        Self {
            chain,
            cancelled: false,
        }
    }

    /// Wrap this error in an outer context message.
    pub fn context(mut self, outer: impl Into<String>) -> Self {
        self.chain.insert(0, outer.into());
        self
    }

    /// Messages from outermost context to root cause.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// True when the run ended because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chain.join(": "))
    }
}

impl std::error::Error for RunError {}
