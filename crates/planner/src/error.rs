use std::time::Duration;

use crate::waypoint::WaypointKey;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BackendErrorKind {
    Timeout,
    Transport,
    Status(u16),
    Decode,
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendErrorKind::Timeout => write!(f, "timeout"),
            BackendErrorKind::Transport => write!(f, "transport"),
            BackendErrorKind::Status(code) => write!(f, "status {code}"),
            BackendErrorKind::Decode => write!(f, "decode"),
        }
    }
}

/// Error returned by routing and search backends.
#[derive(Debug)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: BackendErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            BackendErrorKind::Timeout,
            format!("no response after {} ms", after.as_millis()),
        )
    }
}

#[derive(Debug)]
pub enum PlannerError {
    /// Routing was requested before both endpoints were resolved.
    IncompleteRoute { missing: WaypointKey },
    InsufficientWaypoints { count: usize },
    /// The routing backend failed; the previous route is still current.
    RouteComputation(BackendError),
    SearchTimeout { operation: &'static str, after: Duration },
    SearchBackend(BackendError),
}

impl PlannerError {
    /// Only timeouts are worth retrying; other backend failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlannerError::SearchTimeout { .. })
    }

    pub(crate) fn from_search(operation: &'static str, after: Duration, err: BackendError) -> Self {
        match err.kind {
            BackendErrorKind::Timeout => PlannerError::SearchTimeout { operation, after },
            _ => PlannerError::SearchBackend(err),
        }
    }
}

impl std::fmt::Display for PlannerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlannerError::IncompleteRoute { missing } => {
                write!(f, "route is incomplete: waypoint {missing} has no selection")
            }
            PlannerError::InsufficientWaypoints { count } => {
                write!(f, "a route needs at least 2 waypoints, got {count}")
            }
            PlannerError::RouteComputation(e) => write!(f, "route computation failed: {e}"),
            PlannerError::SearchTimeout { operation, after } => {
                write!(f, "{operation} timed out after {} ms", after.as_millis())
            }
            PlannerError::SearchBackend(e) => write!(f, "search failed: {e}"),
        }
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlannerError::RouteComputation(e) | PlannerError::SearchBackend(e) => Some(e),
            _ => None,
        }
    }
}
