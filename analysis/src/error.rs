use engine::{RequestError, SessionError};

/// Errors surfaced by [`crate::PositionAnalyzer`]. Raw process and I/O
/// errors never escape; they are folded into one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// Malformed FEN or out-of-range parameters. Never retried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Executable missing, failed to spawn, or failed to come up.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),
    /// Missing or unexpected handshake tokens. The session is discarded.
    #[error("engine protocol error: {0}")]
    EngineProtocolError(String),
    /// The engine process died mid-analysis.
    #[error("engine crashed: {0}")]
    EngineCrashed(String),
    /// The time budget plus grace margin ran out. The session was killed.
    #[error("analysis timed out after {limit_ms} ms")]
    AnalysisTimeout { limit_ms: u64 },
}

impl AnalysisError {
    /// Suggested HTTP status for the REST layer.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::EngineUnavailable(_) | Self::EngineCrashed(_) => 503,
            Self::EngineProtocolError(_) => 502,
            Self::AnalysisTimeout { .. } => 504,
        }
    }

    /// Whether the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

impl From<RequestError> for AnalysisError {
    fn from(e: RequestError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

impl From<SessionError> for AnalysisError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Unavailable(reason) => Self::EngineUnavailable(reason),
            SessionError::Protocol(reason) => Self::EngineProtocolError(reason),
            SessionError::Crashed => Self::EngineCrashed(e.to_string()),
            SessionError::InvalidState { .. } => Self::EngineProtocolError(e.to_string()),
            SessionError::NoLegalMoves => Self::InvalidRequest(e.to_string()),
        }
    }
}
