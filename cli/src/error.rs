/// Failures surfaced by the session controller and the CLI front end.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    /// The broker closed the socket with a policy violation (bad token).
    #[error("connection rejected: {reason}")]
    Rejected { reason: String },
    #[error("websocket closed")]
    Closed,
    #[error("message codec failed: {0}")]
    Decode(#[from] protocol::CodecError),
    #[error("timed out waiting for the server")]
    Timeout,
    /// Automatic reconnects are used up; the caller decides whether to retry.
    #[error("gave up after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {code}: {message}")]
    Server { code: String, message: String },
}

impl SessionError {
    /// Whether reconnecting cannot help.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidUrl(_) | Self::Rejected { .. })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connect(Box::new(error))
    }
}
