//! One error enum shared by every engine (§7). `BufferExhausted` is
//! deliberately absent — it's absorbed as a counter via
//! `perfcore_transport::SubmitOutcome::WouldBlock`, never propagated here.

#[derive(Debug, thiserror::Error)]
pub enum PerfError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    IoTransport(#[source] std::io::Error),

    #[error("protocol error: {detail}")]
    Protocol { detail: String },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("shutdown requested")]
    Shutdown,
}

impl PerfError {
    pub fn protocol(detail: impl Into<String>) -> Self {
        PerfError::Protocol { detail: detail.into() }
    }

    /// Whether this kind is fatal to the owning worker (per §7
    /// propagation: `IoTransport`/`Protocol`/`Encode`/`Decode` become a
    /// recorded failure string and set the shutdown flag; `Config` exits
    /// the process from `main` instead, and `Shutdown` is the normal
    /// wind-down path, not a failure).
    pub fn is_worker_fatal(&self) -> bool {
        matches!(
            self,
            PerfError::IoTransport(_) | PerfError::Protocol { .. } | PerfError::Encode(_) | PerfError::Decode(_)
        )
    }
}
