use thiserror::Error;

/// All errors produced by lookback-core.
///
/// Read-range outcomes (before/after available data, partial overlap) are
/// deliberately *not* here — they are ordinary results reported via
/// [`crate::query::ClipKind`].
#[derive(Debug, Error)]
pub enum LookbackError {
    #[error("channel count must be at least 1, got {0}")]
    InvalidChannelCount(usize),

    #[error("frame rate must be non-zero")]
    InvalidFrameRate,

    #[error("retention must be at least one frame")]
    EmptyRetention,

    #[error("gap must be at least one frame")]
    EmptyGap,

    #[error("capture writer already taken — only one real-time producer is allowed")]
    WriterAlreadyTaken,

    #[error("stream is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LookbackError>;
