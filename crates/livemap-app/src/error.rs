use thiserror::Error;

/// Failure to retrieve the map source bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported source scheme in '{0}'")]
    UnsupportedScheme(String),
    #[error("HTTP {0}")]
    Http(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to read source: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => FetchError::Http(status),
            ureq::Error::Io(e) => FetchError::Io(e),
            other => FetchError::Transport(other.to_string()),
        }
    }
}

/// Failure to open a track or decode one of its frames.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("source is not an animated WebP or GIF")]
    UnknownFormat,
    #[error("malformed image data: {0}")]
    Malformed(String),
    #[error("frame {index} out of range (track has {count} frames)")]
    IndexOutOfRange { index: u32, count: u32 },
    #[error("decode worker is gone")]
    WorkerGone,
}

impl From<image_webp::DecodingError> for DecodeError {
    fn from(err: image_webp::DecodingError) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}

impl From<gif::DecodingError> for DecodeError {
    fn from(err: gif::DecodingError) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}

/// Reasons the scrubber could not reach its ready state.
/// Every variant leads to the still-frame fallback.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("reduced motion preferred")]
    ReducedMotion,
    #[error("frame-level decoding is not available")]
    CapabilityAbsent,
    #[error("live image has no source")]
    MissingSource,
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("cannot open track: {0}")]
    Decode(#[from] DecodeError),
    #[error("track has {0} frame(s), need at least 2")]
    TooFewFrames(u32),
    #[error("first frame failed to decode: {0}")]
    WarmUp(DecodeError),
}
