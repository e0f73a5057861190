use thiserror::Error;

/// Failure to move an extract envelope in or out of its wire encoding.
#[derive(Debug, Error)]
pub enum ExtractCodecError {
    #[error("cannot write extract envelope as {format}: {message}")]
    Encode {
        /// `"json"` or `"binary"`.
        format: &'static str,
        message: String,
    },

    #[error("cannot read extract envelope from {format}: {message}")]
    Decode {
        format: &'static str,
        message: String,
    },

    /// The envelope was written by a newer or older format revision.
    #[error("extract envelope has format version {found}, this build reads only version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

impl ExtractCodecError {
    pub(super) fn encode(format: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Encode {
            format,
            message: err.to_string(),
        }
    }

    pub(super) fn decode(format: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            format,
            message: err.to_string(),
        }
    }
}
