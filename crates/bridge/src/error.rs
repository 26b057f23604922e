use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("String of {len} encoded bytes exceeds the 65535 byte frame limit")]
    StringTooLong { len: usize },

    #[error("Truncated frame: needed {needed} bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },

    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Unexpected sub-channel '{0}'")]
    UnexpectedSubchannel(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
