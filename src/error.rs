use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadarError {
    #[error("network error fetching {url}: {cause}")]
    NetworkError { url: String, cause: String },

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("failed to decode station image for {code}: {cause}")]
    DecodeError { code: String, cause: String },

    #[error("no station overlaps the requested region")]
    EmptyResultWarning,

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("image encode error: {0}")]
    EncodeError(#[from] image::ImageError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RadarError>;
