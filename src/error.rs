use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid client option: {0}")]
    InvalidOption(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("sftp error: {0}")]
    Sftp(#[from] ssh2::Error),

    #[error("invalid filter pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("missing credentials: environment variable {0} is not set")]
    MissingCredentials(&'static str),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decoding(err.to_string())
    }
}
