use thiserror::Error;

/// Errors raised while configuring the bot or talking to Gemini.
#[derive(Error, Debug)]
pub enum Error {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Gemini answered with a non-success status.
    #[error("Gemini API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("request to Gemini timed out")]
    Timeout,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The model answered but the part we asked for is missing.
    #[error("empty response from Gemini: {0}")]
    EmptyResponse(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn from_http(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}
