use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure to retrieve the raw feed text.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to feed failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed responded with status {0}")]
    Status(reqwest::StatusCode),
}

/// Failure to turn feed text into event definitions.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed calendar: {0}")]
    Malformed(String),
    #[error("feed does not contain a calendar")]
    NoCalendar,
    #[error("invalid value `{value}` for property {property}")]
    InvalidValue { property: &'static str, value: String },
    #[error("invalid recurrence rule `{rule}`: {reason}")]
    Recurrence { rule: String, reason: String },
}

/// Failure to resolve a calendar time to an absolute instant.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("unknown time zone `{0}`")]
    UnknownTimeZone(String),
    #[error("floating time {0} has no time zone")]
    Floating(chrono::NaiveDateTime),
    #[error("local time {time} does not exist in {zone}")]
    NonExistent {
        time: chrono::NaiveDateTime,
        zone: String,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing feed url")]
    MissingUrl,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingUrl | Self::Fetch(_) => StatusCode::BAD_REQUEST,
            Self::Parse(_) | Self::Conversion(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Short reason returned to the caller. The underlying cause is only logged.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingUrl => "Missing 'icalFeedUrl' query parameter.",
            Self::Fetch(_) => "Failed to download iCal feed.",
            Self::Parse(_) => "Failed to parse iCal feed.",
            Self::Conversion(_) => "Failed to convert event times.",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), self.reason()).into_response()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
