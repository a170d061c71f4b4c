use thiserror::Error;

/// Rejections produced while validating an API request body.
///
/// The server maps every variant to `400 Bad Request`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0} are required")]
    MissingFields(&'static str),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}
