use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("missing required fields")]
    MissingFields,
    #[error("invalid site_id format")]
    InvalidSiteId,
    #[error("field too long: {0}")]
    FieldTooLong(&'static str),
    #[error("malicious content detected")]
    MaliciousContent,
    #[error("encoding error: {0}")]
    Encoding(String),
}
