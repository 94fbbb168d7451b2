use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF has no pages")]
    NoPages,

    #[error("{0}")]
    InvalidElement(String),

    #[error("Invalid signature image: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<lopdf::Error> for OverlayError {
    fn from(err: lopdf::Error) -> Self {
        OverlayError::OperationError(err.to_string())
    }
}
