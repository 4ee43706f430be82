use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParlanceError {
    #[error("Identifier error: {0}")]
    Id(#[from] IdError),

    #[error("Unsupported language code: {0}")]
    UnsupportedLanguage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdError {
    #[error("Identifier is empty")]
    Empty,

    #[error("Identifier contains a path separator: {0}")]
    PathSeparator(String),
}
