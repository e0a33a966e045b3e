use thiserror::Error;

#[derive(Error, Debug)]
pub enum OntomapError {
    #[error("Ontology error: {0}")]
    Ontology(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OntomapError>;
