/// Errors surfaced by graph queries and snapshot decoding.
#[derive(Debug, thiserror::Error)]
pub enum OntologyError {
    /// The topic is not in the known topic set.
    #[error("topic '{0}' is not available in this version of the ontology")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Snapshot bytes do not decode into a consistent graph.
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}

impl From<bincode::Error> for OntologyError {
    fn from(err: bincode::Error) -> Self {
        OntologyError::Snapshot(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OntologyError>;
