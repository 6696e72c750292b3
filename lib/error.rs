use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("An error in the analysis: {0}")]
    Analysis(String),
    #[error("Analysis was cancelled")]
    Cancelled,
    #[error("Function not found: {0}")]
    FunctionNotFound(String),
    #[error("The edge with head {0} and tail {1} does not exist in the graph")]
    GraphEdgeNotFound(usize, usize),
    #[error("The vertex id {0} does not exist in the graph")]
    GraphVertexNotFound(usize),
    #[error("No instruction {1} in block {0}")]
    ProgramPointNotFound(usize, usize),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
}

impl From<&str> for Error {
    fn from(s: &str) -> Error {
        Error::Custom(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}
