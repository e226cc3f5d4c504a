use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Vector has zero magnitude")]
    DegenerateVector,
    #[error("Embedding provider error: {0}")]
    Provider(String),
    #[error("Embedding call timed out after {0:?}")]
    Timeout(Duration),
    #[error("No document store for identity '{0}'")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RagError {
    /// Stable tag used in machine-readable error output.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::Configuration(_) => "configuration",
            RagError::DimensionMismatch { .. } => "dimension_mismatch",
            RagError::DegenerateVector => "degenerate_vector",
            RagError::Provider(_) => "provider",
            RagError::Timeout(_) => "timeout",
            RagError::NotFound(_) => "not_found",
            RagError::InvalidInput(_) => "invalid_input",
        }
    }
}

impl Serialize for RagError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("RagError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

impl From<reqwest::Error> for RagError {
    fn from(e: reqwest::Error) -> Self {
        RagError::Provider(e.to_string())
    }
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinct() {
        let errors = vec![
            RagError::Configuration("x".into()),
            RagError::DimensionMismatch { expected: 3, actual: 2 },
            RagError::DegenerateVector,
            RagError::Provider("rate limited".into()),
            RagError::Timeout(Duration::from_millis(5)),
            RagError::NotFound("u".into()),
            RagError::InvalidInput("empty".into()),
        ];
        let mut kinds: Vec<_> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_serializes_kind_and_message() {
        let err = RagError::DimensionMismatch { expected: 4, actual: 3 };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], "dimension_mismatch");
        assert_eq!(value["message"], "Vector dimension mismatch: expected 4, got 3");
    }
}
