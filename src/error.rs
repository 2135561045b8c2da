/// Centralized error types for repograph using thiserror
///
/// Provides domain-specific error types for better error handling and user-facing messages.
use thiserror::Error;

/// Main error type for the indexing and search core
#[derive(Error, Debug)]
pub enum RepoGraphError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Graph store error: {0}")]
    GraphStore(#[from] GraphStoreError),

    #[error("Indexing error: {0}")]
    Indexing(#[from] IndexingError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to description and embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),

    #[error("Embedding generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding provider returned {actual} vectors for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Model lock was poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors related to the graph store and its vector indexes
#[derive(Error, Debug)]
pub enum GraphStoreError {
    #[error("Failed to open graph store: {0}")]
    OpenFailed(String),

    #[error("Rejected unsafe query: {0}")]
    UnsafeQuery(String),

    #[error("Failed to write to graph store: {0}")]
    WriteFailed(String),

    #[error("Failed to query graph store: {0}")]
    QueryFailed(String),

    #[error("Unknown vector index '{0}'")]
    UnknownIndex(String),

    #[error("Vector index unavailable: {0}")]
    VectorIndexUnavailable(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),
}

/// Errors that fail an indexing run as a whole
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("Indexing run exceeded its deadline of {0} seconds")]
    Timeout(u64),

    #[error("Indexing was cancelled")]
    Cancelled,

    #[error("Indexing operation was interrupted before reporting a result")]
    Interrupted,

    #[error("Workspace directory could not be prepared: {0}")]
    WorkspaceFailed(String),
}

/// Per-file parse errors; recoverable at the batch level
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Failed to read file '{file}': {reason}")]
    ReadFailed { file: String, reason: String },

    #[error("Syntax error in '{file}' at line {line}")]
    Syntax { file: String, line: usize },

    #[error("Declaration in '{file}' has no name")]
    MissingName { file: String },

    #[error("Failed to initialize parser: {0}")]
    ParserInit(String),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to malformed caller input
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Empty {0}")]
    Empty(String),

    #[error("{field} must be {constraint}, got {actual}")]
    ConstraintViolation {
        field: String,
        constraint: String,
        actual: String,
    },

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Errors related to version-control operations
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to clone '{url}': {reason}")]
    CloneFailed { url: String, reason: String },

    #[error("Failed to pull '{path}': {reason}")]
    PullFailed { path: String, reason: String },

    #[error("Failed to open git repository: {0}")]
    OpenFailed(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Repository has no commits on the checked out branch")]
    NoCommit,
}

// Conversion from anyhow::Error to RepoGraphError
impl From<anyhow::Error> for RepoGraphError {
    fn from(err: anyhow::Error) -> Self {
        RepoGraphError::Other(format!("{:#}", err))
    }
}

impl RepoGraphError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        RepoGraphError::Other(msg.into())
    }

    /// Check if this is a user error (validation, rejected query) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RepoGraphError::Validation(_)
                | RepoGraphError::GraphStore(GraphStoreError::UnsafeQuery(_))
                | RepoGraphError::GraphStore(GraphStoreError::EntityNotFound(_))
                | RepoGraphError::Config(ConfigError::InvalidValue { .. })
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RepoGraphError::Embedding(EmbeddingError::Timeout(_))
                | RepoGraphError::Indexing(IndexingError::Timeout(_))
                | RepoGraphError::Indexing(IndexingError::Interrupted)
                | RepoGraphError::GraphStore(GraphStoreError::VectorIndexUnavailable(_))
                | RepoGraphError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RepoGraphError::Validation(ValidationError::Empty("query".to_string()));
        assert_eq!(err.to_string(), "Validation error: Empty query");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RepoGraphError = io_err.into();
        assert!(matches!(err, RepoGraphError::Io(_)));
    }

    #[test]
    fn test_error_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("test error");
        let err: RepoGraphError = anyhow_err.into();
        assert!(matches!(err, RepoGraphError::Other(_)));
    }

    #[test]
    fn test_is_user_error() {
        let user_err = RepoGraphError::GraphStore(GraphStoreError::UnsafeQuery(
            "DROP TABLE types".to_string(),
        ));
        assert!(user_err.is_user_error());

        let system_err =
            RepoGraphError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        assert!(!system_err.is_user_error());
    }

    #[test]
    fn test_is_retryable() {
        let retryable = RepoGraphError::Indexing(IndexingError::Timeout(30));
        assert!(retryable.is_retryable());

        let not_retryable = RepoGraphError::Validation(ValidationError::Empty("url".to_string()));
        assert!(!not_retryable.is_retryable());
    }

    #[test]
    fn test_parse_error_syntax() {
        let err = ParseError::Syntax {
            file: "src/Foo.java".to_string(),
            line: 12,
        };
        assert_eq!(err.to_string(), "Syntax error in 'src/Foo.java' at line 12");
    }

    #[test]
    fn test_embedding_error_dimension_mismatch() {
        let err = EmbeddingError::DimensionMismatch {
            expected: 384,
            actual: 512,
        };
        assert_eq!(
            err.to_string(),
            "Invalid embedding dimension: expected 384, got 512"
        );
    }

    #[test]
    fn test_validation_error_constraint() {
        let err = ValidationError::ConstraintViolation {
            field: "depth".to_string(),
            constraint: "between 1 and 6".to_string(),
            actual: "9".to_string(),
        };
        assert_eq!(err.to_string(), "depth must be between 1 and 6, got 9");
    }

    #[test]
    fn test_error_chain() {
        let err: RepoGraphError = IndexingError::Cancelled.into();
        assert!(matches!(err, RepoGraphError::Indexing(_)));
        assert_eq!(err.to_string(), "Indexing error: Indexing was cancelled");
    }
}
