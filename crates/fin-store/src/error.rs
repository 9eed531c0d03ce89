use fin_schemas::EntityKind;

/// Fault model shared by both store collaborators.
///
/// `Transient` and `Timeout` feed the bounded retry policy; everything else
/// is terminal for the operation that hit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound {
        kind: EntityKind,
        id: String,
    },
    AlreadyExists {
        kind: EntityKind,
        id: String,
    },
    /// Momentary failure (connection reset, write contention). Retryable.
    Transient(String),
    /// Remote call exceeded its deadline. Retryable.
    Timeout,
    /// The remote store is not reachable at all.
    Unavailable,
    /// The backing data could not be decoded.
    Corrupt(String),
    Io(String),
}

impl StoreError {
    /// Whether the retry policy applies.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_) | StoreError::Timeout)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { kind, id } => write!(f, "{kind} '{id}' not found"),
            StoreError::AlreadyExists { kind, id } => {
                write!(f, "{kind} '{id}' already exists")
            }
            StoreError::Transient(msg) => write!(f, "transient store failure: {msg}"),
            StoreError::Timeout => write!(f, "store call timed out"),
            StoreError::Unavailable => write!(f, "remote store unreachable"),
            StoreError::Corrupt(msg) => write!(f, "store data corrupt: {msg}"),
            StoreError::Io(msg) => write!(f, "store io failure: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
