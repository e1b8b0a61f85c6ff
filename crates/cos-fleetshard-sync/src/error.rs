use std::io::Error as IoError;

use crate::store::StoreError;

pub type Result<T, E = SyncError> = core::result::Result<T, E>;

/// Errors surfaced by the synchronization client
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },
    #[error("Conflicting update of {kind} {name}")]
    Conflict { kind: String, name: String },
    #[error("Unable to update {kind} {name} after {attempts} attempts")]
    SyncFailure {
        kind: String,
        name: String,
        attempts: u32,
    },
    #[error("Multiple connectors clusters with id: {0}")]
    MultipleRegistrations(String),
    #[error("Store error: {0}")]
    Transport(StoreError),
    #[error("Config io error: {0}")]
    ConfigIo(#[from] IoError),
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

impl SyncError {
    /// transient failures the caller may retry with its own backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Conflict { .. })
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, name } => Self::NotFound { kind, name },
            StoreError::Conflict { kind, name, .. } => Self::Conflict { kind, name },
            other => Self::Transport(other),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let err: SyncError = StoreError::NotFound {
            kind: "ManagedConnector".to_owned(),
            name: "mctr-1".to_owned(),
        }
        .into();
        assert!(matches!(err, SyncError::NotFound { .. }));

        let err: SyncError = StoreError::Conflict {
            kind: "ManagedConnector".to_owned(),
            name: "mctr-1".to_owned(),
            expected: "1".to_owned(),
            actual: "2".to_owned(),
        }
        .into();
        assert!(matches!(err, SyncError::Conflict { .. }));
        assert!(err.is_transient());

        let err: SyncError = StoreError::Unavailable("connection refused".to_owned()).into();
        assert!(matches!(err, SyncError::Transport(_)));
        assert!(err.is_transient());

        assert!(!SyncError::MultipleRegistrations("c1".to_owned()).is_transient());
    }
}
