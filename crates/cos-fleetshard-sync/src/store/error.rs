#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },
    #[error("{kind} {name} was modified: expected version '{expected}', found '{actual}'")]
    Conflict {
        kind: String,
        name: String,
        expected: String,
        actual: String,
    },
    #[error("{kind} watch position {version} has expired")]
    Expired { kind: String, version: String },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid object: {0}")]
    Invalid(String),
    #[error("Yaml serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
