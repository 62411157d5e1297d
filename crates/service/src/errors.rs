use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid multimap name: {0}")]
    InvalidName(String),
    #[error("unknown value collection {0}; expected set or list")]
    UnknownCollection(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            StoreError::Io(_) => 2001,
            StoreError::Serialization(_) => 2002,
            StoreError::InvalidName(_) => 2003,
            StoreError::UnknownCollection(_) => 2004,
            StoreError::Unavailable(_) => 2100,
        }
    }

    pub fn io(e: impl std::fmt::Display) -> Self { Self::Io(e.to_string()) }

    pub fn serialization(e: impl std::fmt::Display) -> Self { Self::Serialization(e.to_string()) }
}
