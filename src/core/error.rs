use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurgeryError {
    #[error("Entity not found: {0}")]
    EntityNotFound(crate::core::types::EntityId),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Catalog validation failed: {}", .0.join(", "))]
    CatalogValidation(Vec<String>),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SurgeryError>;
