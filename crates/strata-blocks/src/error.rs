use std::path::PathBuf;

use thiserror::Error;

use crate::registry::BlockId;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unsupported asset format: {0}")]
    UnsupportedFormat(PathBuf),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("duplicate block identifier `{0}`")]
    DuplicateIdentifier(String),
    #[error("block identifier `{0}` is reserved")]
    ReservedIdentifier(String),
    #[error("{count} blocks registered but a voxel can only address {max}")]
    TooManyBlocks { count: usize, max: usize },
    #[error("block `{0}` does not exist")]
    UnknownBlock(String),
    #[error("block id {0} does not exist")]
    UnknownId(BlockId),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("model `{0}` does not exist")]
    MissingModel(String),
    #[error("model inheritance cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("texture `{0}` does not exist")]
    MissingTexture(String),
}
