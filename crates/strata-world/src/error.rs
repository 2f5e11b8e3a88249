use strata_blocks::{ModelError, RegistryError};
use strata_chunk::ChunkError;
use strata_rpc::RpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PassError {
    #[error("{pass} used before initialize")]
    NotInitialized { pass: &'static str },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("generated {actual} voxels, expected {expected}")]
    WrongSize { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Pass(#[from] PassError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl From<WorldError> for RpcError {
    fn from(e: WorldError) -> Self {
        match e {
            WorldError::Rpc(e) => e,
            other => RpcError::Remote(other.to_string()),
        }
    }
}

impl From<PassError> for RpcError {
    fn from(e: PassError) -> Self {
        match e {
            PassError::Rpc(e) => e,
            other => RpcError::Remote(other.to_string()),
        }
    }
}
