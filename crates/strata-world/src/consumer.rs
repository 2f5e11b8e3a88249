use std::sync::Arc;

use strata_chunk::{Chunk, ChunkId};
use strata_mesh_cpu::Mesh;
use strata_rpc::{ArgReader, Command, ProxyHandle, ProxyTarget, RpcError, Value};

/// Receives meshes as chunks become visible, change, or leave the world.
/// Usually the renderer.
pub trait MeshConsumer: Send + Sync {
    fn add_chunk(&self, chunk: &Arc<Chunk>, mesh: &Mesh) -> Result<(), RpcError>;

    fn update_chunk(&self, chunk: &Arc<Chunk>, mesh: &Mesh) -> Result<(), RpcError>;

    fn remove_chunk(&self, id: ChunkId) -> Result<(), RpcError>;
}

impl<C: MeshConsumer + ?Sized> MeshConsumer for Arc<C> {
    fn add_chunk(&self, chunk: &Arc<Chunk>, mesh: &Mesh) -> Result<(), RpcError> {
        (**self).add_chunk(chunk, mesh)
    }

    fn update_chunk(&self, chunk: &Arc<Chunk>, mesh: &Mesh) -> Result<(), RpcError> {
        (**self).update_chunk(chunk, mesh)
    }

    fn remove_chunk(&self, id: ChunkId) -> Result<(), RpcError> {
        (**self).remove_chunk(id)
    }
}

pub enum MeshConsumerCommand {
    AddChunk(Arc<Chunk>, Mesh),
    UpdateChunk(Arc<Chunk>, Mesh),
    RemoveChunk(ChunkId),
}

impl Command for MeshConsumerCommand {
    const FUNCTIONS: &'static [&'static str] = &["addChunk", "updateChunk", "removeChunk"];

    fn parse(function: &str, arguments: Vec<Value>) -> Result<Self, RpcError> {
        let mut args = ArgReader::new(function, arguments);
        match function {
            "addChunk" => Ok(Self::AddChunk(args.chunk()?, args.next()?.to_serde()?)),
            "updateChunk" => Ok(Self::UpdateChunk(args.chunk()?, args.next()?.to_serde()?)),
            "removeChunk" => {
                let id = args.string()?;
                let id = id
                    .parse()
                    .map_err(|e: strata_chunk::ParseChunkIdError| RpcError::bad_arguments(function, e.to_string()))?;
                Ok(Self::RemoveChunk(id))
            }
            other => Err(RpcError::UnknownFunction {
                service: "MeshConsumer".to_string(),
                function: other.to_string(),
            }),
        }
    }

    fn function(&self) -> &'static str {
        match self {
            Self::AddChunk(..) => "addChunk",
            Self::UpdateChunk(..) => "updateChunk",
            Self::RemoveChunk(_) => "removeChunk",
        }
    }

    fn into_arguments(self) -> Result<Vec<Value>, RpcError> {
        match self {
            Self::AddChunk(chunk, mesh) | Self::UpdateChunk(chunk, mesh) => mesh_arguments(&chunk, &mesh),
            Self::RemoveChunk(id) => Ok(vec![id.to_string().into()]),
        }
    }
}

/// Lets a host-side `MeshConsumer` be handed to a worker as a proxy.
pub struct ConsumerTarget<C>(pub C);

impl<C: MeshConsumer> ProxyTarget for ConsumerTarget<C> {
    fn call(&self, function: &str, arguments: Vec<Value>) -> Result<(), RpcError> {
        match MeshConsumerCommand::parse(function, arguments)? {
            MeshConsumerCommand::AddChunk(chunk, mesh) => self.0.add_chunk(&chunk, &mesh),
            MeshConsumerCommand::UpdateChunk(chunk, mesh) => self.0.update_chunk(&chunk, &mesh),
            MeshConsumerCommand::RemoveChunk(id) => self.0.remove_chunk(id),
        }
    }
}

fn mesh_arguments(chunk: &Arc<Chunk>, mesh: &Mesh) -> Result<Vec<Value>, RpcError> {
    Ok(vec![chunk.clone().into(), Value::from_serde(mesh)?])
}

impl MeshConsumer for ProxyHandle {
    fn add_chunk(&self, chunk: &Arc<Chunk>, mesh: &Mesh) -> Result<(), RpcError> {
        self.call("addChunk", mesh_arguments(chunk, mesh)?)
    }

    fn update_chunk(&self, chunk: &Arc<Chunk>, mesh: &Mesh) -> Result<(), RpcError> {
        self.call("updateChunk", mesh_arguments(chunk, mesh)?)
    }

    fn remove_chunk(&self, id: ChunkId) -> Result<(), RpcError> {
        self.call("removeChunk", vec![id.to_string().into()])
    }
}
