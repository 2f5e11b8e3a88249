use std::sync::Arc;

use strata_blocks::{AssetPaths, BlockModelCompiler};
use strata_chunk::Chunk;
use strata_mesh_cpu::{GreedyMesher, Mesh};
use strata_rpc::{ArgReader, Command, RpcError, Service, ServiceContext, Thread, Value};

use crate::error::WorldError;

/// Turns a finished chunk into renderable buffers.
pub trait ChunkMesher: Send + Sync {
    fn generate(&self, chunk: &Arc<Chunk>, resolution: usize) -> Result<Mesh, WorldError>;
}

impl ChunkMesher for GreedyMesher {
    fn generate(&self, chunk: &Arc<Chunk>, resolution: usize) -> Result<Mesh, WorldError> {
        Ok(GreedyMesher::generate(self, chunk, resolution)?)
    }
}

pub enum MesherCommand {
    Generate(Arc<Chunk>, Option<usize>),
}

impl Command for MesherCommand {
    const FUNCTIONS: &'static [&'static str] = &["generate"];

    fn parse(function: &str, arguments: Vec<Value>) -> Result<Self, RpcError> {
        let mut args = ArgReader::new(function, arguments);
        match function {
            "generate" => {
                let chunk = args.chunk()?;
                let resolution = match args.optional() {
                    Some(v) => Some(
                        v.as_i64()
                            .and_then(|r| usize::try_from(r).ok())
                            .ok_or_else(|| RpcError::bad_arguments(function, "resolution should be a positive integer"))?,
                    ),
                    None => None,
                };
                Ok(Self::Generate(chunk, resolution))
            }
            other => Err(RpcError::UnknownFunction {
                service: MesherService::NAME.to_string(),
                function: other.to_string(),
            }),
        }
    }

    fn function(&self) -> &'static str {
        match self {
            Self::Generate(..) => "generate",
        }
    }

    fn into_arguments(self) -> Result<Vec<Value>, RpcError> {
        match self {
            Self::Generate(chunk, resolution) => Ok(vec![chunk.into(), resolution.into()]),
        }
    }
}

/// Hosts a `GreedyMesher` on a worker thread. The chunk's voxels are read
/// straight from the shared buffer.
///
/// Constructor arguments: `(assetRoot)`.
pub struct MesherService {
    mesher: GreedyMesher,
}

impl Service for MesherService {
    const NAME: &'static str = "GreedyMesher";

    type Command = MesherCommand;

    fn initialize(arguments: Vec<Value>, cx: &ServiceContext) -> Result<Self, RpcError> {
        let mut args = ArgReader::new("constructor", arguments);
        let assets = AssetPaths::new(args.string()?);
        let compiler = BlockModelCompiler::load(&assets).map_err(|e| RpcError::Remote(e.to_string()))?;
        cx.log(format!("{} block models loaded", compiler.registry().len()));
        Ok(Self {
            mesher: GreedyMesher::new(Arc::new(compiler)),
        })
    }

    fn handle(&self, command: MesherCommand, _cx: &ServiceContext) -> Result<Value, RpcError> {
        match command {
            MesherCommand::Generate(chunk, resolution) => {
                let mesh = self
                    .mesher
                    .generate(&chunk, resolution.unwrap_or(1))
                    .map_err(|e| RpcError::Remote(e.to_string()))?;
                Value::from_serde(&mesh)
            }
        }
    }
}

impl ChunkMesher for Thread<MesherService> {
    fn generate(&self, chunk: &Arc<Chunk>, resolution: usize) -> Result<Mesh, WorldError> {
        let reply = self
            .call(MesherCommand::Generate(chunk.clone(), Some(resolution)))?
            .wait()?;
        Ok(reply.to_serde()?)
    }
}
