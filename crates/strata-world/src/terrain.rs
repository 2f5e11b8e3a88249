use std::path::PathBuf;
use std::sync::Arc;

use strata_blocks::{AIR, AssetPaths, BlockId, BlockRegistry};
use strata_chunk::{CHUNK_SIZE, CHUNK_VOLUME, Chunk, ChunkId, SharedBuffer, VoxelCells};
use strata_rpc::{ArgReader, Command, RpcError, Service, ServiceContext, Thread, ThreadOptions, Value};

use crate::error::PassError;
use crate::noise::{Simplex, rand01};
use crate::pass::{ChunkPass, WorldAccess};

const DECORATIONS: [&str; 4] = ["pyramid", "structure_block", "small_block", "oak_log"];
const DECORATION_CHANCE: f32 = 0.01;
const SALT_DECORATION: u32 = 0x0D3C_0001;
const SALT_DECORATION_KIND: u32 = 0x0D3C_0002;

/// Produces the voxels of a freshly generated chunk.
pub trait TerrainSource: Send + Sync {
    fn generate(&self, id: ChunkId) -> Result<SharedBuffer, PassError>;
}

#[derive(Clone, Copy, Debug)]
struct SurfaceBlocks {
    grass: BlockId,
    dirt: BlockId,
    stone: BlockId,
    snow: BlockId,
}

/// Rolling hills with occasional mountain ranges, capped with snow up high.
pub struct OverworldGenerator {
    seed: u32,
    simplex: Simplex,
    surface: SurfaceBlocks,
    decorations: Vec<BlockId>,
}

impl OverworldGenerator {
    pub fn new(registry: &BlockRegistry, seed: i64) -> Result<Self, PassError> {
        let surface = SurfaceBlocks {
            grass: registry.require_id("grass_block")?,
            dirt: registry.require_id("dirt")?,
            stone: registry.require_id("stone")?,
            snow: registry.require_id("snow")?,
        };
        let decorations = DECORATIONS
            .iter()
            .filter_map(|name| registry.id_by_name(name))
            .collect();
        Ok(Self {
            seed: seed as u32,
            simplex: Simplex::new(seed as i32),
            surface,
            decorations,
        })
    }

    fn column(&self, x: i32, z: i32) -> (i32, f32) {
        let (xf, zf) = (x as f32, z as f32);
        let mountains = self.simplex.noise(xf / 200.0, zf / 200.0, 100.0).powi(2) * 1024.0;
        let layer = self.simplex.noise(xf / 75.0, zf / 75.0, 50.0).abs() * 7.0;
        let height = (self.simplex.noise(xf / 25.0, zf / 25.0, 0.0).powi(2) * 64.0 + mountains).floor();
        (height as i32, layer)
    }

    fn block_at(&self, x: i32, y: i32, z: i32, height: i32, layer: f32) -> BlockId {
        let s = self.surface;
        if y == height + 1 {
            return self.decoration_at(x, y, z);
        }
        if y > height {
            AIR
        } else if y == height {
            if y < 72 {
                s.grass
            } else if y < 128 {
                s.stone
            } else {
                s.snow
            }
        } else if y as f32 > height as f32 - layer {
            if y < 128 { s.dirt } else { s.snow }
        } else {
            s.stone
        }
    }

    fn decoration_at(&self, x: i32, y: i32, z: i32) -> BlockId {
        if self.decorations.is_empty() || rand01(self.seed, x, y, z, SALT_DECORATION) >= DECORATION_CHANCE {
            return AIR;
        }
        let pick = rand01(self.seed, x, y, z, SALT_DECORATION_KIND) * self.decorations.len() as f32;
        self.decorations[(pick as usize).min(self.decorations.len() - 1)]
    }

    pub fn generate_chunk(&self, id: ChunkId) -> Chunk {
        let chunk = Chunk::new(id);
        let (ox, oy, oz) = id.world_origin();
        for lx in 0..CHUNK_SIZE {
            for lz in 0..CHUNK_SIZE {
                let (x, z) = (ox + lx, oz + lz);
                let (height, layer) = self.column(x, z);
                if oy > height + 1 {
                    continue;
                }
                for ly in 0..CHUNK_SIZE {
                    let block = self.block_at(x, oy + ly, z, height, layer);
                    if block != AIR {
                        chunk.set_block(block as u8, lx, ly, lz);
                    }
                }
            }
        }
        chunk
    }
}

impl TerrainSource for OverworldGenerator {
    fn generate(&self, id: ChunkId) -> Result<SharedBuffer, PassError> {
        Ok(self.generate_chunk(id).buffer().clone())
    }
}

pub enum GeneratorCommand {
    GenerateChunk(i32, i32, i32),
}

impl Command for GeneratorCommand {
    const FUNCTIONS: &'static [&'static str] = &["generateChunk"];

    fn parse(function: &str, arguments: Vec<Value>) -> Result<Self, RpcError> {
        let mut args = ArgReader::new(function, arguments);
        match function {
            "generateChunk" => Ok(Self::GenerateChunk(args.i32()?, args.i32()?, args.i32()?)),
            other => Err(RpcError::UnknownFunction {
                service: GeneratorService::NAME.to_string(),
                function: other.to_string(),
            }),
        }
    }

    fn function(&self) -> &'static str {
        match self {
            Self::GenerateChunk(..) => "generateChunk",
        }
    }

    fn into_arguments(self) -> Result<Vec<Value>, RpcError> {
        match self {
            Self::GenerateChunk(x, y, z) => Ok(vec![x.into(), y.into(), z.into()]),
        }
    }
}

/// Hosts an `OverworldGenerator` on a worker thread.
///
/// Constructor arguments: `(seed, assetRoot)`.
pub struct GeneratorService {
    generator: OverworldGenerator,
}

impl Service for GeneratorService {
    const NAME: &'static str = "OverworldGenerator";

    type Command = GeneratorCommand;

    fn initialize(arguments: Vec<Value>, cx: &ServiceContext) -> Result<Self, RpcError> {
        let mut args = ArgReader::new("constructor", arguments);
        let seed = args.i64()?;
        let assets = AssetPaths::new(args.string()?);
        let registry = BlockRegistry::load_from_path(assets.blocks())
            .map_err(|e| RpcError::Remote(e.to_string()))?;
        let generator = OverworldGenerator::new(&registry, seed)?;
        cx.log(format!("generator ready, seed {seed}"));
        Ok(Self { generator })
    }

    fn handle(&self, command: GeneratorCommand, _cx: &ServiceContext) -> Result<Value, RpcError> {
        match command {
            GeneratorCommand::GenerateChunk(x, y, z) => {
                let chunk = self.generator.generate_chunk(ChunkId::new(x, y, z));
                Ok(Value::Buffer(chunk.buffer().clone()))
            }
        }
    }
}

impl TerrainSource for Thread<GeneratorService> {
    fn generate(&self, id: ChunkId) -> Result<SharedBuffer, PassError> {
        let reply = self
            .call(GeneratorCommand::GenerateChunk(id.cx, id.cy, id.cz))?
            .wait()?;
        reply.as_buffer().cloned().ok_or_else(|| {
            PassError::Rpc(RpcError::Decode(format!(
                "generateChunk returned {}, expected a buffer",
                reply.kind()
            )))
        })
    }
}

enum Backend {
    Ready(Box<dyn TerrainSource>),
    Worker {
        seed: i64,
        assets: PathBuf,
        options: ThreadOptions,
    },
}

/// Fills a chunk from a terrain source, either in-process or on a worker.
pub struct TerrainPass {
    backend: Backend,
}

impl TerrainPass {
    pub fn new(source: impl TerrainSource + 'static) -> Self {
        Self {
            backend: Backend::Ready(Box::new(source)),
        }
    }

    /// Generates on an `OverworldGenerator` thread spawned by `initialize`.
    pub fn worker(seed: i64, assets: impl Into<PathBuf>, options: ThreadOptions) -> Self {
        Self {
            backend: Backend::Worker {
                seed,
                assets: assets.into(),
                options,
            },
        }
    }

    pub fn local(registry: Arc<BlockRegistry>, seed: i64) -> Result<Self, PassError> {
        Ok(Self::new(OverworldGenerator::new(&registry, seed)?))
    }
}

impl ChunkPass for TerrainPass {
    fn name(&self) -> &'static str {
        "terrain"
    }

    fn initialize(&mut self) -> Result<(), PassError> {
        if let Backend::Worker {
            seed,
            assets,
            options,
        } = &self.backend
        {
            let arguments = vec![Value::from(*seed), Value::from(assets.to_string_lossy().into_owned())];
            let thread = Thread::<GeneratorService>::spawn_with(arguments, options.clone())?;
            self.backend = Backend::Ready(Box::new(thread));
        }
        Ok(())
    }

    fn validate(&self, _chunk: &Chunk, _world: &dyn WorldAccess) -> bool {
        true
    }

    fn process(&self, chunk: &Chunk, _world: &dyn WorldAccess) -> Result<(), PassError> {
        let Backend::Ready(source) = &self.backend else {
            return Err(PassError::NotInitialized { pass: self.name() });
        };
        let buffer = source.generate(chunk.id())?;
        if buffer.len() != CHUNK_VOLUME {
            return Err(PassError::WrongSize {
                expected: CHUNK_VOLUME,
                actual: buffer.len(),
            });
        }
        chunk.copy_from(&buffer);
        Ok(())
    }
}
