use std::sync::Arc;
use std::time::Duration;

use strata_blocks::{AssetPaths, BlockModelCompiler};
use strata_geom::Vec3;
use strata_mesh_cpu::GreedyMesher;
use strata_rpc::{ArgReader, Command, RpcError, Service, ServiceContext, Thread, ThreadOptions, Value};

use crate::consumer::MeshConsumer;
use crate::decoration::DecorationPass;
use crate::error::WorldError;
use crate::mesher::{ChunkMesher, MesherService};
use crate::processor::ChunkProcessor;
use crate::raycast::RayOptions;
use crate::terrain::TerrainPass;
use crate::world::{World, WorldConfig, WorldParts};

pub enum WorldCommand {
    GenerateSpawn(Option<i32>),
    ProcessChunks,
    OnPlayerMove(f32, f32, f32),
    GetStatus,
    SetBlock(String, i32, i32, i32),
    GetBlock(i32, i32, i32),
    CastRay([f32; 3], [f32; 3], Option<RayOptions>),
}

fn vec3(v: [f64; 3]) -> [f32; 3] {
    v.map(|c| c as f32)
}

impl Command for WorldCommand {
    const FUNCTIONS: &'static [&'static str] = &[
        "generateSpawn",
        "processChunks",
        "onPlayerMove",
        "getStatus",
        "setBlock",
        "getBlock",
        "castRay",
    ];

    fn parse(function: &str, arguments: Vec<Value>) -> Result<Self, RpcError> {
        let mut args = ArgReader::new(function, arguments);
        Ok(match function {
            "generateSpawn" => {
                let radius = args
                    .optional()
                    .map(|v| {
                        v.as_i64()
                            .and_then(|r| i32::try_from(r).ok())
                            .ok_or_else(|| RpcError::bad_arguments(function, "radius should be an integer"))
                    })
                    .transpose()?;
                Self::GenerateSpawn(radius)
            }
            "processChunks" => Self::ProcessChunks,
            "onPlayerMove" => Self::OnPlayerMove(args.f64()? as f32, args.f64()? as f32, args.f64()? as f32),
            "getStatus" => Self::GetStatus,
            "setBlock" => Self::SetBlock(args.string()?, args.i32()?, args.i32()?, args.i32()?),
            "getBlock" => Self::GetBlock(args.i32()?, args.i32()?, args.i32()?),
            "castRay" => {
                let origin = vec3(args.vec3()?);
                let direction = vec3(args.vec3()?);
                let options = args.optional().map(|v| v.to_serde()).transpose()?;
                Self::CastRay(origin, direction, options)
            }
            other => {
                return Err(RpcError::UnknownFunction {
                    service: WorldService::NAME.to_string(),
                    function: other.to_string(),
                });
            }
        })
    }

    fn function(&self) -> &'static str {
        match self {
            Self::GenerateSpawn(_) => "generateSpawn",
            Self::ProcessChunks => "processChunks",
            Self::OnPlayerMove(..) => "onPlayerMove",
            Self::GetStatus => "getStatus",
            Self::SetBlock(..) => "setBlock",
            Self::GetBlock(..) => "getBlock",
            Self::CastRay(..) => "castRay",
        }
    }

    fn into_arguments(self) -> Result<Vec<Value>, RpcError> {
        let point = |p: [f32; 3]| Value::Array(p.into_iter().map(Value::from).collect());
        Ok(match self {
            Self::GenerateSpawn(radius) => vec![radius.into()],
            Self::ProcessChunks | Self::GetStatus => Vec::new(),
            Self::OnPlayerMove(x, y, z) => vec![x.into(), y.into(), z.into()],
            Self::SetBlock(block, x, y, z) => vec![block.into(), x.into(), y.into(), z.into()],
            Self::GetBlock(x, y, z) => vec![x.into(), y.into(), z.into()],
            Self::CastRay(origin, direction, options) => {
                let options = options.map(|o| Value::from_serde(&o)).transpose()?;
                vec![point(origin), point(direction), options.into()]
            }
        })
    }
}

/// Hosts a `World` on its own thread. Terrain generation and meshing run on
/// further worker threads it spawns.
///
/// Constructor arguments: `(meshConsumerProxy, seed, assetRoot, settings?)`.
pub struct WorldService {
    world: World,
}

impl WorldService {
    pub fn world(&self) -> &World {
        &self.world
    }

    fn build(arguments: Vec<Value>, cx: &ServiceContext) -> Result<World, WorldError> {
        let mut args = ArgReader::new("constructor", arguments);
        let consumer = args.proxy()?;
        let seed = args.i64()?;
        let root = args.string()?;
        let config: WorldConfig = match args.optional() {
            Some(settings) => settings.to_serde()?,
            None => WorldConfig::default(),
        };

        let assets = AssetPaths::new(root.as_str());
        let compiler = Arc::new(BlockModelCompiler::load(&assets)?);
        let registry = compiler.registry().clone();
        let handshake_timeout = Duration::from_millis(config.handshake_timeout_ms);

        let terrain = if config.remote_generator {
            let options = ThreadOptions {
                workers: config.generator_workers,
                handshake_timeout,
            };
            TerrainPass::worker(seed, root.as_str(), options)
        } else {
            TerrainPass::local(registry.clone(), seed)?
        };
        let processor = ChunkProcessor::new(vec![
            Box::new(terrain),
            Box::new(DecorationPass::with_threshold(seed, config.tree_threshold)),
        ]);

        let local_mesher = || -> Arc<dyn ChunkMesher> { Arc::new(GreedyMesher::new(compiler.clone())) };
        let mesher = if config.remote_mesher {
            let options = ThreadOptions {
                workers: config.mesher_workers,
                handshake_timeout,
            };
            match Thread::<MesherService>::spawn_with(vec![root.as_str().into()], options) {
                Ok(thread) => Arc::new(thread) as Arc<dyn ChunkMesher>,
                Err(e) => {
                    log::warn!(target: "mesher", "Mesher failed to initialize, meshing in-process: {e}");
                    local_mesher()
                }
            }
        } else {
            local_mesher()
        };

        let world = World::new(WorldParts {
            registry,
            processor,
            mesher,
            consumer: Arc::new(consumer) as Arc<dyn MeshConsumer>,
            config,
        })?;
        cx.log(format!("world ready, seed {seed}"));
        Ok(world)
    }
}

impl Service for WorldService {
    const NAME: &'static str = "World";

    type Command = WorldCommand;

    fn initialize(arguments: Vec<Value>, cx: &ServiceContext) -> Result<Self, RpcError> {
        Ok(Self {
            world: Self::build(arguments, cx)?,
        })
    }

    fn handle(&self, command: WorldCommand, _cx: &ServiceContext) -> Result<Value, RpcError> {
        let world = &self.world;
        match command {
            WorldCommand::GenerateSpawn(radius) => {
                let staged = world.generate_spawn(radius.unwrap_or(world.config().spawn_radius));
                Ok(staged.into())
            }
            WorldCommand::ProcessChunks => Value::from_serde(&world.process_chunks()),
            WorldCommand::OnPlayerMove(x, y, z) => {
                world.on_player_move(x, y, z);
                Ok(Value::Null)
            }
            WorldCommand::GetStatus => Value::from_serde(&world.status()),
            WorldCommand::SetBlock(block, x, y, z) => {
                world.set_block(&block, x, y, z)?;
                Ok(Value::Null)
            }
            WorldCommand::GetBlock(x, y, z) => Ok(world.get_block(x, y, z, false).into()),
            WorldCommand::CastRay(origin, direction, options) => {
                let options = options.unwrap_or_default();
                let hit = world.cast_ray(Vec3::from_array(origin), Vec3::from_array(direction), &options);
                Value::from_serde(&hit)
            }
        }
    }
}
