//! Chunk pipeline, meshing orchestration and the world that drives both.
#![forbid(unsafe_code)]

pub mod consumer;
pub mod decoration;
pub mod error;
pub mod mesher;
pub mod noise;
pub mod pass;
pub mod processor;
pub mod raycast;
pub mod service;
pub mod terrain;
pub mod world;

pub use consumer::{ConsumerTarget, MeshConsumer, MeshConsumerCommand};
pub use decoration::{DecorationPass, cone_sdf};
pub use error::{PassError, WorldError};
pub use mesher::{ChunkMesher, MesherCommand, MesherService};
pub use pass::{ChunkPass, WorldAccess};
pub use processor::ChunkProcessor;
pub use raycast::{RayHit, RayOptions};
pub use service::{WorldCommand, WorldService};
pub use terrain::{GeneratorCommand, GeneratorService, OverworldGenerator, TerrainPass, TerrainSource};
pub use world::{ChunkSet, TickOutcome, World, WorldConfig, WorldParts, WorldStatus};
