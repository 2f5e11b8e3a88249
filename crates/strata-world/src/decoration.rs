use strata_blocks::BlockId;
use strata_chunk::{CHUNK_SIZE, Chunk, ChunkId};
use strata_geom::Vec3;

use crate::error::PassError;
use crate::noise::{Random, Worley};
use crate::pass::{ChunkPass, WorldAccess};

pub const DEFAULT_TREE_THRESHOLD: f32 = 0.005;
const CANOPY_ROUNDNESS: f32 = 0.1;

/// Signed distance from `p` to a rounded cone of height `h` and base radius
/// `r` standing on the origin. Negative inside.
pub fn cone_sdf(p: Vec3, h: f32, r: f32, roundness: f32) -> f32 {
    let d = (p.x * p.x + p.z * p.z).sqrt();
    let to_side = d - r;
    let to_top = p.y - h;
    to_side.max(to_top) - roundness * (to_side * to_side + to_top * to_top).sqrt()
}

#[derive(Clone, Copy, Debug)]
struct TreeBlocks {
    grass: BlockId,
    log: BlockId,
    leaves: BlockId,
}

/// Plants trees on grass once a chunk's neighbours exist.
pub struct DecorationPass {
    worley: Worley,
    threshold: f32,
}

impl DecorationPass {
    pub fn new(seed: i64) -> Self {
        Self::with_threshold(seed, DEFAULT_TREE_THRESHOLD)
    }

    /// `threshold` is the largest cellular distance that still plants a tree.
    pub fn with_threshold(seed: i64, threshold: f32) -> Self {
        Self {
            worley: Worley::new(seed as i32),
            threshold,
        }
    }

    fn resolve(&self, world: &dyn WorldAccess) -> Result<TreeBlocks, PassError> {
        let registry = world.registry();
        Ok(TreeBlocks {
            grass: registry.require_id("grass_block")?,
            log: registry.require_id("oak_log")?,
            leaves: registry.require_id("leaves")?,
        })
    }

    /// Trunk of `oak_log` rising from `(x, y, z)` under a cone of leaves.
    pub fn create_tree(&self, world: &dyn WorldAccess, seed: i64, x: i32, y: i32, z: i32) -> Result<(), PassError> {
        let blocks = self.resolve(world)?;
        let mut random = Random::new(seed);
        let trunk = (random.next_f32() * 6.0 + 6.0).floor() as i32;
        log::debug!(target: "pipeline", "tree at {x}, {y}, {z} with trunk {trunk}");

        for i in 0..trunk {
            world.set_block_id(blocks.log, x, y + i, z);
        }

        let height = (random.next_f32() * 3.0 + 4.0).floor() as i32;
        let radius = (random.next_f32() * 2.0 + 4.0).floor() as i32;
        for lx in -radius..radius {
            for lz in -radius..radius {
                for ly in 0..height {
                    let p = Vec3::new(lx as f32, ly as f32, lz as f32);
                    if cone_sdf(p, height as f32, radius as f32, CANOPY_ROUNDNESS) <= 0.0 {
                        world.set_block_id(blocks.leaves, x + lx, y + ly + trunk, z + lz);
                    }
                }
            }
        }
        Ok(())
    }
}

impl ChunkPass for DecorationPass {
    fn name(&self) -> &'static str {
        "decoration"
    }

    fn validate(&self, chunk: &Chunk, world: &dyn WorldAccess) -> bool {
        chunk.id() == ChunkId::ORIGIN || world.is_chunk_surrounded(chunk.id())
    }

    fn process(&self, chunk: &Chunk, world: &dyn WorldAccess) -> Result<(), PassError> {
        let blocks = self.resolve(world)?;
        let (ox, oy, oz) = chunk.world_position();
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let y = chunk.height_at(x, z);
                if y <= 0 {
                    continue;
                }
                let (wx, wy, wz) = (ox + x, oy + y + 1, oz + z);
                let size = CHUNK_SIZE as f32;
                let distance = self
                    .worley
                    .distance(wx as f32 * size, wy as f32 * size, wz as f32 * size);
                if distance < self.threshold && world.block_id(wx, wy - 1, wz) == blocks.grass {
                    self.create_tree(world, i64::from(x + y + z), wx, wy, wz)?;
                }
            }
        }
        Ok(())
    }
}
