use strata_blocks::{BlockId, BlockRegistry};
use strata_chunk::{Chunk, ChunkId};

use crate::error::PassError;

/// What a pass may see of the world around the chunk it processes.
pub trait WorldAccess: Send + Sync {
    fn registry(&self) -> &BlockRegistry;

    fn has_chunk(&self, id: ChunkId) -> bool;

    /// Block at world coordinates; missing chunks read as air and are not created.
    fn block_id(&self, wx: i32, wy: i32, wz: i32) -> BlockId;

    /// Writes a block, creating the owning chunk and marking it dirty.
    fn set_block_id(&self, block: BlockId, wx: i32, wy: i32, wz: i32);

    fn is_chunk_surrounded(&self, id: ChunkId) -> bool {
        id.neighbors().into_iter().all(|n| self.has_chunk(n))
    }

    fn block_identifier(&self, wx: i32, wy: i32, wz: i32) -> &str {
        self.registry().identifier(self.block_id(wx, wy, wz))
    }
}

/// One stage of the chunk pipeline.
pub trait ChunkPass: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-time setup before any chunk is processed.
    fn initialize(&mut self) -> Result<(), PassError> {
        Ok(())
    }

    /// Whether the chunk's prerequisites are met; must not mutate anything.
    fn validate(&self, chunk: &Chunk, world: &dyn WorldAccess) -> bool;

    fn process(&self, chunk: &Chunk, world: &dyn WorldAccess) -> Result<(), PassError>;
}
