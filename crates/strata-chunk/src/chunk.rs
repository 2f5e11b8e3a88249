use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use thiserror::Error;

use crate::buffer::{SharedBuffer, VoxelCells};
use crate::spatial::{CHUNK_SIZE, CHUNK_VOLUME, ChunkId, local_offset};

const UNKNOWN_HEIGHT: i16 = i16::MIN;
const COLUMNS: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Pipeline position of a chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    #[default]
    Unloaded,
    Pass(String),
    Done,
}

impl Stage {
    pub const UNLOADED: &'static str = "unloaded";
    pub const DONE: &'static str = "done";

    pub fn as_str(&self) -> &str {
        match self {
            Stage::Unloaded => Self::UNLOADED,
            Stage::Pass(name) => name.as_str(),
            Stage::Done => Self::DONE,
        }
    }

    pub fn parse(s: &str) -> Stage {
        match s {
            Self::UNLOADED => Stage::Unloaded,
            Self::DONE => Stage::Done,
            name => Stage::Pass(name.to_string()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("chunk buffer holds {actual} voxels, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// One chunk's voxels plus its pipeline metadata. Shared by `Arc`; all
/// mutation goes through atomics or short internal locks.
pub struct Chunk {
    id: ChunkId,
    voxels: SharedBuffer,
    stage: RwLock<Stage>,
    dirty: AtomicBool,
    heights: Mutex<Vec<i16>>,
}

impl Chunk {
    pub fn new(id: ChunkId) -> Self {
        Self::from_parts(id, SharedBuffer::new(CHUNK_VOLUME), Stage::Unloaded, false)
    }

    /// Wraps an existing buffer without copying it.
    pub fn with_buffer(id: ChunkId, voxels: SharedBuffer) -> Result<Self, ChunkError> {
        if voxels.len() != CHUNK_VOLUME {
            return Err(ChunkError::BufferSize {
                expected: CHUNK_VOLUME,
                actual: voxels.len(),
            });
        }
        Ok(Self::from_parts(id, voxels, Stage::Unloaded, false))
    }

    fn from_parts(id: ChunkId, voxels: SharedBuffer, stage: Stage, dirty: bool) -> Self {
        Self {
            id,
            voxels,
            stage: RwLock::new(stage),
            dirty: AtomicBool::new(dirty),
            heights: Mutex::new(vec![UNKNOWN_HEIGHT; COLUMNS]),
        }
    }

    /// Rebuilds a chunk around a shared buffer, keeping pipeline metadata.
    pub fn restore(id: ChunkId, voxels: SharedBuffer, stage: Stage, dirty: bool) -> Result<Self, ChunkError> {
        let chunk = Self::with_buffer(id, voxels)?;
        chunk.set_stage(stage);
        chunk.dirty.store(dirty, Ordering::SeqCst);
        Ok(chunk)
    }

    #[inline]
    pub fn id(&self) -> ChunkId {
        self.id
    }

    #[inline]
    pub fn buffer(&self) -> &SharedBuffer {
        &self.voxels
    }

    /// World coordinates of the minimum corner.
    #[inline]
    pub fn world_position(&self) -> (i32, i32, i32) {
        self.id.world_origin()
    }

    /// World coordinates relative to this chunk. Results outside
    /// `[0, CHUNK_SIZE)` belong to another chunk.
    #[inline]
    pub fn to_local(&self, wx: i32, wy: i32, wz: i32) -> (i32, i32, i32) {
        let (ox, oy, oz) = self.world_position();
        (wx - ox, wy - oy, wz - oz)
    }

    /// Block at a local coordinate; 0 outside the chunk.
    #[inline]
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> u8 {
        match local_offset(x, y, z) {
            -1 => 0,
            i => self.voxels.load(i as usize),
        }
    }

    /// Writes a block at a local coordinate; no-op outside the chunk.
    #[inline]
    pub fn set_block(&self, block: u8, x: i32, y: i32, z: i32) {
        let i = local_offset(x, y, z);
        if i >= 0 {
            self.voxels.store(i as usize, block);
        }
    }

    #[inline]
    pub fn load_index(&self, index: usize) -> u8 {
        self.voxels.load(index)
    }

    #[inline]
    pub fn store_index(&self, index: usize, block: u8) {
        self.voxels.store(index, block);
    }

    /// Replaces the contents element by element.
    pub fn copy_from(&self, src: &impl VoxelCells) {
        self.voxels.copy_from(src);
        self.forget_heights();
    }

    pub fn is_empty(&self) -> bool {
        (0..self.voxels.len()).all(|i| self.voxels.load(i) == 0)
    }

    pub fn stage(&self) -> Stage {
        self.stage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_stage(&self, stage: Stage) {
        *self.stage.write().unwrap_or_else(PoisonError::into_inner) = stage;
    }

    pub fn is_done(&self) -> bool {
        matches!(*self.stage.read().unwrap_or_else(PoisonError::into_inner), Stage::Done)
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Flags the chunk for re-meshing and drops the height memo.
    pub fn mark_dirty(&self) {
        self.forget_heights();
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Clears the dirty flag, returning whether it was set.
    pub fn clear_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    /// Topmost non-air `y` in column `(x, z)`, or -1 when the column is empty
    /// or outside the chunk. Memoized until [`Chunk::mark_dirty`].
    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        if !(0..CHUNK_SIZE).contains(&x) || !(0..CHUNK_SIZE).contains(&z) {
            return -1;
        }
        let column = (z * CHUNK_SIZE + x) as usize;
        let mut heights = self.heights.lock().unwrap_or_else(PoisonError::into_inner);
        if heights[column] != UNKNOWN_HEIGHT {
            return i32::from(heights[column]);
        }
        let height = (0..CHUNK_SIZE)
            .rev()
            .find(|&y| self.get_block(x, y, z) != 0)
            .unwrap_or(-1);
        heights[column] = height as i16;
        height
    }

    fn forget_heights(&self) {
        let mut heights = self.heights.lock().unwrap_or_else(PoisonError::into_inner);
        heights.fill(UNKNOWN_HEIGHT);
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("id", &self.id)
            .field("stage", &self.stage())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
