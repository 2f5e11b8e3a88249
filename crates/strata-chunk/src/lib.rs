//! Chunk storage: spatial indexing, shared atomic voxel buffers, and chunks.
#![forbid(unsafe_code)]

pub mod buffer;
pub mod chunk;
pub mod spatial;

pub use buffer::{SharedBuffer, VoxelCells};
pub use chunk::{Chunk, ChunkError, Stage};
pub use spatial::{
    CHUNK_SIZE, CHUNK_VOLUME, ChunkId, ParseChunkIdError, chunk_id_of, local_offset,
    offset_to_local, to_local,
};
