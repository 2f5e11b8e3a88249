#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashMap;
use strata_blocks::{AIR, AssetPaths, BlockId, BlockModelCompiler, BlockRegistry};
use strata_chunk::{Chunk, ChunkId, to_local};
use strata_mesh_cpu::Mesh;
use strata_rpc::RpcError;
use strata_world::{MeshConsumer, WorldAccess};

pub fn assets() -> AssetPaths {
    AssetPaths::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets"))
}

pub fn asset_root() -> String {
    assets().root.to_string_lossy().into_owned()
}

pub fn compiler() -> Arc<BlockModelCompiler> {
    Arc::new(BlockModelCompiler::load(&assets()).unwrap())
}

pub fn registry() -> Arc<BlockRegistry> {
    Arc::new(BlockRegistry::load_from_path(assets().blocks()).unwrap())
}

/// Bare chunk map for driving passes without a `World`.
pub struct Sandbox {
    pub registry: Arc<BlockRegistry>,
    chunks: Mutex<HashMap<ChunkId, Arc<Chunk>>>,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            registry: registry(),
            chunks: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, id: ChunkId) -> Arc<Chunk> {
        self.chunks
            .lock()
            .unwrap()
            .entry(id)
            .or_insert_with(|| Arc::new(Chunk::new(id)))
            .clone()
    }

    pub fn id(&self, name: &str) -> BlockId {
        self.registry.require_id(name).unwrap()
    }

    pub fn name_at(&self, wx: i32, wy: i32, wz: i32) -> &str {
        self.registry.identifier(self.block_id(wx, wy, wz))
    }
}

impl WorldAccess for Sandbox {
    fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    fn has_chunk(&self, id: ChunkId) -> bool {
        self.chunks.lock().unwrap().contains_key(&id)
    }

    fn block_id(&self, wx: i32, wy: i32, wz: i32) -> BlockId {
        let (id, x, y, z) = to_local(wx, wy, wz);
        let chunk = self.chunks.lock().unwrap().get(&id).cloned();
        chunk.map_or(AIR, |c| BlockId::from(c.get_block(x, y, z)))
    }

    fn set_block_id(&self, block: BlockId, wx: i32, wy: i32, wz: i32) {
        let (id, x, y, z) = to_local(wx, wy, wz);
        let chunk = self.insert(id);
        chunk.set_block(block as u8, x, y, z);
        chunk.mark_dirty();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Added(ChunkId, Mesh),
    Updated(ChunkId, Mesh),
    Removed(ChunkId),
}

/// Mesh consumer that forwards everything it receives to a channel.
pub struct Recorder {
    tx: Sender<Event>,
}

impl Recorder {
    pub fn new() -> (Arc<Self>, Receiver<Event>) {
        let (tx, rx) = unbounded();
        (Arc::new(Self { tx }), rx)
    }
}

impl MeshConsumer for Recorder {
    fn add_chunk(&self, chunk: &Arc<Chunk>, mesh: &Mesh) -> Result<(), RpcError> {
        let _ = self.tx.send(Event::Added(chunk.id(), mesh.clone()));
        Ok(())
    }

    fn update_chunk(&self, chunk: &Arc<Chunk>, mesh: &Mesh) -> Result<(), RpcError> {
        let _ = self.tx.send(Event::Updated(chunk.id(), mesh.clone()));
        Ok(())
    }

    fn remove_chunk(&self, id: ChunkId) -> Result<(), RpcError> {
        let _ = self.tx.send(Event::Removed(id));
        Ok(())
    }
}
