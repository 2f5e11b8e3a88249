use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use strata_blocks::{AIR, BlockId, BlockRegistry};
use strata_chunk::{Chunk, ChunkId, chunk_id_of, to_local};
use strata_geom::Vec3;
use strata_mesh_cpu::Mesh;

use crate::consumer::MeshConsumer;
use crate::decoration::DEFAULT_TREE_THRESHOLD;
use crate::error::WorldError;
use crate::mesher::ChunkMesher;
use crate::pass::WorldAccess;
use crate::processor::ChunkProcessor;
use crate::raycast::{RayHit, RayOptions, first_hit};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorldConfig {
    /// Diameter, in chunks, of the cube kept around the player.
    pub render_distance: i32,
    pub spawn_radius: i32,
    pub mesh_resolution: usize,
    pub generator_workers: usize,
    pub mesher_workers: usize,
    pub remote_generator: bool,
    pub remote_mesher: bool,
    pub handshake_timeout_ms: u64,
    pub tree_threshold: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            render_distance: 8,
            spawn_radius: 3,
            mesh_resolution: 1,
            generator_workers: 2,
            mesher_workers: 2,
            remote_generator: true,
            remote_mesher: true,
            handshake_timeout_ms: 5000,
            tree_threshold: DEFAULT_TREE_THRESHOLD,
        }
    }
}

/// Everything a `World` is built from.
pub struct WorldParts {
    pub registry: Arc<BlockRegistry>,
    pub processor: ChunkProcessor,
    pub mesher: Arc<dyn ChunkMesher>,
    pub consumer: Arc<dyn MeshConsumer>,
    pub config: WorldConfig,
}

/// Chunk ids in insertion order, without duplicates.
#[derive(Clone, Debug, Default)]
pub struct ChunkSet {
    order: Vec<ChunkId>,
    members: HashSet<ChunkId>,
}

impl ChunkSet {
    pub fn insert(&mut self, id: ChunkId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push(id);
        true
    }

    pub fn remove(&mut self, id: ChunkId) -> bool {
        if !self.members.remove(&id) {
            return false;
        }
        self.order.retain(|c| *c != id);
        true
    }

    #[inline]
    pub fn contains(&self, id: ChunkId) -> bool {
        self.members.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.order.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<ChunkId> {
        self.order.clone()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum TickOutcome {
    Ran {
        /// Chunks that finished a pass but are not done yet.
        advanced: usize,
        /// Chunks that became visible.
        completed: usize,
        /// Visible chunks re-meshed because they were dirty.
        updated: usize,
    },
    /// Another tick was still running.
    Skipped,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldStatus {
    pub staged_chunks: Vec<ChunkId>,
    pub chunks: Vec<ChunkId>,
    pub visible_chunks: Vec<ChunkId>,
    pub meshed_chunks: usize,
    pub dirty_chunks: usize,
}

struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the chunk map and schedules chunks through the pipeline, the mesher
/// and out to the consumer.
pub struct World {
    registry: Arc<BlockRegistry>,
    processor: ChunkProcessor,
    mesher: Arc<dyn ChunkMesher>,
    consumer: Arc<dyn MeshConsumer>,
    config: WorldConfig,
    chunks: RwLock<HashMap<ChunkId, Arc<Chunk>>>,
    staged: Mutex<ChunkSet>,
    visible: Mutex<ChunkSet>,
    meshed: RwLock<HashMap<ChunkId, Arc<Mesh>>>,
    processing: AtomicBool,
}

impl World {
    /// Initializes every pass before returning.
    pub fn new(parts: WorldParts) -> Result<Self, WorldError> {
        let mut processor = parts.processor;
        processor.initialize()?;
        Ok(Self {
            registry: parts.registry,
            processor,
            mesher: parts.mesher,
            consumer: parts.consumer,
            config: parts.config,
            chunks: RwLock::new(HashMap::new()),
            staged: Mutex::new(ChunkSet::default()),
            visible: Mutex::new(ChunkSet::default()),
            meshed: RwLock::new(HashMap::new()),
            processing: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn get_chunk(&self, id: ChunkId) -> Option<Arc<Chunk>> {
        read(&self.chunks).get(&id).cloned()
    }

    pub fn get_or_create_chunk(&self, id: ChunkId) -> Arc<Chunk> {
        if let Some(chunk) = self.get_chunk(id) {
            return chunk;
        }
        write(&self.chunks)
            .entry(id)
            .or_insert_with(|| Arc::new(Chunk::new(id)))
            .clone()
    }

    /// Identifier of the block at world coordinates. Without `create`, a
    /// missing chunk reads as air.
    pub fn get_block(&self, wx: i32, wy: i32, wz: i32, create: bool) -> &str {
        let (id, x, y, z) = to_local(wx, wy, wz);
        let chunk = if create {
            Some(self.get_or_create_chunk(id))
        } else {
            self.get_chunk(id)
        };
        let block = chunk.map_or(AIR, |c| BlockId::from(c.get_block(x, y, z)));
        self.registry.identifier(block)
    }

    pub fn set_block(&self, block: &str, wx: i32, wy: i32, wz: i32) -> Result<(), WorldError> {
        let id = self.registry.require_id(block)?;
        self.set_block_id(id, wx, wy, wz);
        Ok(())
    }

    /// Queues a chunk for the pipeline unless it is already visible.
    pub fn stage(&self, id: ChunkId) -> bool {
        if lock(&self.visible).contains(id) {
            return false;
        }
        lock(&self.staged).insert(id)
    }

    /// Stages the `2r × 2r × 2r` cube of chunks around the origin, top down.
    pub fn generate_spawn(&self, radius: i32) -> usize {
        log::info!(target: "world", "Creating spawn (radius {radius})");
        let mut staged = 0;
        for x in -radius..radius {
            for z in -radius..radius {
                for y in (-radius + 1..=radius).rev() {
                    if self.stage(ChunkId::new(x, y, z)) {
                        staged += 1;
                    }
                }
            }
        }
        staged
    }

    /// Advances every staged chunk by at most one pass, meshes the ones that
    /// finished, and re-meshes dirty visible chunks. Returns `Skipped` when
    /// another tick is in flight.
    pub fn process_chunks(&self) -> TickOutcome {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!(target: "world", "tick dropped, previous one still running");
            return TickOutcome::Skipped;
        }
        let _guard = TickGuard(&self.processing);

        let (mut advanced, mut completed, mut updated) = (0, 0, 0);
        let staged = lock(&self.staged).to_vec();
        for id in staged {
            let chunk = self.get_or_create_chunk(id);
            let before = chunk.stage();
            if !self.processor.process(&chunk, self) {
                if chunk.stage() != before {
                    advanced += 1;
                }
                continue;
            }

            lock(&self.staged).remove(id);
            lock(&self.visible).insert(id);
            chunk.clear_dirty();
            completed += 1;
            self.present(&chunk);
        }

        let visible = lock(&self.visible).to_vec();
        for id in visible {
            let Some(chunk) = self.get_chunk(id) else {
                continue;
            };
            if !chunk.clear_dirty() {
                continue;
            }
            updated += 1;
            if let Err(e) = self.refresh(&chunk) {
                log::warn!(target: "mesher", "re-meshing {id} failed: {e}");
            }
        }

        TickOutcome::Ran {
            advanced,
            completed,
            updated,
        }
    }

    fn present(&self, chunk: &Arc<Chunk>) {
        let result = self
            .mesh_of(chunk)
            .and_then(|mesh| Ok(self.consumer.add_chunk(chunk, &mesh)?));
        if let Err(e) = result {
            log::warn!(target: "mesher", "meshing {} failed: {e}", chunk.id());
        }
    }

    fn mesh_of(&self, chunk: &Arc<Chunk>) -> Result<Arc<Mesh>, WorldError> {
        let id = chunk.id();
        if let Some(mesh) = read(&self.meshed).get(&id).cloned() {
            log::debug!(target: "mesher", "getting mesh from cache {id}");
            return Ok(mesh);
        }
        let mesh = Arc::new(self.mesher.generate(chunk, self.config.mesh_resolution)?);
        write(&self.meshed).insert(id, mesh.clone());
        Ok(mesh)
    }

    fn refresh(&self, chunk: &Arc<Chunk>) -> Result<(), WorldError> {
        write(&self.meshed).remove(&chunk.id());
        let mesh = self.mesh_of(chunk)?;
        log::debug!(target: "mesher", "Updated chunk mesh {}", chunk.id());
        self.consumer.update_chunk(chunk, &mesh)?;
        Ok(())
    }

    /// Cached mesh of a chunk, built on first request.
    pub fn generate_chunk_mesh(&self, id: ChunkId) -> Result<Arc<Mesh>, WorldError> {
        self.mesh_of(&self.get_or_create_chunk(id))
    }

    /// Drops the cached mesh, rebuilds it and sends it to the consumer.
    pub fn update_chunk(&self, id: ChunkId) -> Result<(), WorldError> {
        self.refresh(&self.get_or_create_chunk(id))
    }

    /// Stages the chunks within half the render distance of the player's chunk
    /// and evicts everything farther away.
    pub fn on_player_move(&self, x: f32, y: f32, z: f32) {
        let reach = (self.config.render_distance as f32 / 2.0).ceil() as i32;
        let centre = chunk_id_of(x.floor() as i32, y.floor() as i32, z.floor() as i32);

        let mut newly_staged = 0;
        for dx in -reach..=reach {
            for dy in (-reach..=reach).rev() {
                for dz in -reach..=reach {
                    let id = centre.offset(dx, dy, dz);
                    if !read(&self.chunks).contains_key(&id) && self.stage(id) {
                        newly_staged += 1;
                    }
                }
            }
        }

        let out_of_range = |id: &ChunkId| {
            (id.cx - centre.cx).abs() > reach || (id.cy - centre.cy).abs() > reach || (id.cz - centre.cz).abs() > reach
        };
        let mut doomed: HashSet<ChunkId> = read(&self.chunks).keys().copied().filter(out_of_range).collect();
        doomed.extend(lock(&self.staged).iter().filter(out_of_range));

        for &id in &doomed {
            write(&self.chunks).remove(&id);
            write(&self.meshed).remove(&id);
            lock(&self.staged).remove(id);
            let was_visible = lock(&self.visible).remove(id);
            if was_visible {
                if let Err(e) = self.consumer.remove_chunk(id) {
                    log::warn!(target: "world", "removing {id} from the consumer failed: {e}");
                }
            }
        }
        if newly_staged > 0 || !doomed.is_empty() {
            log::debug!(target: "world", "player at {centre}: staged {newly_staged}, evicted {}", doomed.len());
        }
    }

    /// First block along the ray whose identifier is not ignored. Chunks are
    /// never created by the walk.
    pub fn cast_ray(&self, origin: Vec3, direction: Vec3, options: &RayOptions) -> Option<RayHit> {
        let hit = first_hit(origin, direction, options.max_distance, |x, y, z| {
            let block = self.get_block(x, y, z, false);
            !options.ignore.iter().any(|i| i == block)
        })?;
        let [x, y, z] = hit.position;
        Some(RayHit {
            position: hit.position,
            normal: hit.normal,
            block: self.get_block(x, y, z, false).to_string(),
        })
    }

    pub fn status(&self) -> WorldStatus {
        let (mut chunks, dirty_chunks) = {
            let map = read(&self.chunks);
            let dirty = map.values().filter(|c| c.is_dirty()).count();
            (map.keys().copied().collect::<Vec<_>>(), dirty)
        };
        chunks.sort();
        WorldStatus {
            staged_chunks: lock(&self.staged).to_vec(),
            chunks,
            visible_chunks: lock(&self.visible).to_vec(),
            meshed_chunks: read(&self.meshed).len(),
            dirty_chunks,
        }
    }
}

impl WorldAccess for World {
    fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    fn has_chunk(&self, id: ChunkId) -> bool {
        read(&self.chunks).contains_key(&id)
    }

    fn block_id(&self, wx: i32, wy: i32, wz: i32) -> BlockId {
        let (id, x, y, z) = to_local(wx, wy, wz);
        self.get_chunk(id)
            .map_or(AIR, |c| BlockId::from(c.get_block(x, y, z)))
    }

    fn set_block_id(&self, block: BlockId, wx: i32, wy: i32, wz: i32) {
        let (id, x, y, z) = to_local(wx, wy, wz);
        let chunk = self.get_or_create_chunk(id);
        chunk.set_block(block as u8, x, y, z);
        chunk.mark_dirty();
    }
}
