use std::sync::Arc;

use strata_blocks::{BlockId, BlockModelCompiler, Face, FaceSet, MeshFragment, ModelError};
use strata_chunk::{CHUNK_SIZE, Chunk};

use crate::Mesh;

/// Emits every voxel face not hidden by its neighbour's cull set.
#[derive(Clone, Debug)]
pub struct GreedyMesher {
    compiler: Arc<BlockModelCompiler>,
}

/// Per-call fragment lookups, so the shared cache lock is taken once per id.
struct FragmentTable<'a> {
    compiler: &'a BlockModelCompiler,
    slots: Vec<Option<Arc<MeshFragment>>>,
}

impl<'a> FragmentTable<'a> {
    fn new(compiler: &'a BlockModelCompiler) -> Self {
        Self {
            compiler,
            slots: vec![None; 256],
        }
    }

    fn get(&mut self, id: u8) -> Result<Arc<MeshFragment>, ModelError> {
        if let Some(hit) = &self.slots[id as usize] {
            return Ok(hit.clone());
        }
        let fragment = self.compiler.fragment(id as BlockId)?;
        self.slots[id as usize] = Some(fragment.clone());
        Ok(fragment)
    }

    fn cull_faces(&mut self, id: u8) -> Result<FaceSet, ModelError> {
        if id == 0 {
            return Ok(FaceSet::EMPTY);
        }
        Ok(self.get(id)?.cull_faces)
    }
}

impl GreedyMesher {
    pub fn new(compiler: Arc<BlockModelCompiler>) -> Self {
        Self { compiler }
    }

    #[inline]
    pub fn compiler(&self) -> &Arc<BlockModelCompiler> {
        &self.compiler
    }

    /// Meshes `chunk`, sampling every `resolution`-th voxel on each axis
    /// (0 is treated as 1). Each sample covers a `resolution`^3 cell.
    pub fn generate(&self, chunk: &Chunk, resolution: usize) -> Result<Mesh, ModelError> {
        let step = resolution.clamp(1, CHUNK_SIZE as usize) as i32;
        let scale = step as f32;
        let mut table = FragmentTable::new(&self.compiler);
        let mut mesh = Mesh::default();

        for y in (0..CHUNK_SIZE).step_by(step as usize) {
            for z in (0..CHUNK_SIZE).step_by(step as usize) {
                for x in (0..CHUNK_SIZE).step_by(step as usize) {
                    let id = chunk.get_block(x, y, z);
                    if id == 0 {
                        continue;
                    }
                    let fragment = table.get(id)?;
                    if fragment.is_empty() {
                        continue;
                    }
                    let origin = [x as f32, y as f32, z as f32];
                    if !fragment.is_cube {
                        mesh.splice(&fragment, origin, scale);
                        continue;
                    }
                    for face in Face::ALL {
                        let (dx, dy, dz) = face.delta();
                        let neighbor = chunk.get_block(x + dx * step, y + dy * step, z + dz * step);
                        if table.cull_faces(neighbor)?.contains(face.opposite()) {
                            continue;
                        }
                        if let Some(slice) = fragment.face(face) {
                            mesh.push_face(slice, origin, scale);
                        }
                    }
                }
            }
        }

        log::debug!(
            target: "mesher",
            "meshed chunk {} at resolution {step}: {} vertices, {} triangles",
            chunk.id(),
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }
}
