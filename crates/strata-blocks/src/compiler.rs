use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use strata_geom::Vec3;

use crate::AssetPaths;
use crate::atlas::{TextureAtlas, UvRect};
use crate::error::ModelError;
use crate::face::{Face, FaceSet};
use crate::model::{ModelLibrary, ResolvedModel, ResolvedPart};
use crate::registry::{Block, BlockId, BlockRegistry};

/// Model-space units per block edge.
pub const BLOCK_MODEL_SIZE: f32 = 16.0;

/// Picks `[u, v, u2, v2]` components for the four face corners.
const UV_CORNERS: [usize; 8] = [0, 3, 2, 3, 0, 1, 2, 1];
const UV_CORNERS_MIRRORED: [usize; 8] = [2, 3, 0, 3, 2, 1, 0, 1];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 1, 3, 2];

/// Triangle geometry for one block type in block-local space `[0,1]^3`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshFragment {
    pub vertices: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
    pub cull_faces: FaceSet,
    pub is_cube: bool,
}

/// The four vertices of one face of a cube fragment.
#[derive(Clone, Copy, Debug)]
pub struct FaceSlice<'a> {
    pub vertices: &'a [f32],
    pub normals: &'a [f32],
    pub uvs: &'a [f32],
}

impl MeshFragment {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Cube fragments store faces in [`Face::ALL`] order, four vertices each.
    pub fn face(&self, face: Face) -> Option<FaceSlice<'_>> {
        if !self.is_cube {
            return None;
        }
        let v = face.index() * 4;
        Some(FaceSlice {
            vertices: self.vertices.get(v * 3..v * 3 + 12)?,
            normals: self.normals.get(v * 3..v * 3 + 12)?,
            uvs: self.uvs.get(v * 2..v * 2 + 8)?,
        })
    }

    fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3, uv: UvRect, mirrored: bool) {
        let base = self.vertex_count() as u32;
        for c in corners {
            self.vertices.extend_from_slice(&c.to_array());
            self.normals.extend_from_slice(&normal.to_array());
        }
        let order = if mirrored {
            &UV_CORNERS_MIRRORED
        } else {
            &UV_CORNERS
        };
        self.uvs.extend(order.iter().map(|&i| uv[i]));
        self.indices.extend(QUAD_INDICES.iter().map(|i| base + i));
    }
}

/// Expands block models into cached mesh fragments, one per block id.
#[derive(Debug)]
pub struct BlockModelCompiler {
    registry: Arc<BlockRegistry>,
    models: ModelLibrary,
    atlas: TextureAtlas,
    fragments: RwLock<HashMap<BlockId, Arc<MeshFragment>>>,
}

impl BlockModelCompiler {
    pub fn new(registry: Arc<BlockRegistry>, models: ModelLibrary, atlas: TextureAtlas) -> Self {
        Self {
            registry,
            models,
            atlas,
            fragments: RwLock::new(HashMap::new()),
        }
    }

    /// Loads registry, models and atlas from `assets` and compiles every
    /// block so broken references fail here rather than during meshing.
    pub fn load(assets: &AssetPaths) -> Result<Self, ModelError> {
        let registry = Arc::new(BlockRegistry::load_from_path(assets.blocks())?);
        let models = ModelLibrary::load_dir(assets.models())?;
        let atlas = TextureAtlas::load_from_path(assets.atlas())?;
        let compiler = Self::new(registry, models, atlas);
        let count = compiler.prepare_all()?;
        log::info!("compiled {count} block models from {}", assets.root.display());
        Ok(compiler)
    }

    #[inline]
    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    #[inline]
    pub fn atlas(&self) -> &TextureAtlas {
        &self.atlas
    }

    #[inline]
    pub fn models(&self) -> &ModelLibrary {
        &self.models
    }

    pub fn prepare_all(&self) -> Result<usize, ModelError> {
        let mut count = 0;
        for block in self.registry.iter() {
            self.fragment(block.id)?;
            count += 1;
        }
        Ok(count)
    }

    /// Cached fragment for `id`, compiling it on first use.
    pub fn fragment(&self, id: BlockId) -> Result<Arc<MeshFragment>, ModelError> {
        if let Some(hit) = self.cached(id) {
            return Ok(hit);
        }
        let block = self.registry.require(id)?;
        let fragment = Arc::new(self.compile(block)?);
        if let Ok(mut cache) = self.fragments.write() {
            cache.insert(id, fragment.clone());
        }
        Ok(fragment)
    }

    pub fn cached(&self, id: BlockId) -> Option<Arc<MeshFragment>> {
        self.fragments.read().ok()?.get(&id).cloned()
    }

    pub fn compile(&self, block: &Block) -> Result<MeshFragment, ModelError> {
        let Some(model_ref) = &block.model else {
            return Ok(MeshFragment::default());
        };
        let model = self.models.resolve(&model_ref.name, &model_ref.textures)?;
        self.compile_model(&model)
    }

    pub fn compile_model(&self, model: &ResolvedModel) -> Result<MeshFragment, ModelError> {
        let mut out = MeshFragment {
            cull_faces: model.cull_faces,
            is_cube: is_full_cube(model),
            ..MeshFragment::default()
        };
        for part in &model.parts {
            self.compile_part(part, model.uv_lock, &mut out)?;
        }
        Ok(out)
    }

    fn compile_part(
        &self,
        part: &ResolvedPart,
        uv_lock: bool,
        out: &mut MeshFragment,
    ) -> Result<(), ModelError> {
        let size = part.size.to_array();
        let flat: Vec<usize> = (0..3).filter(|&a| size[a] == 0.0).collect();
        match flat.as_slice() {
            [] => {
                for face in Face::ALL {
                    let uv = if uv_lock {
                        self.locked_uv(part, face)?
                    } else {
                        self.atlas.uv(part.texture(face))
                    };
                    emit_face(part, face, uv, false, out);
                }
            }
            [axis] => {
                let front = Face::from_index(axis * 2);
                let back = front.opposite();
                let front_tex = part.texture(front);
                emit_face(part, front, self.atlas.uv(front_tex), false, out);
                let back_tex = part.texture(back).or(front_tex);
                emit_face(part, back, self.atlas.uv(back_tex), true, out);
            }
            _ => {
                log::warn!(target: "mesher", "skipping degenerate model part of size {size:?}");
            }
        }
        Ok(())
    }

    fn locked_uv(&self, part: &ResolvedPart, face: Face) -> Result<UvRect, ModelError> {
        let tile = self.atlas.tile_size() as f32 / BLOCK_MODEL_SIZE;
        let p = part.position * tile;
        let s = part.size * tile;
        let (offset, size) = match face {
            Face::Front | Face::Back => ([p.x, p.y], [s.x, s.y]),
            Face::Top | Face::Bottom => ([p.x, p.z], [s.x, s.z]),
            Face::Left | Face::Right => ([p.z, p.y], [s.z, s.y]),
        };
        self.atlas.box_uv(part.texture(face), offset, size)
    }
}

fn is_full_cube(model: &ResolvedModel) -> bool {
    match model.parts.as_slice() {
        [part] => {
            part.size == Vec3::ONE * BLOCK_MODEL_SIZE
                && part.rotation.is_none_or(|r| r == Vec3::ZERO)
        }
        _ => false,
    }
}

fn emit_face(part: &ResolvedPart, face: Face, uv: UvRect, mirrored: bool, out: &mut MeshFragment) {
    let origin = part.position / BLOCK_MODEL_SIZE;
    let extent = part.size / BLOCK_MODEL_SIZE;
    let mut corners = face.corners().map(|c| origin + Vec3::from(c).scale(extent));
    let mut normal = face.normal();
    if let Some(rot) = part.rotation.filter(|r| *r != Vec3::ZERO) {
        let center = origin + extent * 0.5;
        corners = corners.map(|c| center + (c - center).rotate_xyz(rot));
        normal = normal.rotate_xyz(rot);
    }
    out.push_quad(corners, normal, uv, mirrored);
}
