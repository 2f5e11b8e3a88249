use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use strata_geom::Vec3;

use crate::config::{ModelDef, PartDef, read_asset};
use crate::error::{AssetError, ModelError};
use crate::face::{Face, FaceSet};

/// A model's `extends` chain flattened onto its root model.
#[derive(Clone, Debug, PartialEq)]
pub struct Lineage {
    pub name: String,
    /// Ancestors, nearest first; the last entry is the root.
    pub ancestors: Vec<String>,
    /// Root slot name -> this model's slot name.
    pub slots: BTreeMap<String, String>,
    pub cull_faces: FaceSet,
    pub uv_lock: bool,
}

impl Lineage {
    pub fn root(&self) -> &str {
        self.ancestors.last().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPart {
    pub position: Vec3,
    pub size: Vec3,
    pub rotation: Option<Vec3>,
    /// Texture per face, indexed by [`Face::index`].
    pub textures: [Option<String>; 6],
}

impl ResolvedPart {
    #[inline]
    pub fn texture(&self, face: Face) -> Option<&str> {
        self.textures[face.index()].as_deref()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedModel {
    pub name: String,
    pub extends: Vec<String>,
    pub parts: Vec<ResolvedPart>,
    pub cull_faces: FaceSet,
    pub uv_lock: bool,
}

type BindingKey = (String, BTreeMap<String, String>);

/// Model definitions plus memoized inheritance and texture resolution.
#[derive(Debug, Default)]
pub struct ModelLibrary {
    defs: HashMap<String, ModelDef>,
    lineages: RwLock<HashMap<String, Arc<Lineage>>>,
    resolved: RwLock<HashMap<BindingKey, Arc<ResolvedModel>>>,
}

impl ModelLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.json` file in `dir`, keyed by file stem.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, AssetError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| AssetError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut lib = Self::new();
        for entry in entries {
            let path = entry
                .map_err(|source| AssetError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let def: ModelDef = read_asset(&path)?;
            lib.insert(stem, def);
        }
        log::debug!("loaded {} block models from {}", lib.len(), dir.display());
        Ok(lib)
    }

    pub fn insert(&mut self, name: impl Into<String>, def: ModelDef) {
        self.defs.insert(name.into(), def);
        if let Ok(memo) = self.lineages.get_mut() {
            memo.clear();
        }
        if let Ok(memo) = self.resolved.get_mut() {
            memo.clear();
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn lineage(&self, name: &str) -> Result<Arc<Lineage>, ModelError> {
        let mut stack = Vec::new();
        self.lineage_inner(name, &mut stack)
    }

    fn lineage_inner(&self, name: &str, stack: &mut Vec<String>) -> Result<Arc<Lineage>, ModelError> {
        if let Ok(memo) = self.lineages.read() {
            if let Some(hit) = memo.get(name) {
                return Ok(hit.clone());
            }
        }
        if stack.iter().any(|s| s == name) {
            let mut cycle = stack.clone();
            cycle.push(name.to_string());
            return Err(ModelError::Cycle(cycle));
        }
        let def = self
            .defs
            .get(name)
            .ok_or_else(|| ModelError::MissingModel(name.to_string()))?;

        let lineage = match &def.extends {
            Some(ext) => {
                stack.push(name.to_string());
                let parent = self.lineage_inner(&ext.model, stack);
                stack.pop();
                let parent = parent?;
                let slots = parent
                    .slots
                    .iter()
                    .filter_map(|(root_slot, parent_slot)| {
                        ext.textures
                            .get(parent_slot)
                            .map(|own| (root_slot.clone(), own.clone()))
                    })
                    .collect();
                let mut ancestors = vec![ext.model.clone()];
                ancestors.extend(parent.ancestors.iter().cloned());
                Lineage {
                    name: name.to_string(),
                    ancestors,
                    slots,
                    cull_faces: def
                        .cull_faces
                        .as_ref()
                        .map_or(parent.cull_faces, |f| f.iter().copied().collect()),
                    uv_lock: def.uv_lock.unwrap_or(parent.uv_lock),
                }
            }
            None => {
                let slots = def
                    .textures
                    .iter()
                    .chain(def.parts.iter().flat_map(|p| p.textures.values()))
                    .map(|slot| (slot.clone(), slot.clone()))
                    .collect();
                Lineage {
                    name: name.to_string(),
                    ancestors: Vec::new(),
                    slots,
                    cull_faces: def
                        .cull_faces
                        .as_ref()
                        .map(|f| f.iter().copied().collect())
                        .unwrap_or_default(),
                    uv_lock: def.uv_lock.unwrap_or(false),
                }
            }
        };

        let lineage = Arc::new(lineage);
        if let Ok(mut memo) = self.lineages.write() {
            memo.insert(name.to_string(), lineage.clone());
        }
        Ok(lineage)
    }

    /// Resolves `name` with a block's slot -> texture bindings. Unbound
    /// slots resolve to `None` and mesh with the missing-texture UV.
    pub fn resolve(
        &self,
        name: &str,
        bindings: &BTreeMap<String, String>,
    ) -> Result<Arc<ResolvedModel>, ModelError> {
        let key = (name.to_string(), bindings.clone());
        if let Ok(memo) = self.resolved.read() {
            if let Some(hit) = memo.get(&key) {
                return Ok(hit.clone());
            }
        }

        let lineage = self.lineage(name)?;
        let root = lineage.root();
        let root_def = self
            .defs
            .get(root)
            .ok_or_else(|| ModelError::MissingModel(root.to_string()))?;

        let parts = root_def
            .parts
            .iter()
            .map(|part| resolve_part(part, &lineage, bindings))
            .collect();

        let model = Arc::new(ResolvedModel {
            name: name.to_string(),
            extends: lineage.ancestors.clone(),
            parts,
            cull_faces: lineage.cull_faces,
            uv_lock: lineage.uv_lock,
        });
        if let Ok(mut memo) = self.resolved.write() {
            memo.insert(key, model.clone());
        }
        Ok(model)
    }
}

fn resolve_part(
    part: &PartDef,
    lineage: &Lineage,
    bindings: &BTreeMap<String, String>,
) -> ResolvedPart {
    let mut textures: [Option<String>; 6] = Default::default();
    for (face, root_slot) in &part.textures {
        textures[face.index()] = lineage
            .slots
            .get(root_slot)
            .and_then(|own| bindings.get(own))
            .cloned();
    }
    ResolvedPart {
        position: Vec3::from(part.position),
        size: Vec3::from(part.size),
        rotation: part.rotation.map(Vec3::from),
        textures,
    }
}
