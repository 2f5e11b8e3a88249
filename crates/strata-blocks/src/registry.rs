use std::collections::HashMap;
use std::path::Path;

use crate::config::{BlockDef, BlocksConfig, ModelRef, read_asset};
use crate::error::RegistryError;

pub type BlockId = u16;

pub const AIR: BlockId = 0;
pub const AIR_IDENTIFIER: &str = "air";
/// Voxels store one byte, so ids above 255 are unaddressable.
pub const MAX_BLOCKS: usize = 256;

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub identifier: String,
    pub model: Option<ModelRef>,
}

impl Block {
    #[inline]
    pub fn is_air(&self) -> bool {
        self.id == AIR
    }
}

#[derive(Clone, Debug)]
pub struct BlockRegistry {
    blocks: Vec<Block>,
    by_name: HashMap<String, BlockId>,
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRegistry {
    /// A registry holding only `air`.
    pub fn new() -> Self {
        let air = Block {
            id: AIR,
            identifier: AIR_IDENTIFIER.to_string(),
            model: None,
        };
        let mut by_name = HashMap::new();
        by_name.insert(air.identifier.clone(), AIR);
        Self {
            blocks: vec![air],
            by_name,
        }
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let cfg: BlocksConfig = read_asset(path)?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: BlocksConfig) -> Result<Self, RegistryError> {
        let mut reg = Self::new();
        for def in cfg.blocks {
            reg.register(def)?;
        }
        log::debug!("block registry loaded with {} blocks", reg.len());
        Ok(reg)
    }

    /// Appends a block, assigning the next free id.
    pub fn register(&mut self, def: BlockDef) -> Result<BlockId, RegistryError> {
        if def.identifier == AIR_IDENTIFIER {
            return Err(RegistryError::ReservedIdentifier(def.identifier));
        }
        if self.by_name.contains_key(&def.identifier) {
            return Err(RegistryError::DuplicateIdentifier(def.identifier));
        }
        if self.blocks.len() >= MAX_BLOCKS {
            return Err(RegistryError::TooManyBlocks {
                count: self.blocks.len() + 1,
                max: MAX_BLOCKS,
            });
        }
        let id = self.blocks.len() as BlockId;
        self.by_name.insert(def.identifier.clone(), id);
        self.blocks.push(Block {
            id,
            identifier: def.identifier,
            model: def.model,
        });
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id as usize)
    }

    pub fn require(&self, id: BlockId) -> Result<&Block, RegistryError> {
        self.get(id).ok_or(RegistryError::UnknownId(id))
    }

    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    pub fn require_id(&self, name: &str) -> Result<BlockId, RegistryError> {
        self.id_by_name(name)
            .ok_or_else(|| RegistryError::UnknownBlock(name.to_string()))
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Block> {
        self.id_by_name(name).and_then(|id| self.get(id))
    }

    /// Identifier for `id`, or `air` when the id is unknown.
    pub fn identifier(&self, id: BlockId) -> &str {
        self.get(id).map_or(AIR_IDENTIFIER, |b| b.identifier.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }
}
