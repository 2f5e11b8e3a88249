//! Block registry, model assets, texture atlas, and the block model compiler.
#![forbid(unsafe_code)]

pub mod atlas;
pub mod compiler;
pub mod config;
pub mod error;
pub mod face;
pub mod model;
pub mod registry;

use std::path::{Path, PathBuf};

pub use atlas::{MISSING_UV, TextureAtlas, UvRect};
pub use compiler::{BLOCK_MODEL_SIZE, BlockModelCompiler, FaceSlice, MeshFragment};
pub use error::{AssetError, ModelError, RegistryError};
pub use face::{Face, FaceSet};
pub use model::{Lineage, ModelLibrary, ResolvedModel, ResolvedPart};
pub use registry::{AIR, AIR_IDENTIFIER, Block, BlockId, BlockRegistry, MAX_BLOCKS};

/// Locations of the asset files under one root directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetPaths {
    pub root: PathBuf,
}

impl AssetPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn blocks(&self) -> PathBuf {
        self.root.join("blocks.toml")
    }

    pub fn models(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn atlas(&self) -> PathBuf {
        self.root.join("atlas.json")
    }
}

impl AsRef<Path> for AssetPaths {
    fn as_ref(&self) -> &Path {
        &self.root
    }
}
