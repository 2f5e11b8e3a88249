use std::collections::HashMap;
use std::path::Path;

use crate::config::{AtlasDef, read_asset};
use crate::error::{AssetError, ModelError};

/// `[u, v, u2, v2]`; `v` is the tile's top edge in bottom-up texture space.
pub type UvRect = [f32; 4];

/// Whole-texture rect substituted for textures the atlas does not contain.
pub const MISSING_UV: UvRect = [0.0, 0.0, 1.0, 1.0];

#[derive(Clone, Debug)]
pub struct TextureAtlas {
    width: f32,
    height: f32,
    tile_size: u32,
    textures: HashMap<String, [u32; 2]>,
}

impl TextureAtlas {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let def: AtlasDef = read_asset(path)?;
        Ok(Self::from_def(def))
    }

    pub fn from_def(def: AtlasDef) -> Self {
        Self {
            width: def.size[0].max(1) as f32,
            height: def.size[1].max(1) as f32,
            tile_size: def.tile_size,
            textures: def.textures,
        }
    }

    #[inline]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn contains(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    /// Full-tile rect for `name`, or [`MISSING_UV`] when unknown.
    pub fn uv(&self, name: Option<&str>) -> UvRect {
        let Some(&[x, y]) = name.and_then(|n| self.textures.get(n)) else {
            log::debug!(target: "mesher", "missing texture {name:?}, using default uv");
            return MISSING_UV;
        };
        let (x, y, t) = (x as f32, y as f32, self.tile_size as f32);
        [
            x / self.width,
            1.0 - y / self.height,
            (x + t) / self.width,
            1.0 - (y + t) / self.height,
        ]
    }

    /// Rect covering `size` texels at `offset` inside the tile. Unknown
    /// textures are an error here.
    pub fn box_uv(
        &self,
        name: Option<&str>,
        offset: [f32; 2],
        size: [f32; 2],
    ) -> Result<UvRect, ModelError> {
        let name = name.unwrap_or_default();
        let &[x, y] = self
            .textures
            .get(name)
            .ok_or_else(|| ModelError::MissingTexture(name.to_string()))?;
        let x = x as f32 + offset[0];
        let y = y as f32 + offset[1];
        Ok([
            x / self.width,
            1.0 - y / self.height,
            (x + size[0]) / self.width,
            1.0 - (y + size[1]) / self.height,
        ])
    }
}
