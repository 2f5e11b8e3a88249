use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AssetError;
use crate::face::Face;

/// Block list file: `[[blocks]]` in TOML or `{"blocks": [...]}` in JSON.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BlocksConfig {
    #[serde(default)]
    pub blocks: Vec<BlockDef>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BlockDef {
    pub identifier: String,
    #[serde(default)]
    pub model: Option<ModelRef>,
}

/// A block's model name plus its texture-slot bindings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ModelRef {
    pub name: String,
    #[serde(default)]
    pub textures: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ModelDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub extends: Option<ExtendsDef>,
    #[serde(default, rename = "cullFaces")]
    pub cull_faces: Option<Vec<Face>>,
    #[serde(default)]
    pub textures: Vec<String>,
    #[serde(default)]
    pub parts: Vec<PartDef>,
    #[serde(default, rename = "uvLock")]
    pub uv_lock: Option<bool>,
}

/// Parent model plus a map from parent slot names to this model's slots.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ExtendsDef {
    pub model: String,
    #[serde(default)]
    pub textures: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PartDef {
    pub position: [f32; 3],
    pub size: [f32; 3],
    #[serde(default)]
    pub rotation: Option<[f32; 3]>,
    #[serde(default)]
    pub textures: BTreeMap<Face, String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AtlasDef {
    pub size: [u32; 2],
    #[serde(rename = "tileSize")]
    pub tile_size: u32,
    #[serde(default)]
    pub textures: HashMap<String, [u32; 2]>,
}

/// Reads a JSON or TOML asset, picked by file extension.
pub fn read_asset<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, AssetError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text).map_err(|source| AssetError::Json {
            path: path.to_path_buf(),
            source,
        }),
        Some("toml") => toml::from_str(&text).map_err(|source| AssetError::Toml {
            path: path.to_path_buf(),
            source,
        }),
        _ => Err(AssetError::UnsupportedFormat(path.to_path_buf())),
    }
}
