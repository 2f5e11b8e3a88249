use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use strata_world::WorldConfig;

use crate::Cli;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub seed: i64,
    pub assets: PathBuf,
    pub ticks: u32,
    pub tick_ms: u64,
    pub world: WorldSection,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            seed: 1337,
            assets: PathBuf::from("assets"),
            ticks: 64,
            tick_ms: 50,
            world: WorldSection::default(),
        }
    }
}

/// `[world]` table. Anything left out keeps the world's own default.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct WorldSection {
    pub render_distance: Option<i32>,
    pub spawn_radius: Option<i32>,
    pub mesh_resolution: Option<usize>,
    pub generator_workers: Option<usize>,
    pub mesher_workers: Option<usize>,
    pub remote_generator: Option<bool>,
    pub remote_mesher: Option<bool>,
    pub handshake_timeout_ms: Option<u64>,
    pub tree_threshold: Option<f32>,
}

impl WorldSection {
    pub fn to_world_config(&self) -> WorldConfig {
        let mut cfg = WorldConfig::default();
        if let Some(v) = self.render_distance {
            cfg.render_distance = v;
        }
        if let Some(v) = self.spawn_radius {
            cfg.spawn_radius = v;
        }
        if let Some(v) = self.mesh_resolution {
            cfg.mesh_resolution = v.max(1);
        }
        if let Some(v) = self.generator_workers {
            cfg.generator_workers = v.max(1);
        }
        if let Some(v) = self.mesher_workers {
            cfg.mesher_workers = v.max(1);
        }
        if let Some(v) = self.remote_generator {
            cfg.remote_generator = v;
        }
        if let Some(v) = self.remote_mesher {
            cfg.remote_mesher = v;
        }
        if let Some(v) = self.handshake_timeout_ms {
            cfg.handshake_timeout_ms = v;
        }
        if let Some(v) = self.tree_threshold {
            cfg.tree_threshold = v;
        }
        cfg
    }
}

pub fn load_from_path(path: &Path) -> Result<HostConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let cfg: HostConfig = toml::from_str(&s)?;
    Ok(cfg)
}

/// Reads the config file (if any) and lays the command line over it.
pub fn resolve(cli: &Cli) -> Result<HostConfig, Box<dyn Error>> {
    let mut cfg = match &cli.config {
        Some(path) => load_from_path(path).map_err(|e| format!("{}: {e}", path.display()))?,
        None => HostConfig::default(),
    };
    if let Some(assets) = &cli.assets {
        cfg.assets = assets.clone();
    }
    if let Some(seed) = cli.seed {
        cfg.seed = seed;
    }
    if let Some(ticks) = cli.ticks {
        cfg.ticks = ticks;
    }
    if let Some(tick_ms) = cli.tick_ms {
        cfg.tick_ms = tick_ms;
    }
    if let Some(radius) = cli.radius {
        cfg.world.spawn_radius = Some(radius);
    }
    Ok(cfg)
}
