#![forbid(unsafe_code)]

mod config;

use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;
use strata_chunk::{Chunk, ChunkId};
use strata_mesh_cpu::Mesh;
use strata_rpc::{ProxyHandle, RpcError, Thread, ThreadOptions, Value};
use strata_world::{ConsumerTarget, MeshConsumer, TickOutcome, WorldCommand, WorldService, WorldStatus};

use crate::config::HostConfig;

#[derive(Parser, Debug)]
#[command(name = "strata", about = "Headless chunked voxel world host")]
pub struct Cli {
    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Asset root holding blocks.toml, atlas.json and models/
    #[arg(long)]
    pub assets: Option<PathBuf>,
    #[arg(long, allow_hyphen_values = true)]
    pub seed: Option<i64>,
    /// Number of processChunks ticks to fire
    #[arg(long)]
    pub ticks: Option<u32>,
    #[arg(long)]
    pub tick_ms: Option<u64>,
    /// Spawn radius in chunks
    #[arg(long)]
    pub radius: Option<i32>,
    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};

    match log_file {
        Some(path) => {
            let config = simplelog::Config::default();
            CombinedLogger::init(vec![
                TermLogger::new(LevelFilter::Info, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
                WriteLogger::new(LevelFilter::Debug, config, File::create(path)?),
            ])?;
        }
        None => {
            env_logger::Builder::new()
                .filter_level(LevelFilter::Info)
                .parse_env("RUST_LOG")
                .try_init()?;
        }
    }
    Ok(())
}

/// Stands in for a renderer: counts what the world hands over.
#[derive(Default)]
struct MeshTally {
    added: AtomicUsize,
    updated: AtomicUsize,
    removed: AtomicUsize,
    triangles: AtomicUsize,
}

impl MeshConsumer for MeshTally {
    fn add_chunk(&self, chunk: &Arc<Chunk>, mesh: &Mesh) -> Result<(), RpcError> {
        log::debug!(target: "world", "add {} ({} triangles)", chunk.id(), mesh.triangle_count());
        self.added.fetch_add(1, Ordering::Relaxed);
        self.triangles.fetch_add(mesh.triangle_count(), Ordering::Relaxed);
        Ok(())
    }

    fn update_chunk(&self, chunk: &Arc<Chunk>, mesh: &Mesh) -> Result<(), RpcError> {
        log::debug!(target: "world", "update {} ({} triangles)", chunk.id(), mesh.triangle_count());
        self.updated.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn remove_chunk(&self, id: ChunkId) -> Result<(), RpcError> {
        log::debug!(target: "world", "remove {id}");
        self.removed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn spawn_world(cfg: &HostConfig, tally: Arc<MeshTally>) -> Result<Thread<WorldService>, Box<dyn Error>> {
    let world_cfg = cfg.world.to_world_config();
    let settings = Value::from_serde(&world_cfg)?;
    let consumer = ProxyHandle::local(Arc::new(ConsumerTarget(tally)));
    let options = ThreadOptions {
        workers: 2,
        handshake_timeout: Duration::from_millis(world_cfg.handshake_timeout_ms),
    };
    let assets = cfg.assets.to_string_lossy().into_owned();
    let thread = Thread::<WorldService>::spawn_with(
        vec![consumer.into(), cfg.seed.into(), assets.into(), settings],
        options,
    )?;
    Ok(thread)
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let cfg = config::resolve(cli)?;
    log::info!(
        "seed {} assets {} ({} ticks every {}ms)",
        cfg.seed,
        cfg.assets.display(),
        cfg.ticks,
        cfg.tick_ms
    );

    let tally = Arc::new(MeshTally::default());
    let world = spawn_world(&cfg, tally.clone())?;

    let staged = world.call(WorldCommand::GenerateSpawn(None))?.wait()?;
    log::info!(target: "world", "staged {} spawn chunks", staged.as_i64().unwrap_or(0));

    let interval = Duration::from_millis(cfg.tick_ms);
    let mut last = None;
    for _ in 0..cfg.ticks {
        // Fire and forget; the world drops a tick that overlaps a running one.
        last = Some(world.call(WorldCommand::ProcessChunks)?);
        thread::sleep(interval);
    }
    if let Some(call) = last {
        let outcome: TickOutcome = call.wait()?.to_serde()?;
        log::debug!(target: "world", "last tick: {outcome:?}");
    }

    let status: WorldStatus = world.call(WorldCommand::GetStatus)?.wait()?.to_serde()?;
    log::info!(
        target: "world",
        "{} chunks loaded, {} visible, {} meshed, {} staged, {} dirty",
        status.chunks.len(),
        status.visible_chunks.len(),
        status.meshed_chunks,
        status.staged_chunks.len(),
        status.dirty_chunks
    );
    log::info!(
        target: "world",
        "consumer saw {} added ({} triangles), {} updated, {} removed",
        tally.added.load(Ordering::Relaxed),
        tally.triangles.load(Ordering::Relaxed),
        tally.updated.load(Ordering::Relaxed),
        tally.removed.load(Ordering::Relaxed)
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(1);
    }
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(1)
        }
    }
}
