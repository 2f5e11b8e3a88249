mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{Event, Recorder, compiler};
use crossbeam_channel::{Receiver, Sender, bounded};
use strata_blocks::BlockRegistry;
use strata_chunk::{Chunk, ChunkId, Stage};
use strata_geom::Vec3;
use strata_mesh_cpu::GreedyMesher;
use strata_world::{
    ChunkPass, ChunkProcessor, PassError, RayHit, RayOptions, TickOutcome, World, WorldAccess, WorldConfig,
    WorldError, WorldParts,
};

/// Lays a stone floor along the bottom of every chunk.
struct Floor;

impl ChunkPass for Floor {
    fn name(&self) -> &'static str {
        "floor"
    }

    fn validate(&self, _chunk: &Chunk, _world: &dyn WorldAccess) -> bool {
        true
    }

    fn process(&self, chunk: &Chunk, world: &dyn WorldAccess) -> Result<(), PassError> {
        let stone = world.registry().require_id("stone")? as u8;
        for x in 0..16 {
            for z in 0..16 {
                chunk.set_block(stone, x, 0, z);
            }
        }
        Ok(())
    }
}

struct Noop;

impl ChunkPass for Noop {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn validate(&self, _chunk: &Chunk, _world: &dyn WorldAccess) -> bool {
        true
    }

    fn process(&self, _chunk: &Chunk, _world: &dyn WorldAccess) -> Result<(), PassError> {
        Ok(())
    }
}

fn world_with(passes: Vec<Box<dyn ChunkPass>>, config: WorldConfig) -> (World, Receiver<Event>) {
    let compiler = compiler();
    let registry: Arc<BlockRegistry> = compiler.registry().clone();
    let (recorder, events) = Recorder::new();
    let world = World::new(WorldParts {
        registry,
        processor: ChunkProcessor::new(passes),
        mesher: Arc::new(GreedyMesher::new(compiler)),
        consumer: recorder,
        config,
    })
    .unwrap();
    (world, events)
}

fn floor_world() -> (World, Receiver<Event>) {
    world_with(vec![Box::new(Floor)], WorldConfig::default())
}

#[test]
fn blocks_are_read_back_by_identifier() {
    let (world, _) = floor_world();
    world.set_block("stone", -1, 20, 5).unwrap();
    assert_eq!(world.get_block(-1, 20, 5, false), "stone");

    let chunk = world.get_chunk(ChunkId::new(-1, 1, 0)).unwrap();
    assert!(chunk.is_dirty());

    assert!(matches!(
        world.set_block("unobtainium", 0, 0, 0),
        Err(WorldError::Registry(_))
    ));
}

#[test]
fn reads_only_create_chunks_when_asked() {
    let (world, _) = floor_world();
    assert_eq!(world.get_block(100, 100, 100, false), "air");
    assert!(world.get_chunk(ChunkId::new(6, 6, 6)).is_none());
    assert_eq!(world.get_block(100, 100, 100, true), "air");
    assert!(world.get_chunk(ChunkId::new(6, 6, 6)).is_some());
}

#[test]
fn spawn_stages_a_cube_from_the_top_down() {
    let (world, _) = floor_world();
    assert_eq!(world.generate_spawn(3), 216);
    let staged = world.status().staged_chunks;
    assert_eq!(staged.len(), 216);
    assert_eq!(staged[0], ChunkId::new(-3, 3, -3));
    assert_eq!(staged[5], ChunkId::new(-3, -2, -3));

    assert_eq!(world.generate_spawn(3), 0, "already staged");
}

#[test]
fn finished_chunks_become_visible_and_are_meshed_once() {
    let (world, events) = floor_world();
    world.stage(ChunkId::ORIGIN);

    let outcome = world.process_chunks();
    assert_eq!(
        outcome,
        TickOutcome::Ran {
            advanced: 0,
            completed: 1,
            updated: 0
        }
    );
    let status = world.status();
    assert!(status.staged_chunks.is_empty());
    assert_eq!(status.visible_chunks, [ChunkId::ORIGIN]);
    assert_eq!(status.meshed_chunks, 1);

    match events.try_recv().unwrap() {
        Event::Added(id, mesh) => {
            assert_eq!(id, ChunkId::ORIGIN);
            assert!(!mesh.is_empty());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(events.try_recv().is_err());

    let cached = world.generate_chunk_mesh(ChunkId::ORIGIN).unwrap();
    assert!(Arc::ptr_eq(&cached, &world.generate_chunk_mesh(ChunkId::ORIGIN).unwrap()));
}

#[test]
fn multi_pass_chunks_take_a_tick_per_pass() {
    let (world, events) = world_with(vec![Box::new(Floor), Box::new(Noop)], WorldConfig::default());
    world.stage(ChunkId::new(1, 0, 0));

    assert_eq!(
        world.process_chunks(),
        TickOutcome::Ran {
            advanced: 1,
            completed: 0,
            updated: 0
        }
    );
    assert_eq!(
        world.get_chunk(ChunkId::new(1, 0, 0)).unwrap().stage(),
        Stage::Pass("floor".into())
    );
    assert!(events.try_recv().is_err());

    assert_eq!(
        world.process_chunks(),
        TickOutcome::Ran {
            advanced: 0,
            completed: 1,
            updated: 0
        }
    );
    assert!(matches!(events.try_recv(), Ok(Event::Added(..))));
}

#[test]
fn edits_to_visible_chunks_are_remeshed() {
    let (world, events) = floor_world();
    world.stage(ChunkId::ORIGIN);
    world.process_chunks();
    let Ok(Event::Added(_, first)) = events.try_recv() else {
        panic!("origin was not added");
    };
    let before = world.generate_chunk_mesh(ChunkId::ORIGIN).unwrap();

    world.set_block("stone", 8, 8, 8).unwrap();
    assert_eq!(
        world.process_chunks(),
        TickOutcome::Ran {
            advanced: 0,
            completed: 0,
            updated: 1
        }
    );
    match events.try_recv().unwrap() {
        Event::Updated(id, mesh) => {
            assert_eq!(id, ChunkId::ORIGIN);
            assert_eq!(mesh.triangle_count(), first.triangle_count() + 12);
        }
        other => panic!("unexpected {other:?}"),
    }
    let after = world.generate_chunk_mesh(ChunkId::ORIGIN).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(!world.get_chunk(ChunkId::ORIGIN).unwrap().is_dirty());

    assert_eq!(
        world.process_chunks(),
        TickOutcome::Ran {
            advanced: 0,
            completed: 0,
            updated: 0
        }
    );
}

/// Holds the tick open until released.
struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

impl ChunkPass for Gate {
    fn name(&self) -> &'static str {
        "gate"
    }

    fn validate(&self, _chunk: &Chunk, _world: &dyn WorldAccess) -> bool {
        true
    }

    fn process(&self, _chunk: &Chunk, _world: &dyn WorldAccess) -> Result<(), PassError> {
        let _ = self.entered.send(());
        let _ = self.release.recv_timeout(Duration::from_secs(5));
        Ok(())
    }
}

#[test]
fn overlapping_ticks_are_dropped() {
    let (entered_tx, entered) = bounded(1);
    let (release, release_rx) = bounded(1);
    let gate = Gate {
        entered: entered_tx,
        release: release_rx,
    };
    let (world, _events) = world_with(vec![Box::new(gate)], WorldConfig::default());
    let world = Arc::new(world);
    world.stage(ChunkId::ORIGIN);

    let ticking = {
        let world = world.clone();
        thread::spawn(move || world.process_chunks())
    };
    entered.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(world.process_chunks(), TickOutcome::Skipped);

    release.send(()).unwrap();
    assert!(matches!(ticking.join().unwrap(), TickOutcome::Ran { completed: 1, .. }));
    assert!(matches!(world.process_chunks(), TickOutcome::Ran { .. }));
}

#[test]
fn rays_stop_on_the_first_solid_block() {
    let (world, _) = floor_world();
    world.set_block("stone", 5, 0, 0).unwrap();
    world.set_block("dirt", 9, 0, 0).unwrap();
    let origin = Vec3::new(0.5, 0.5, 0.5);
    let east = Vec3::new(1.0, 0.0, 0.0);

    let hit = world.cast_ray(origin, east, &RayOptions::default());
    assert_eq!(
        hit,
        Some(RayHit {
            position: [5, 0, 0],
            normal: [-1, 0, 0],
            block: "stone".into()
        })
    );

    let through_stone = RayOptions {
        ignore: vec!["air".into(), "stone".into()],
        ..RayOptions::default()
    };
    let hit = world.cast_ray(origin, east, &through_stone).unwrap();
    assert_eq!((hit.position, hit.block.as_str()), ([9, 0, 0], "dirt"));

    let short = RayOptions {
        max_distance: 3.0,
        ..RayOptions::default()
    };
    assert!(world.cast_ray(origin, east, &short).is_none());
}

#[test]
fn rays_never_create_chunks() {
    let (world, _) = floor_world();
    let before = world.status().chunks.len();
    let miss = world.cast_ray(Vec3::new(0.5, 40.5, 0.5), Vec3::new(0.3, -1.0, 0.2), &RayOptions::default());
    assert!(miss.is_none());
    assert_eq!(world.status().chunks.len(), before);
}

#[test]
fn moving_stages_nearby_chunks_and_evicts_distant_ones() {
    let config = WorldConfig {
        render_distance: 2,
        ..WorldConfig::default()
    };
    let (world, events) = world_with(vec![Box::new(Floor)], config);

    world.on_player_move(8.0, 8.0, 8.0);
    assert_eq!(world.status().staged_chunks.len(), 27);
    world.process_chunks();
    assert_eq!(world.status().visible_chunks.len(), 27);
    assert_eq!(events.try_iter().filter(|e| matches!(e, Event::Added(..))).count(), 27);

    world.on_player_move(200.0, 8.0, 8.0);
    let status = world.status();
    assert!(status.visible_chunks.is_empty());
    assert_eq!(status.meshed_chunks, 0);
    assert!(status.chunks.iter().all(|id| (id.cx - 12).abs() <= 1));
    assert_eq!(status.staged_chunks.len(), 27);
    assert!(status.staged_chunks.contains(&ChunkId::new(12, 0, 0)));

    let removed: Vec<_> = events
        .try_iter()
        .filter_map(|e| match e {
            Event::Removed(id) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(removed.len(), 27);
    assert!(removed.contains(&ChunkId::ORIGIN));
}
