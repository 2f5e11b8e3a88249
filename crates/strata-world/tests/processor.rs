mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::Sandbox;
use strata_chunk::{Chunk, ChunkId, Stage};
use strata_world::{ChunkPass, ChunkProcessor, PassError, WorldAccess};

/// Writes one block and counts its runs.
struct Stamp {
    name: &'static str,
    offset: usize,
    block: u8,
    runs: Arc<AtomicUsize>,
    ready: bool,
    fail: bool,
}

impl Stamp {
    fn new(name: &'static str, offset: usize, block: u8) -> (Self, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let pass = Self {
            name,
            offset,
            block,
            runs: runs.clone(),
            ready: true,
            fail: false,
        };
        (pass, runs)
    }
}

impl ChunkPass for Stamp {
    fn name(&self) -> &'static str {
        self.name
    }

    fn validate(&self, _chunk: &Chunk, _world: &dyn WorldAccess) -> bool {
        self.ready
    }

    fn process(&self, chunk: &Chunk, _world: &dyn WorldAccess) -> Result<(), PassError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        chunk.store_index(self.offset, self.block);
        if self.fail {
            return Err(PassError::NotInitialized { pass: self.name });
        }
        Ok(())
    }
}

#[test]
fn single_pass_finishes_on_first_call() {
    let world = Sandbox::new();
    let (pass, runs) = Stamp::new("test", 16, 2);
    let processor = ChunkProcessor::new(vec![Box::new(pass)]);
    let chunk = Chunk::new(ChunkId::ORIGIN);

    assert!(processor.process(&chunk, &world));
    assert_eq!(chunk.stage(), Stage::Done);
    assert_eq!(chunk.load_index(16), 2);
    assert!(!chunk.is_empty());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn passes_run_one_per_call_in_order() {
    let world = Sandbox::new();
    let (first, first_runs) = Stamp::new("first", 0, 1);
    let (second, second_runs) = Stamp::new("second", 1, 3);
    let processor = ChunkProcessor::new(vec![Box::new(first), Box::new(second)]);
    assert_eq!(processor.pass_names().collect::<Vec<_>>(), ["first", "second"]);
    let chunk = Chunk::new(ChunkId::new(2, -1, 0));

    assert!(!processor.process(&chunk, &world));
    assert_eq!(chunk.stage(), Stage::Pass("first".into()));
    assert_eq!(chunk.load_index(0), 1);
    assert_eq!(second_runs.load(Ordering::SeqCst), 0);

    assert!(processor.process(&chunk, &world));
    assert_eq!(chunk.stage(), Stage::Done);
    assert_eq!(chunk.load_index(1), 3);
    assert_eq!(first_runs.load(Ordering::SeqCst), 1);
    assert_eq!(second_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn invalid_pass_leaves_the_chunk_alone() {
    let world = Sandbox::new();
    let (mut pass, runs) = Stamp::new("blocked", 0, 1);
    pass.ready = false;
    let processor = ChunkProcessor::new(vec![Box::new(pass)]);
    let chunk = Chunk::new(ChunkId::ORIGIN);

    for _ in 0..3 {
        assert!(!processor.process(&chunk, &world));
    }
    assert_eq!(chunk.stage(), Stage::Unloaded);
    assert!(chunk.is_empty());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_pass_still_advances_and_is_not_retried() {
    let world = Sandbox::new();
    let (mut broken, broken_runs) = Stamp::new("broken", 0, 1);
    broken.fail = true;
    let (after, after_runs) = Stamp::new("after", 1, 1);
    let processor = ChunkProcessor::new(vec![Box::new(broken), Box::new(after)]);
    let chunk = Chunk::new(ChunkId::ORIGIN);

    assert!(!processor.process(&chunk, &world));
    assert_eq!(chunk.stage(), Stage::Pass("broken".into()));
    assert!(processor.process(&chunk, &world));
    assert_eq!(broken_runs.load(Ordering::SeqCst), 1);
    assert_eq!(after_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn done_is_terminal() {
    let world = Sandbox::new();
    let (pass, runs) = Stamp::new("test", 16, 2);
    let processor = ChunkProcessor::new(vec![Box::new(pass)]);
    let chunk = Chunk::new(ChunkId::ORIGIN);

    assert!(processor.process(&chunk, &world));
    assert!(processor.process(&chunk, &world));
    assert!(processor.process(&chunk, &world));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_pipeline_is_done_immediately() {
    let world = Sandbox::new();
    let processor = ChunkProcessor::new(Vec::new());
    let chunk = Chunk::new(ChunkId::ORIGIN);
    assert!(processor.process(&chunk, &world));
    assert_eq!(chunk.stage(), Stage::Done);
}

struct Unready;

impl ChunkPass for Unready {
    fn name(&self) -> &'static str {
        "unready"
    }

    fn initialize(&mut self) -> Result<(), PassError> {
        Err(PassError::NotInitialized { pass: "unready" })
    }

    fn validate(&self, _chunk: &Chunk, _world: &dyn WorldAccess) -> bool {
        true
    }

    fn process(&self, _chunk: &Chunk, _world: &dyn WorldAccess) -> Result<(), PassError> {
        Ok(())
    }
}

#[test]
fn initialize_stops_at_the_first_failure() {
    let mut processor = ChunkProcessor::new(vec![Box::new(Unready)]);
    assert!(matches!(
        processor.initialize(),
        Err(PassError::NotInitialized { pass: "unready" })
    ));
}
