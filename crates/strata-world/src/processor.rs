use strata_chunk::{Chunk, Stage};

use crate::error::PassError;
use crate::pass::{ChunkPass, WorldAccess};

/// Ordered list of passes every chunk walks through on its way to `done`.
pub struct ChunkProcessor {
    passes: Vec<Box<dyn ChunkPass>>,
}

impl ChunkProcessor {
    pub fn new(passes: Vec<Box<dyn ChunkPass>>) -> Self {
        Self { passes }
    }

    pub fn initialize(&mut self) -> Result<(), PassError> {
        for pass in &mut self.passes {
            pass.initialize()?;
            log::debug!(target: "pipeline", "pass {} ready", pass.name());
        }
        Ok(())
    }

    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|p| p.name())
    }

    /// Index of the first pass the chunk has not completed yet.
    fn next_index(&self, stage: &Stage) -> usize {
        match stage {
            Stage::Unloaded => 0,
            Stage::Pass(name) => self
                .passes
                .iter()
                .position(|p| p.name() == name)
                .map_or(0, |i| i + 1),
            Stage::Done => self.passes.len(),
        }
    }

    /// Runs at most one pass on `chunk` and returns whether it is done.
    ///
    /// A pass that fails is logged and still counts as completed; it is never
    /// retried.
    pub fn process(&self, chunk: &Chunk, world: &dyn WorldAccess) -> bool {
        let stage = chunk.stage();
        if stage == Stage::Done {
            return true;
        }

        let index = self.next_index(&stage);
        let Some(pass) = self.passes.get(index) else {
            chunk.set_stage(Stage::Done);
            return true;
        };

        if !pass.validate(chunk, world) {
            return false;
        }

        if let Err(e) = pass.process(chunk, world) {
            log::error!(target: "pipeline", "Pass {} failed on chunk {}: {e}", pass.name(), chunk.id());
        }

        if index + 1 == self.passes.len() {
            chunk.set_stage(Stage::Done);
            return true;
        }
        chunk.set_stage(Stage::Pass(pass.name().to_string()));
        false
    }
}
