use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Element-wise atomic access to a byte array. Each `load`/`store` is atomic
/// on its own; nothing orders operations on different elements.
pub trait VoxelCells {
    fn len(&self) -> usize;

    /// Returns 0 for an out-of-range index.
    fn load(&self, index: usize) -> u8;

    /// Ignores an out-of-range index.
    fn store(&self, index: usize, value: u8);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-size byte region shared between execution contexts. Cloning hands
/// out another capability to the same memory.
#[derive(Clone)]
pub struct SharedBuffer {
    cells: Arc<[AtomicU8]>,
}

impl SharedBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            cells: (0..len).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            cells: bytes.iter().map(|&b| AtomicU8::new(b)).collect(),
        }
    }

    /// Copies the current contents out.
    pub fn snapshot(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    /// Element-wise copy from `src`; extra elements on either side are left alone.
    pub fn copy_from(&self, src: &impl VoxelCells) {
        for i in 0..self.len().min(src.len()) {
            self.store(i, src.load(i));
        }
    }

    /// Whether both handles refer to the same region.
    #[inline]
    pub fn ptr_eq(a: &SharedBuffer, b: &SharedBuffer) -> bool {
        Arc::ptr_eq(&a.cells, &b.cells)
    }

    /// Number of live handles to this region.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.cells)
    }
}

impl VoxelCells for SharedBuffer {
    #[inline]
    fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn load(&self, index: usize) -> u8 {
        self.cells
            .get(index)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, index: usize, value: u8) {
        if let Some(c) = self.cells.get(index) {
            c.store(value, Ordering::Relaxed);
        }
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.cells.len())
            .finish()
    }
}

impl PartialEq for SharedBuffer {
    /// Content equality.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && (0..self.len()).all(|i| self.load(i) == other.load(i))
    }
}
