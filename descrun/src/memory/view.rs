use std::fmt;
use std::ops::{Deref, DerefMut, Range};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use anyhow::{anyhow, Result};

/// Backing storage shared by an arena and all views into it.
pub type SharedBuffer = Arc<RwLock<Vec<f32>>>;

/// A named window into an arena or an independent buffer.
///
/// Views do not own a region: cloning one is cheap and every clone aliases
/// the same elements. Writes through one view are visible through every
/// other view whose range overlaps it.
#[derive(Clone)]
pub struct BufferView {
    storage: SharedBuffer,
    range: Range<usize>,
}

impl BufferView {
    pub(crate) fn new(storage: SharedBuffer, range: Range<usize>) -> Self {
        Self { storage, range }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Element range covered in the backing storage.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Shared access to the viewed elements. Fails instead of blocking when
    /// a write guard on the same storage is alive.
    pub fn read(&self) -> Result<ViewRead<'_>> {
        let guard = match self.storage.try_read() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(self.borrowed()),
            Err(TryLockError::Poisoned(_)) => return Err(anyhow!("buffer lock poisoned")),
        };
        Ok(ViewRead {
            guard,
            range: self.range.clone(),
        })
    }

    /// Exclusive access to the viewed elements. Fails instead of blocking
    /// when any other guard on the same storage is alive.
    pub fn write(&self) -> Result<ViewWrite<'_>> {
        let guard = match self.storage.try_write() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(self.borrowed()),
            Err(TryLockError::Poisoned(_)) => return Err(anyhow!("buffer lock poisoned")),
        };
        Ok(ViewWrite {
            guard,
            range: self.range.clone(),
        })
    }

    fn borrowed(&self) -> anyhow::Error {
        anyhow!("buffer {:?} already borrowed", self.range)
    }

    pub fn to_vec(&self) -> Result<Vec<f32>> {
        Ok(self.read()?.to_vec())
    }

    pub fn copy_from(&self, values: &[f32]) -> Result<()> {
        if values.len() != self.len() {
            return Err(anyhow!(
                "length mismatch: view holds {} elements, got {}",
                self.len(),
                values.len()
            ));
        }
        self.write()?.copy_from_slice(values);
        Ok(())
    }

    pub fn fill(&self, value: f32) -> Result<()> {
        self.write()?.fill(value);
        Ok(())
    }

    /// True when both views alias the same storage and the same range.
    pub fn same_view(&self, other: &BufferView) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage) && self.range == other.range
    }

    pub fn shares_storage(&self, other: &BufferView) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("storage", &Arc::as_ptr(&self.storage))
            .field("range", &self.range)
            .finish()
    }
}

pub struct ViewRead<'a> {
    guard: RwLockReadGuard<'a, Vec<f32>>,
    range: Range<usize>,
}

impl Deref for ViewRead<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.guard[self.range.clone()]
    }
}

pub struct ViewWrite<'a> {
    guard: RwLockWriteGuard<'a, Vec<f32>>,
    range: Range<usize>,
}

impl Deref for ViewWrite<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.guard[self.range.clone()]
    }
}

impl DerefMut for ViewWrite<'_> {
    fn deref_mut(&mut self) -> &mut [f32] {
        let range = self.range.clone();
        &mut self.guard[range]
    }
}
