use std::collections::HashMap;
use std::mem::size_of;
use std::sync::{Arc, RwLock};

use crate::descriptor::{VariableAllocation, WeightAllocation};
use crate::error::{Result, RuntimeError};

use super::view::{BufferView, SharedBuffer};

/// The single contiguous weight buffer plus one view per named weight.
#[derive(Debug, Clone)]
pub struct WeightArena {
    storage: SharedBuffer,
    total_size: usize,
    views: HashMap<String, BufferView>,
}

impl WeightArena {
    pub fn len(&self) -> usize {
        self.total_size
    }

    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    pub fn view(&self, name: &str) -> Option<&BufferView> {
        self.views.get(name)
    }

    pub fn views(&self) -> &HashMap<String, BufferView> {
        &self.views
    }

    /// View over the whole arena.
    pub fn as_view(&self) -> BufferView {
        BufferView::new(self.storage.clone(), 0..self.total_size)
    }

    /// Copy a decoded weight sequence into the arena.
    pub fn fill(&self, values: &[f32]) -> Result<()> {
        if values.len() != self.total_size {
            return Err(RuntimeError::decode(format!(
                "decoded {} weights, arena holds {}",
                values.len(),
                self.total_size
            )));
        }
        let mut guard = self
            .storage
            .try_write()
            .map_err(|_| RuntimeError::decode("weight arena is borrowed by a live view guard"))?;
        guard.copy_from_slice(values);
        Ok(())
    }
}

/// Independently allocated variable buffers keyed by name.
#[derive(Debug, Clone, Default)]
pub struct VariableBuffers {
    buffers: HashMap<String, BufferView>,
}

impl VariableBuffers {
    pub fn get(&self, name: &str) -> Option<&BufferView> {
        self.buffers.get(name)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BufferView)> {
        self.buffers.iter().map(|(name, view)| (name.as_str(), view))
    }
}

fn alloc_zeroed(name: &str, len: usize) -> Result<SharedBuffer> {
    let bytes = len
        .checked_mul(size_of::<f32>())
        .filter(|bytes| *bytes <= isize::MAX as usize)
        .ok_or_else(|| {
            RuntimeError::allocation(name, format!("{} elements exceed the addressable limit", len))
        })?;
    let mut data: Vec<f32> = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|err| RuntimeError::allocation(name, format!("reserve {} bytes: {}", bytes, err)))?;
    data.resize(len, 0.0);
    Ok(Arc::new(RwLock::new(data)))
}

/// Lay out the weight arena. Entries are trusted not to overlap; only the
/// total size and each entry's bounds are checked.
pub fn build_weight_arena(allocation: &WeightAllocation) -> Result<WeightArena> {
    let total_size = usize::try_from(allocation.total_size).map_err(|_| {
        RuntimeError::allocation(
            "weight arena",
            format!("invalid total_size {}", allocation.total_size),
        )
    })?;
    let storage = alloc_zeroed("weight arena", total_size)?;

    let mut views = HashMap::with_capacity(allocation.allocations.len());
    for (name, entry) in &allocation.allocations {
        let end = entry
            .end()
            .filter(|end| *end <= total_size)
            .ok_or_else(|| {
                RuntimeError::allocation(
                    name.as_str(),
                    format!(
                        "offset {} + size {} exceeds arena of {}",
                        entry.offset, entry.size, total_size
                    ),
                )
            })?;
        views.insert(name.clone(), BufferView::new(storage.clone(), entry.offset..end));
    }

    crate::trace!(
        "weights.alloc total={} views={}",
        total_size,
        views.len()
    );
    Ok(WeightArena {
        storage,
        total_size,
        views,
    })
}

/// Allocate one zeroed buffer per variable. Offsets are ignored: variables
/// never share storage.
pub fn build_variable_buffers(allocation: &VariableAllocation) -> Result<VariableBuffers> {
    let mut buffers = HashMap::with_capacity(allocation.allocations.len());
    for (name, entry) in &allocation.allocations {
        let storage = alloc_zeroed(name, entry.size)?;
        buffers.insert(name.clone(), BufferView::new(storage, 0..entry.size));
    }
    crate::trace!("variables.alloc count={}", buffers.len());
    Ok(VariableBuffers { buffers })
}
