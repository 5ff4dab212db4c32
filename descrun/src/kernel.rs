use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::descriptor::CallOption;
use crate::error::{Result, RuntimeError};
use crate::memory::BufferView;

/// Kernel entry point: `(inputs, outputs, weights, call_option)`.
///
/// Kernels write their results into the output views in place. Guards never
/// block: a step that names one buffer as both input and output gets an
/// "already borrowed" error if it takes the write guard while holding a read
/// guard, and the run fails with `RuntimeError::Kernel`.
pub type KernelFn = Arc<
    dyn Fn(&[BufferView], &[BufferView], &[BufferView], &CallOption) -> anyhow::Result<()>
        + Send
        + Sync,
>;

/// Named table of kernels the execution plan dispatches into.
pub trait KernelTable: Send + Sync {
    fn get(&self, name: &str) -> Option<KernelFn>;

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Turns the descriptor's opaque kernel source into a kernel table.
pub trait KernelLoader: Send + Sync {
    fn load(&self, kernel_source: &Value) -> anyhow::Result<Arc<dyn KernelTable>>;
}

/// In-process kernel table populated by registration.
#[derive(Clone, Default)]
pub struct KernelRegistry {
    kernels: HashMap<String, KernelFn>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, kernel: F) -> Result<()>
    where
        F: Fn(&[BufferView], &[BufferView], &[BufferView], &CallOption) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        if self.kernels.contains_key(&name) {
            return Err(RuntimeError::DuplicateKernel(name));
        }
        self.kernels.insert(name, Arc::new(kernel));
        Ok(())
    }

    pub fn with_kernel<F>(mut self, name: impl Into<String>, kernel: F) -> Result<Self>
    where
        F: Fn(&[BufferView], &[BufferView], &[BufferView], &CallOption) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, kernel)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names = self.kernels.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

impl KernelTable for KernelRegistry {
    fn get(&self, name: &str) -> Option<KernelFn> {
        self.kernels.get(name).cloned()
    }
}

impl fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("kernels", &self.names())
            .finish()
    }
}

/// Loader that ignores the kernel source and always serves one registry.
#[derive(Debug, Clone)]
pub struct StaticKernelLoader {
    registry: Arc<KernelRegistry>,
}

impl StaticKernelLoader {
    pub fn new(registry: KernelRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

impl KernelLoader for StaticKernelLoader {
    fn load(&self, _kernel_source: &Value) -> anyhow::Result<Arc<dyn KernelTable>> {
        let table: Arc<dyn KernelTable> = self.registry.clone();
        Ok(table)
    }
}
