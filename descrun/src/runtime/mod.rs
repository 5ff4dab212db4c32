//! The fallback runner: owns the arenas, the kernel table and the execution
//! plan of one loaded model.
//!
//! Life cycle: `load` (or `set_descriptor` + `compile` + `load_weights`),
//! then `get_input_views` / `get_output_views`, then `run` as many times as
//! needed. Every `compile` builds fresh buffers and drops the cached views,
//! so views taken before a recompile must not be reused.

mod exec;
mod options;

use std::fmt;
use std::sync::Arc;

use crate::descriptor::Descriptor;
use crate::decoder::WeightDecoder;
use crate::error::{BufferRole, Result, RuntimeError};
use crate::kernel::{KernelFn, KernelLoader, KernelRegistry, StaticKernelLoader};
use crate::memory::{
    build_variable_buffers, build_weight_arena, BufferView, VariableBuffers, WeightArena,
};
use crate::progress::ProgressEvent;
use crate::source::ByteSource;

pub use options::{RuntimeOptions, YieldPolicy};

pub const BACKEND_NAME: &str = "fallback";
pub const GRAPH_FILE: &str = "graph_fallback.json";
pub const WEIGHT_FILE: &str = "weight_fallback.bin";

/// Resolved graph-level views, shared with every caller that asked for them.
pub type ViewList = Arc<[BufferView]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStatus {
    Uninitialized,
    Loaded,
    Compiled,
    Ready,
    Running,
    Completed,
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeStatus::Uninitialized => write!(f, "Uninitialized"),
            RuntimeStatus::Loaded => write!(f, "Loaded"),
            RuntimeStatus::Compiled => write!(f, "Compiled"),
            RuntimeStatus::Ready => write!(f, "Ready"),
            RuntimeStatus::Running => write!(f, "Running"),
            RuntimeStatus::Completed => write!(f, "Completed"),
        }
    }
}

struct Compiled {
    kernels: Vec<KernelFn>,
    weights: WeightArena,
    variables: VariableBuffers,
    weights_loaded: bool,
    input_views: Option<ViewList>,
    output_views: Option<ViewList>,
}

impl Compiled {
    fn views_resolved(&self) -> bool {
        self.input_views.is_some() && self.output_views.is_some()
    }
}

pub struct Runtime {
    loader: Arc<dyn KernelLoader>,
    options: RuntimeOptions,
    descriptor: Option<Arc<Descriptor>>,
    compiled: Option<Compiled>,
    status: RuntimeStatus,
}

impl Runtime {
    pub fn new(loader: Arc<dyn KernelLoader>) -> Self {
        Self::with_options(loader, RuntimeOptions::default())
    }

    pub fn with_options(loader: Arc<dyn KernelLoader>, options: RuntimeOptions) -> Self {
        Self {
            loader,
            options,
            descriptor: None,
            compiled: None,
            status: RuntimeStatus::Uninitialized,
        }
    }

    /// Runtime whose kernel table is always `registry`, whatever the descriptor's kernel source.
    pub fn from_registry(registry: KernelRegistry, options: RuntimeOptions) -> Self {
        Self::with_options(Arc::new(StaticKernelLoader::new(registry)), options)
    }

    pub fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    /// Nothing to prepare for the fallback backend.
    pub fn init(&mut self) -> Result<()> {
        Ok(())
    }

    pub fn status(&self) -> RuntimeStatus {
        self.status
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        self.descriptor.as_deref()
    }

    pub fn register_decoder(
        &mut self,
        encoding: impl Into<String>,
        decoder: Arc<dyn WeightDecoder>,
    ) -> Option<Arc<dyn WeightDecoder>> {
        self.options.decoders.register(encoding, decoder)
    }

    /// Fetch the descriptor, compile it, then fetch and decode the weights.
    ///
    /// Any failure leaves the runtime without a descriptor, so every later
    /// operation reports `NotReady` instead of touching half-built state.
    pub fn load(&mut self, source: &dyn ByteSource) -> Result<()> {
        self.reset();
        let result = self.load_from(source);
        if let Err(err) = &result {
            crate::error!("load failed: {}", err);
            self.reset();
        }
        result
    }

    fn load_from(&mut self, source: &dyn ByteSource) -> Result<()> {
        let graph = source
            .fetch(GRAPH_FILE, None)
            .map_err(RuntimeError::Source)?;
        self.set_descriptor(Descriptor::from_json(&graph)?);
        self.compile()?;

        let sink = self.options.progress.clone();
        let mut report = |loaded: u64, total: u64| sink.emit(ProgressEvent::Fetch { loaded, total });
        let weights = source
            .fetch(WEIGHT_FILE, Some(&mut report))
            .map_err(RuntimeError::Source)?;
        self.load_weights(&weights)
    }

    fn reset(&mut self) {
        self.descriptor = None;
        self.compiled = None;
        self.status = RuntimeStatus::Uninitialized;
    }

    /// Install a descriptor directly. Previously compiled buffers are dropped.
    pub fn set_descriptor(&mut self, descriptor: Descriptor) {
        self.descriptor = Some(Arc::new(descriptor));
        self.compiled = None;
        self.status = RuntimeStatus::Loaded;
    }

    /// Load the kernel table and allocate the weight arena and variable buffers.
    pub fn compile(&mut self) -> Result<()> {
        self.compiled = None;
        let descriptor = self
            .descriptor
            .clone()
            .ok_or_else(|| RuntimeError::not_ready("descriptor is not loaded"))?;
        self.status = RuntimeStatus::Loaded;

        let table = self
            .loader
            .load(&descriptor.kernel_source)
            .map_err(RuntimeError::KernelLoad)?;
        let kernels = descriptor
            .exec_infos
            .iter()
            .map(|info| {
                table
                    .get(&info.entry_func_name)
                    .ok_or_else(|| RuntimeError::UnknownKernel(info.entry_func_name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        let weights = build_weight_arena(&descriptor.weight_allocation)?;
        let variables = build_variable_buffers(&descriptor.variable_allocation)?;

        crate::trace!(
            "compile steps={} kernels={} weights={} variables={}",
            kernels.len(),
            descriptor.entry_func_names().len(),
            weights.len(),
            variables.len()
        );
        self.compiled = Some(Compiled {
            kernels,
            weights,
            variables,
            weights_loaded: false,
            input_views: None,
            output_views: None,
        });
        self.status = RuntimeStatus::Compiled;
        Ok(())
    }

    /// Decode `raw` with the descriptor's weight encoding into the weight arena.
    pub fn load_weights(&mut self, raw: &[u8]) -> Result<()> {
        let descriptor = self
            .descriptor
            .as_ref()
            .ok_or_else(|| RuntimeError::not_ready("descriptor is not loaded"))?;
        let compiled = self
            .compiled
            .as_mut()
            .ok_or_else(|| RuntimeError::not_ready("weight array is not allocated"))?;

        let decoder = self.options.decoders.get(&descriptor.weight_encoding)?;
        let values = decoder.decode(raw, &descriptor.weight_allocation)?;
        compiled.weights.fill(&values)?;
        compiled.weights_loaded = true;
        crate::trace!(
            "weights.load encoding={} bytes={} elements={}",
            descriptor.weight_encoding,
            raw.len(),
            values.len()
        );
        Ok(())
    }

    /// Execute the plan once. Requires compiled buffers and resolved
    /// input/output views; a failing step aborts the rest of the run and
    /// leaves earlier writes in place.
    pub fn run(&mut self) -> Result<()> {
        let descriptor = self
            .descriptor
            .clone()
            .ok_or_else(|| RuntimeError::not_ready("descriptor is not loaded"))?;
        let compiled = self
            .compiled
            .as_ref()
            .ok_or_else(|| RuntimeError::not_ready("variable map is not initialized"))?;
        if !compiled.views_resolved() {
            return Err(RuntimeError::not_ready(
                "get_input_views and get_output_views must be called prior to run",
            ));
        }
        if !compiled.weights_loaded {
            crate::warning!("running with weights that were never loaded");
        }

        self.status = RuntimeStatus::Running;
        let result = exec::run_plan(
            &descriptor,
            &compiled.kernels,
            &compiled.weights,
            &compiled.variables,
            &self.options,
        );
        self.status = match result {
            Ok(()) => RuntimeStatus::Completed,
            Err(_) => RuntimeStatus::Ready,
        };
        result
    }

    pub fn get_input_views(&mut self) -> Result<ViewList> {
        self.graph_views(BufferRole::Input)
    }

    pub fn get_output_views(&mut self) -> Result<ViewList> {
        self.graph_views(BufferRole::Output)
    }

    fn graph_views(&mut self, role: BufferRole) -> Result<ViewList> {
        let descriptor = self
            .descriptor
            .as_ref()
            .ok_or_else(|| RuntimeError::not_ready("descriptor is not loaded"))?;
        let compiled = self
            .compiled
            .as_mut()
            .ok_or_else(|| RuntimeError::not_ready("variable map is not initialized"))?;

        let (names, cache) = match role {
            BufferRole::Output => (&descriptor.outputs, &mut compiled.output_views),
            _ => (&descriptor.inputs, &mut compiled.input_views),
        };
        if let Some(views) = cache {
            return Ok(views.clone());
        }

        let views = names
            .iter()
            .map(|name| {
                compiled
                    .variables
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UnboundGraphBuffer {
                        role,
                        name: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let views: ViewList = views.into();
        *cache = Some(views.clone());

        if compiled.views_resolved() {
            self.status = RuntimeStatus::Ready;
        }
        Ok(views)
    }

    pub fn weights(&self) -> Result<&WeightArena> {
        self.compiled
            .as_ref()
            .map(|compiled| &compiled.weights)
            .ok_or_else(|| RuntimeError::not_ready("weight array is not allocated"))
    }

    pub fn variables(&self) -> Result<&VariableBuffers> {
        self.compiled
            .as_ref()
            .map(|compiled| &compiled.variables)
            .ok_or_else(|| RuntimeError::not_ready("variable map is not initialized"))
    }

    pub fn weight_view(&self, name: &str) -> Option<BufferView> {
        self.weights().ok()?.view(name).cloned()
    }

    pub fn variable_view(&self, name: &str) -> Option<BufferView> {
        self.variables().ok()?.get(name).cloned()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("status", &self.status)
            .field("options", &self.options)
            .field("descriptor", &self.descriptor.is_some())
            .field("compiled", &self.compiled.is_some())
            .finish()
    }
}
