use std::fmt;

/// Which buffer mapping an execution step failed to resolve a name against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferRole {
    Input,
    Output,
    Weight,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferRole::Input => write!(f, "input"),
            BufferRole::Output => write!(f, "output"),
            BufferRole::Weight => write!(f, "weight"),
        }
    }
}

/// Errors surfaced by the runtime to the caller of load, compile, decode or run.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// An operation ran before its predecessor state was reached.
    #[error("not ready: {0}")]
    NotReady(String),
    /// A declared arena or buffer size is invalid or cannot be allocated.
    #[error("allocation failed for {name}: {reason}")]
    Allocation { name: String, reason: String },
    #[error("no weight decoder registered for encoding {0:?}")]
    UnsupportedEncoding(String),
    /// An execution step or graph-level list names a buffer that does not exist.
    #[error("step {step}: unbound {role} buffer {name:?}")]
    UnboundBuffer {
        step: usize,
        role: BufferRole,
        name: String,
    },
    /// A graph-level input or output has no variable buffer.
    #[error("graph {role} {name:?} has no variable buffer")]
    UnboundGraphBuffer { role: BufferRole, name: String },
    #[error("kernel {0:?} is not present in the kernel table")]
    UnknownKernel(String),
    #[error("kernel {0:?} is already registered")]
    DuplicateKernel(String),
    #[error("step {step}: kernel {kernel:?} failed: {cause:#}")]
    Kernel {
        step: usize,
        kernel: String,
        cause: anyhow::Error,
    },
    #[error("kernel loader failed: {0:#}")]
    KernelLoad(anyhow::Error),
    #[error("weight decode failed: {0}")]
    Decode(String),
    #[error("invalid descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
    /// Failure reported by a byte source, passed through unchanged.
    #[error(transparent)]
    Source(anyhow::Error),
}

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

impl RuntimeError {
    pub(crate) fn not_ready(what: impl Into<String>) -> Self {
        RuntimeError::NotReady(what.into())
    }

    pub(crate) fn allocation(name: impl Into<String>, reason: impl Into<String>) -> Self {
        RuntimeError::Allocation {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        RuntimeError::Decode(reason.into())
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, RuntimeError::NotReady(_))
    }
}
