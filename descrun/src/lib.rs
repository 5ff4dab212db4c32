#[doc(hidden)]
pub mod logging;

mod decoder;
mod descriptor;
mod error;
mod kernel;
mod memory;
mod progress;
mod runtime;
mod source;
mod timer;

pub use decoder::{
    encode_eightbit, encode_raw, get_weight_decoder, DecoderRegistry, EightbitDecoder, RawDecoder,
    WeightDecoder,
};
pub use descriptor::{
    AllocationEntry, CallOption, Descriptor, ExecInfo, VariableAllocation, WeightAllocation,
};
pub use error::{BufferRole, Result, RuntimeError};
pub use kernel::{KernelFn, KernelLoader, KernelRegistry, KernelTable, StaticKernelLoader};
pub use memory::{
    build_variable_buffers, build_weight_arena, BufferView, SharedBuffer, VariableBuffers,
    ViewRead, ViewWrite, WeightArena,
};
pub use progress::{LogProgress, ProgressEvent, ProgressSink, RecordedProgress};
pub use runtime::{
    Runtime, RuntimeOptions, RuntimeStatus, ViewList, YieldPolicy, BACKEND_NAME, GRAPH_FILE,
    WEIGHT_FILE,
};
pub use source::{
    read_chunked, Blob, ByteSource, DirectorySource, FetchProgress, MemorySource,
};
pub use timer::{Clock, ManualClock, SystemClock};
