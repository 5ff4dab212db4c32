mod plan;
mod view;

pub use plan::{build_variable_buffers, build_weight_arena, VariableBuffers, WeightArena};
pub use view::{BufferView, SharedBuffer, ViewRead, ViewWrite};
