use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Opaque per-step configuration handed to the kernel untouched.
pub type CallOption = Value;

/// Region of an arena or buffer, in `f32` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub offset: usize,
    pub size: usize,
}

impl AllocationEntry {
    pub fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.size)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightAllocation {
    /// Element count of the weight arena. Signed so that a corrupt descriptor
    /// is rejected by the allocator instead of by the parser.
    pub total_size: i64,
    pub allocations: HashMap<String, AllocationEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableAllocation {
    pub allocations: HashMap<String, AllocationEntry>,
}

/// One kernel invocation of the execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecInfo {
    pub entry_func_name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub weights: Vec<String>,
    #[serde(default)]
    pub call_option: CallOption,
}

fn default_weight_encoding() -> String {
    "raw".to_string()
}

/// Parsed graph description produced by the external compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Payload handed to the kernel loader; never interpreted here.
    #[serde(default)]
    pub kernel_source: Value,
    #[serde(default = "default_weight_encoding")]
    pub weight_encoding: String,
    pub weight_allocation: WeightAllocation,
    pub variable_allocation: VariableAllocation,
    pub exec_infos: Vec<ExecInfo>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl Descriptor {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Distinct kernel names referenced by the plan, in first-use order.
    pub fn entry_func_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for info in &self.exec_infos {
            if !names.contains(&info.entry_func_name.as_str()) {
                names.push(&info.entry_func_name);
            }
        }
        names
    }
}
