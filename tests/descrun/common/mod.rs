#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use descrun::{
    encode_raw, BufferView, CallOption, Descriptor, KernelRegistry, RecordedProgress, Runtime,
    RuntimeOptions, YieldPolicy,
};
use serde_json::{json, Value};

pub const E2E_WEIGHTS: [f32; 4] = [1.0, 2.0, 3.0, 4.0];

fn first<'a>(views: &'a [BufferView], what: &str) -> Result<&'a BufferView> {
    views
        .first()
        .ok_or_else(|| anyhow!("kernel expects at least one {}", what))
}

/// `outputs[0] = inputs[0] + weights[0]`, element-wise.
pub fn copy_kernel(
    inputs: &[BufferView],
    outputs: &[BufferView],
    weights: &[BufferView],
    _option: &CallOption,
) -> Result<()> {
    let x = first(inputs, "input")?.to_vec()?;
    let w = first(weights, "weight")?.to_vec()?;
    let sum = x.iter().zip(&w).map(|(a, b)| a + b).collect::<Vec<_>>();
    first(outputs, "output")?.copy_from(&sum)
}

/// `outputs[0] = inputs[0] + inputs[1]`, element-wise.
pub fn add_kernel(
    inputs: &[BufferView],
    outputs: &[BufferView],
    _weights: &[BufferView],
    _option: &CallOption,
) -> Result<()> {
    if inputs.len() != 2 {
        return Err(anyhow!("add expects two inputs, got {}", inputs.len()));
    }
    let a = inputs[0].to_vec()?;
    let b = inputs[1].to_vec()?;
    let sum = a.iter().zip(&b).map(|(a, b)| a + b).collect::<Vec<_>>();
    first(outputs, "output")?.copy_from(&sum)
}

/// `outputs[0] = inputs[0] * call_option.factor`.
pub fn scale_kernel(
    inputs: &[BufferView],
    outputs: &[BufferView],
    _weights: &[BufferView],
    option: &CallOption,
) -> Result<()> {
    let factor = option
        .get("factor")
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("scale needs a numeric factor"))? as f32;
    let scaled = first(inputs, "input")?
        .to_vec()?
        .into_iter()
        .map(|v| v * factor)
        .collect::<Vec<_>>();
    first(outputs, "output")?.copy_from(&scaled)
}

/// `outputs[0] += inputs[0]`; input and output may be the same buffer.
pub fn accumulate_kernel(
    inputs: &[BufferView],
    outputs: &[BufferView],
    _weights: &[BufferView],
    _option: &CallOption,
) -> Result<()> {
    let x = first(inputs, "input")?.to_vec()?;
    let mut out = first(outputs, "output")?.write()?;
    for (slot, value) in out.iter_mut().zip(x) {
        *slot += value;
    }
    Ok(())
}

pub fn fail_kernel(
    _inputs: &[BufferView],
    _outputs: &[BufferView],
    _weights: &[BufferView],
    _option: &CallOption,
) -> Result<()> {
    Err(anyhow!("kernel refused to run"))
}

pub fn registry() -> Result<KernelRegistry> {
    Ok(KernelRegistry::new()
        .with_kernel("copy", copy_kernel)?
        .with_kernel("add", add_kernel)?
        .with_kernel("scale", scale_kernel)?
        .with_kernel("accumulate", accumulate_kernel)?
        .with_kernel("fail", fail_kernel)?)
}

/// Registry whose kernels also bump `counter` on every call.
pub fn counting_registry(counter: Arc<AtomicUsize>) -> Result<KernelRegistry> {
    let mut registry = registry()?;
    registry.register("count", move |inputs, outputs, weights, option| {
        counter.fetch_add(1, Ordering::SeqCst);
        if inputs.is_empty() {
            return Ok(());
        }
        copy_kernel(inputs, outputs, weights, option)
    })?;
    Ok(registry)
}

pub fn e2e_descriptor_json() -> Value {
    json!({
        "kernel_source": "",
        "weight_allocation": {
            "total_size": 4,
            "allocations": { "w": { "offset": 0, "size": 4 } }
        },
        "variable_allocation": {
            "allocations": {
                "x": { "offset": 0, "size": 4 },
                "y": { "offset": 0, "size": 4 }
            }
        },
        "exec_infos": [
            {
                "entry_func_name": "copy",
                "inputs": ["x"],
                "outputs": ["y"],
                "weights": ["w"],
                "call_option": {}
            }
        ],
        "inputs": ["x"],
        "outputs": ["y"]
    })
}

pub fn e2e_descriptor() -> Result<Descriptor> {
    Ok(Descriptor::from_value(e2e_descriptor_json())?)
}

/// Descriptor with one weight `w` of `len` elements and the given variables and steps.
pub fn descriptor_with(
    len: usize,
    variables: &[&str],
    steps: Value,
    inputs: &[&str],
    outputs: &[&str],
) -> Result<Descriptor> {
    let mut allocations = serde_json::Map::new();
    for name in variables {
        allocations.insert(name.to_string(), json!({ "offset": 0, "size": len }));
    }
    Ok(Descriptor::from_value(json!({
        "kernel_source": null,
        "weight_allocation": {
            "total_size": len,
            "allocations": { "w": { "offset": 0, "size": len } }
        },
        "variable_allocation": { "allocations": allocations },
        "exec_infos": steps,
        "inputs": inputs,
        "outputs": outputs,
    }))?)
}

pub fn quiet_options(progress: Arc<RecordedProgress>) -> RuntimeOptions {
    RuntimeOptions::new()
        .with_progress(progress)
        .with_yield_policy(YieldPolicy::never())
}

pub fn runtime(registry: KernelRegistry) -> (Runtime, Arc<RecordedProgress>) {
    let progress = Arc::new(RecordedProgress::new());
    let runtime = Runtime::from_registry(registry, quiet_options(progress.clone()));
    (runtime, progress)
}

/// Compile, load raw weights and resolve the graph views.
pub fn ready_runtime(
    descriptor: Descriptor,
    registry: KernelRegistry,
    weights: &[f32],
) -> Result<(Runtime, Arc<RecordedProgress>)> {
    let (mut runtime, progress) = self::runtime(registry);
    runtime.set_descriptor(descriptor);
    runtime.compile()?;
    runtime.load_weights(&encode_raw(weights))?;
    runtime.get_input_views()?;
    runtime.get_output_views()?;
    Ok((runtime, progress))
}

pub fn assert_close(actual: &[f32], expected: &[f32], tol: f32) -> Result<()> {
    if actual.len() != expected.len() {
        return Err(anyhow!(
            "length mismatch: actual {} expected {}",
            actual.len(),
            expected.len()
        ));
    }
    for (idx, (a, b)) in actual.iter().zip(expected).enumerate() {
        if (a - b).abs() > tol {
            return Err(anyhow!(
                "value mismatch at index {}: {} vs {} (tol {})",
                idx,
                a,
                b,
                tol
            ));
        }
    }
    Ok(())
}
