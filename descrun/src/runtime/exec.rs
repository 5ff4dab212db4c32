use crate::descriptor::{Descriptor, ExecInfo};
use crate::error::{BufferRole, Result, RuntimeError};
use crate::kernel::KernelFn;
use crate::memory::{BufferView, VariableBuffers, WeightArena};
use crate::progress::ProgressEvent;
use crate::timer::millis;

use super::options::RuntimeOptions;

fn resolve<'a>(
    step: usize,
    role: BufferRole,
    names: &[String],
    lookup: impl Fn(&str) -> Option<&'a BufferView>,
) -> Result<Vec<BufferView>> {
    names
        .iter()
        .map(|name| {
            lookup(name).cloned().ok_or_else(|| {
                crate::critical!("step {}: unbound {} buffer {}", step, role, name);
                RuntimeError::UnboundBuffer {
                    step,
                    role,
                    name: name.clone(),
                }
            })
        })
        .collect()
}

fn log_step(index: usize, info: &ExecInfo) {
    crate::log!(
        "{} [{}] -- in={:?} out={:?} weights={:?}",
        index,
        info.entry_func_name,
        info.inputs,
        info.outputs,
        info.weights
    );
}

/// Execute every step once, in declared order.
///
/// Steps communicate only through the shared buffers, so the declared order
/// is the whole dependency story: nothing is reordered or skipped.
pub(crate) fn run_plan(
    descriptor: &Descriptor,
    kernels: &[KernelFn],
    weights: &WeightArena,
    variables: &VariableBuffers,
    options: &RuntimeOptions,
) -> Result<()> {
    let total = descriptor.exec_infos.len();
    let policy = options.yield_policy;
    let clock = options.clock.as_ref();
    let sink = options.progress.as_ref();

    let run_entry = clock.now();
    let mut last_progress = run_entry;
    for (index, (info, kernel)) in descriptor.exec_infos.iter().zip(kernels).enumerate() {
        let now = clock.now();
        if now.saturating_sub(last_progress) >= policy.interval {
            sink.emit(ProgressEvent::Exec {
                completed: index,
                total,
                elapsed_ms: millis(now.saturating_sub(run_entry)),
            });
            last_progress = now;
            clock.pause(policy.pause);
        }

        let inputs = resolve(index, BufferRole::Input, &info.inputs, |name| {
            variables.get(name)
        })?;
        let outputs = resolve(index, BufferRole::Output, &info.outputs, |name| {
            variables.get(name)
        })?;
        let weight_views = resolve(index, BufferRole::Weight, &info.weights, |name| {
            weights.view(name)
        })?;

        if options.trace_enabled {
            log_step(index, info);
        }
        crate::trace!("step {} kernel={}", index, info.entry_func_name);
        kernel(&inputs, &outputs, &weight_views, &info.call_option).map_err(|cause| {
            crate::error!(
                "step {}: kernel {} failed: {:#}",
                index,
                info.entry_func_name,
                cause
            );
            RuntimeError::Kernel {
                step: index,
                kernel: info.entry_func_name.clone(),
                cause,
            }
        })?;
    }

    sink.emit(ProgressEvent::Exec {
        completed: total,
        total,
        elapsed_ms: millis(clock.now().saturating_sub(run_entry)),
    });
    Ok(())
}
