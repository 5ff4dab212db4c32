use std::collections::HashMap;

use anyhow::{anyhow, Result};
use descrun::{
    build_variable_buffers, build_weight_arena, AllocationEntry, RuntimeError, VariableAllocation,
    WeightAllocation,
};

fn weights(total_size: i64, entries: &[(&str, usize, usize)]) -> WeightAllocation {
    WeightAllocation {
        total_size,
        allocations: entries
            .iter()
            .map(|(name, offset, size)| (name.to_string(), AllocationEntry::new(*offset, *size)))
            .collect(),
    }
}

fn variables(entries: &[(&str, usize, usize)]) -> VariableAllocation {
    VariableAllocation {
        allocations: entries
            .iter()
            .map(|(name, offset, size)| (name.to_string(), AllocationEntry::new(*offset, *size)))
            .collect::<HashMap<_, _>>(),
    }
}

#[test]
fn weight_views_alias_the_arena() -> Result<()> {
    let arena = build_weight_arena(&weights(10, &[("a", 0, 4), ("b", 4, 6)]))?;
    assert_eq!(arena.len(), 10);
    let a = arena.view("a").ok_or_else(|| anyhow!("missing view a"))?;
    let b = arena.view("b").ok_or_else(|| anyhow!("missing view b"))?;
    assert_eq!(a.len(), 4);
    assert_eq!(b.len(), 6);
    assert_eq!(b.range(), 4..10);

    a.copy_from(&[1.0, 2.0, 3.0, 4.0])?;
    let whole = arena.as_view();
    assert_eq!(&whole.to_vec()?[..4], &[1.0, 2.0, 3.0, 4.0]);

    whole.write()?[4] = 9.0;
    assert_eq!(b.to_vec()?[0], 9.0);
    assert!(a.shares_storage(b));
    Ok(())
}

#[test]
fn overlapping_weight_views_see_each_other() -> Result<()> {
    let arena = build_weight_arena(&weights(6, &[("lo", 0, 4), ("hi", 2, 4)]))?;
    let lo = arena.view("lo").ok_or_else(|| anyhow!("missing view lo"))?;
    let hi = arena.view("hi").ok_or_else(|| anyhow!("missing view hi"))?;
    hi.fill(5.0)?;
    assert_eq!(lo.to_vec()?, vec![0.0, 0.0, 5.0, 5.0]);
    Ok(())
}

#[test]
fn weight_arena_fill_copies_decoded_values() -> Result<()> {
    let arena = build_weight_arena(&weights(4, &[("w", 1, 2)]))?;
    arena.fill(&[1.0, 2.0, 3.0, 4.0])?;
    let w = arena.view("w").ok_or_else(|| anyhow!("missing view w"))?;
    assert_eq!(w.to_vec()?, vec![2.0, 3.0]);

    let err = arena.fill(&[1.0]).err().ok_or_else(|| anyhow!("short fill accepted"))?;
    assert!(matches!(err, RuntimeError::Decode(_)));
    Ok(())
}

#[test]
fn empty_weight_arena_is_valid() -> Result<()> {
    let arena = build_weight_arena(&WeightAllocation::default())?;
    assert!(arena.is_empty());
    assert!(arena.views().is_empty());
    Ok(())
}

#[test]
fn negative_total_size_is_rejected() -> Result<()> {
    let err = build_weight_arena(&weights(-1, &[]))
        .err()
        .ok_or_else(|| anyhow!("negative total_size accepted"))?;
    assert!(matches!(err, RuntimeError::Allocation { .. }));
    Ok(())
}

#[test]
fn weight_entry_past_the_arena_is_rejected() -> Result<()> {
    let err = build_weight_arena(&weights(4, &[("w", 2, 3)]))
        .err()
        .ok_or_else(|| anyhow!("out-of-bounds entry accepted"))?;
    match err {
        RuntimeError::Allocation { name, .. } => assert_eq!(name, "w"),
        other => return Err(anyhow!("unexpected error: {}", other)),
    }
    Ok(())
}

#[test]
fn oversized_variable_is_rejected() -> Result<()> {
    let err = build_variable_buffers(&variables(&[("huge", 0, usize::MAX / 2)]))
        .err()
        .ok_or_else(|| anyhow!("oversized variable accepted"))?;
    assert!(matches!(err, RuntimeError::Allocation { .. }));
    Ok(())
}

#[test]
fn variables_are_independent_and_zeroed() -> Result<()> {
    // Same offset on purpose: variable offsets do not imply sharing.
    let buffers = build_variable_buffers(&variables(&[("x", 0, 3), ("y", 0, 3), ("z", 8, 0)]))?;
    assert_eq!(buffers.len(), 3);
    let x = buffers.get("x").ok_or_else(|| anyhow!("missing x"))?;
    let y = buffers.get("y").ok_or_else(|| anyhow!("missing y"))?;
    let z = buffers.get("z").ok_or_else(|| anyhow!("missing z"))?;

    assert_eq!(x.to_vec()?, vec![0.0; 3]);
    assert_eq!(y.to_vec()?, vec![0.0; 3]);
    assert!(z.is_empty());
    assert!(!x.shares_storage(y));

    x.copy_from(&[1.0, 2.0, 3.0])?;
    assert_eq!(y.to_vec()?, vec![0.0; 3]);
    Ok(())
}

#[test]
fn copy_from_checks_length() -> Result<()> {
    let buffers = build_variable_buffers(&variables(&[("x", 0, 2)]))?;
    let x = buffers.get("x").ok_or_else(|| anyhow!("missing x"))?;
    assert!(x.copy_from(&[1.0, 2.0, 3.0]).is_err());
    assert_eq!(x.to_vec()?, vec![0.0, 0.0]);
    Ok(())
}

#[test]
fn overlapping_guards_report_instead_of_blocking() -> Result<()> {
    let arena = build_weight_arena(&weights(4, &[("a", 0, 2), ("b", 2, 2)]))?;
    let a = arena.view("a").ok_or_else(|| anyhow!("missing view a"))?;
    let b = arena.view("b").ok_or_else(|| anyhow!("missing view b"))?;

    {
        let _read = a.read()?;
        // Readers share; a writer on the same arena does not.
        assert!(b.read().is_ok());
        let err = b.write().err().ok_or_else(|| anyhow!("write beside a reader"))?;
        assert!(err.to_string().contains("already borrowed"));
    }
    {
        let _write = a.write()?;
        assert!(b.read().is_err());
        assert!(a.to_vec().is_err());
    }
    b.fill(1.0)?;
    assert_eq!(arena.as_view().to_vec()?, vec![0.0, 0.0, 1.0, 1.0]);
    Ok(())
}
