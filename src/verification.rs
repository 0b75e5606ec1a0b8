//! Post-sweep checks on a thunk layout. Run automatically in debug builds
//! and from tests; all of these hold by construction, so a failure here
//! means a layout bug, not bad input.

use crate::Context;
use crate::arch::Arch;
use crate::error::Result;
use crate::section::OutputSectionId;
use crate::symbol::NO_THUNK;
use anyhow::bail;
use anyhow::ensure;

/// Verifies that every member of `osec_id` was placed without overlap, that
/// thunks are ordered and within their size bound, that every routed
/// relocation refers to a slot that holds its symbol and is within branch
/// range, and that no stale trampoline registrations survived the sweep.
pub fn verify_thunk_layout<A: Arch>(ctx: &Context, osec_id: OutputSectionId) -> Result {
    let osec = ctx.output_section(osec_id);

    let mut intervals: Vec<(u64, u64)> = Vec::new();

    for &isec_id in osec.members() {
        let isec = ctx.input_section(isec_id);
        ensure!(isec.is_placed(), "{isec_id:?} was never placed");
        ensure!(
            isec.alignment.align_up(isec.offset()) == isec.offset(),
            "{isec_id:?} is at 0x{:x}, which breaks its alignment of {}",
            isec.offset(),
            isec.alignment,
        );
        intervals.push((isec.offset(), isec.size));
    }

    for pair in osec.thunks().windows(2) {
        ensure!(
            pair[0].offset() <= pair[1].offset(),
            "Thunks are out of order: 0x{:x} before 0x{:x}",
            pair[0].offset(),
            pair[1].offset(),
        );
    }
    for (i, thunk) in osec.thunks().iter().enumerate() {
        ensure!(
            thunk.thunk_idx() == i as i32,
            "Thunk at position {i} thinks it's thunk {}",
            thunk.thunk_idx(),
        );
        ensure!(
            thunk.size_bytes::<A>() < A::MAX_THUNK_SIZE,
            "Thunk {} is {} bytes, over the {} byte limit",
            thunk.thunk_idx(),
            thunk.size_bytes::<A>(),
            A::MAX_THUNK_SIZE,
        );
        intervals.push((thunk.offset(), thunk.size_bytes::<A>()));
    }

    intervals.sort_unstable();
    for pair in intervals.windows(2) {
        ensure!(
            pair[0].0 + pair[0].1 <= pair[1].0,
            "Overlap between [0x{:x}, 0x{:x}) and [0x{:x}, 0x{:x})",
            pair[0].0,
            pair[0].0 + pair[0].1,
            pair[1].0,
            pair[1].0 + pair[1].1,
        );
    }
    if let Some(&(start, size)) = intervals.last() {
        ensure!(
            start + size <= osec.size(),
            "Section size 0x{:x} doesn't cover contents ending at 0x{:x}",
            osec.size(),
            start + size,
        );
    }

    for &isec_id in osec.members() {
        let isec = ctx.input_section(isec_id);
        ensure!(
            isec.range_extension().len() == isec.relocations.len(),
            "{isec_id:?} has {} relocations but {} routing entries",
            isec.relocations.len(),
            isec.range_extension().len(),
        );
        for (rel, extension) in isec.relocations.iter().zip(isec.range_extension()) {
            if !extension.has_thunk() {
                continue;
            }
            ensure!(
                extension.sym_idx >= 0,
                "Relocation at 0x{:x} in {isec_id:?} was routed to thunk {} but never got a slot",
                rel.r_offset,
                extension.thunk_idx,
            );
            let Some(thunk) = osec.thunks().get(extension.thunk_idx as usize) else {
                bail!(
                    "Relocation at 0x{:x} in {isec_id:?} refers to nonexistent thunk {}",
                    rel.r_offset,
                    extension.thunk_idx,
                );
            };
            let slot = extension.sym_idx as usize;
            ensure!(
                thunk.symbols().get(slot) == Some(&rel.symbol),
                "Slot {slot} of thunk {} doesn't hold symbol {}",
                thunk.thunk_idx(),
                rel.symbol,
            );

            let place = osec.address as i64 + isec.offset() as i64 + rel.r_offset as i64;
            let target = osec.address as i64 + thunk.entry_offset::<A>(slot) as i64;
            let distance = target - place;
            ensure!(
                -A::MAX_BRANCH_DISTANCE <= distance && distance < A::MAX_BRANCH_DISTANCE,
                "Relocation at 0x{:x} in {isec_id:?} can't reach its trampoline: distance {distance}",
                rel.r_offset,
            );
        }
    }

    for sym in ctx.symbols() {
        ensure!(
            sym.thunk_idx == NO_THUNK && sym.thunk_sym_idx == NO_THUNK,
            "A trampoline registration survived the sweep",
        );
        ensure!(
            !sym.is_claimed_by_thunk(),
            "A symbol is still claimed after the sweep",
        );
    }

    Ok(())
}
