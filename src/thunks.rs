//! Lays out the input sections of an output section while synthesising the
//! range extension thunks needed to carry direct branches that can't reach
//! their target.
//!
//! Branch instructions on RISC architectures are 4 bytes like everything
//! else, so their PC-relative immediates are much narrower than the 32 bits
//! that x86-64 branches get. An aarch64 BL reaches PC ± 128 MiB, an ARM one
//! PC ± 16 MiB. When layout puts a caller and callee further apart than
//! that, the branch is redirected to a linker-synthesised trampoline (a
//! "thunk") that materialises the full target address in a scratch register
//! and branches indirectly.
//!
//! Placement is a single forward sweep over the output section's members.
//! Section offsets are assigned monotonically and each thunk is placed after
//! the sections it serves, so once a branch has been judged to reach
//! directly, nothing the sweep does later can move its target out of range.
//!
//! Thunks are a tiny fraction of the text segment in practice, well under
//! 0.01% on aarch64, so we make no attempt to minimise their count. What
//! matters is that every routed branch can reach its trampoline and that the
//! output doesn't depend on how the parallel relocation scans interleave.

use crate::Context;
use crate::arch::Arch;
use crate::debug_assert_bail;
use crate::error::Result;
use crate::section::InputSection;
use crate::section::InputSectionId;
use crate::section::OFFSET_UNASSIGNED;
use crate::section::OutputSectionId;
use crate::section::RangeExtensionRef;
use crate::section::Relocation;
use crate::symbol::NO_THUNK;
use crate::symbol::Symbol;
use crate::symbol::SymbolId;
use crate::threading::prelude::*;
use anyhow::ensure;
use std::mem::take;
use std::sync::Mutex;

/// A group of trampolines placed between two runs of input sections. Each
/// symbol in `symbols` gets one fixed-size trampoline slot; relocations
/// routed here record the slot of their target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thunk {
    pub(crate) thunk_idx: i32,
    pub(crate) offset: u64,
    pub(crate) symbols: Vec<SymbolId>,
}

impl Thunk {
    pub fn thunk_idx(&self) -> i32 {
        self.thunk_idx
    }

    /// Offset of the thunk within its output section.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Symbols routed through the thunk, in slot order.
    pub fn symbols(&self) -> &[SymbolId] {
        &self.symbols
    }

    pub fn size_bytes<A: Arch>(&self) -> u64 {
        self.symbols.len() as u64 * A::THUNK_STUB_SIZE
    }

    /// Offset within the output section of the trampoline in `slot`.
    pub fn entry_offset<A: Arch>(&self, slot: usize) -> u64 {
        self.offset + slot as u64 * A::THUNK_STUB_SIZE
    }
}

/// Returns whether `rel`, located in `isec`, reaches `sym` with a direct
/// branch.
///
/// Out-of-section targets are pessimistically treated as out of range. That
/// keeps the answer stable as the sweep advances: sections that already have
/// an offset never move, and thunks are always placed after the sections
/// they serve, so "reachable" can't later become false.
fn is_reachable<A: Arch>(
    ctx: &Context,
    isec: &InputSection,
    sym: &Symbol,
    rel: &Relocation,
) -> bool {
    let Some(target_section_id) = sym.input_section else {
        return false;
    };
    let target_section = ctx.input_section(target_section_id);
    if target_section.output_section != isec.output_section {
        return false;
    }

    // Even a same-section target is branched to via its PLT stub if it has
    // one.
    if sym.flags.has_plt() {
        return false;
    }

    // The target section hasn't been placed yet.
    if target_section.offset == OFFSET_UNASSIGNED {
        return false;
    }

    // On ARM, a plain B can't switch between ARM and Thumb, so interworking
    // branches need a thunk no matter how close the target is.
    if A::branch_requires_interworking(rel.r_type, sym.flags.is_thumb()) {
        return false;
    }

    let base = ctx.output_section(isec.output_section).address as i64;
    let s = base + target_section.offset as i64 + sym.value as i64;
    let a = rel.addend;
    let p = base + isec.offset as i64 + rel.r_offset as i64;
    let distance = s + a - p;
    -A::MAX_BRANCH_DISTANCE <= distance && distance < A::MAX_BRANCH_DISTANCE
}

/// Finds branches in one section that can't reach their target and routes
/// each through a trampoline: the one its target is already registered with
/// if there is one, otherwise the thunk currently being filled
/// (`thunk_idx`).
///
/// Runs concurrently with scans of the other sections in the batch. A
/// symbol's first claimant appends it to `thunk_symbols`; slots aren't known
/// until the batch has been fully scanned, so routes to the current thunk
/// are recorded with an unset slot and fixed up afterwards.
fn scan_relocations<A: Arch>(
    ctx: &Context,
    isec_id: InputSectionId,
    thunk_idx: i32,
    thunk_symbols: &Mutex<Vec<SymbolId>>,
) -> Vec<RangeExtensionRef> {
    let isec = ctx.input_section(isec_id);
    let mut range_extension = vec![RangeExtensionRef::default(); isec.relocations.len()];

    for (rel, extension) in isec.relocations.iter().zip(&mut range_extension) {
        if !A::is_branch_relocation(rel.r_type) {
            continue;
        }

        // Undefined symbol. Relocation application will report it.
        let sym = ctx.symbol(rel.symbol);
        if sym.file.is_none() {
            continue;
        }

        if is_reachable::<A>(ctx, isec, sym, rel) {
            continue;
        }

        if sym.thunk_idx != NO_THUNK {
            *extension = RangeExtensionRef {
                thunk_idx: sym.thunk_idx,
                sym_idx: sym.thunk_sym_idx,
            };
            continue;
        }

        *extension = RangeExtensionRef {
            thunk_idx,
            sym_idx: NO_THUNK,
        };

        if sym.claim_for_thunk() {
            thunk_symbols.lock().unwrap().push(rel.symbol);
        }
    }

    range_extension
}

/// Releases the symbol registrations of a thunk that the sweep has advanced
/// out of range of. The thunk's bytes stay in the output; dropping the
/// registrations just means later references to the same symbols enlist them
/// into a thunk they can actually reach.
fn retire_thunk(ctx: &mut Context, thunk: &Thunk) {
    for &sym_id in &thunk.symbols {
        let sym = ctx.symbol_mut(sym_id);
        sym.thunk_idx = NO_THUNK;
        sym.thunk_sym_idx = NO_THUNK;
        sym.release_thunk_claim();
    }
}

/// Assigns offsets to all members of `osec_id`, placing thunks as needed so
/// that every direct branch can reach its target, and records for each
/// branch relocation which trampoline slot serves it. Sets the output
/// section's final size.
#[tracing::instrument(skip_all, name = "Create range extension thunks")]
pub fn create_range_extension_thunks<A: Arch>(
    ctx: &mut Context,
    osec_id: OutputSectionId,
) -> Result {
    let members = take(&mut ctx.output_section_mut(osec_id).members);
    if members.is_empty() {
        return Ok(());
    }

    // Give the first section an offset and mark the rest unplaced so that
    // the reachability check can tell them apart.
    ctx.input_section_mut(members[0]).offset = 0;
    for &isec_id in &members[1..] {
        ctx.input_section_mut(isec_id).offset = OFFSET_UNASSIGNED;
    }

    // The sweep runs from the start of the section to the end, tracking
    // progress with four indexes that only move forward:
    //
    //   a: oldest thunk still reachable from the batch frontier; everything
    //      below it has been retired.
    //   b: first section of the current batch.
    //   c: end of the current batch (exclusive).
    //   d: first section that hasn't been given an offset yet.
    let mut a = 0;
    let mut b = 0;
    let mut d = 0;
    let mut offset: u64 = 0;

    let mut thunks: Vec<Thunk> = Vec::new();

    while b < members.len() {
        // Place sections ahead of the batch for as long as a thunk appended
        // after them would still be reachable from the batch start. The
        // MAX_THUNK_SIZE of headroom guarantees that the thunk allocated
        // below can serve every section in the batch.
        while d < members.len() {
            let sec = ctx.input_section(members[d]);
            let aligned = sec.alignment.align_up(offset);
            let size = sec.size;
            let b_offset = ctx.input_section(members[b]).offset as i64;
            if aligned as i64 + size as i64 + A::MAX_THUNK_SIZE as i64
                >= b_offset + A::MAX_BRANCH_DISTANCE
            {
                break;
            }
            ctx.input_section_mut(members[d]).offset = aligned;
            offset = aligned + size;
            d += 1;
        }

        // The batch spans about a tenth of the branch range, and always
        // includes at least one section so the sweep makes progress. An
        // unplaced offset reads as -1 here, which lets the batch absorb
        // sections that placement stalled on because an earlier one was
        // larger than the branch range.
        let b_offset = ctx.input_section(members[b]).offset as i64;
        let mut c = b + 1;
        while c < members.len() {
            let sec = ctx.input_section(members[c]);
            if sec.offset as i64 + sec.size as i64 >= b_offset + A::THUNK_BATCH_SIZE {
                break;
            }
            c += 1;
        }

        // Retire thunks that the end of the batch can no longer reach.
        // Leaving their registrations in place would hand stale slots to
        // relocations scanned in later batches.
        let frontier = if c == members.len() {
            offset as i64
        } else {
            ctx.input_section(members[c]).offset as i64
        };
        while a < thunks.len() && (thunks[a].offset as i64) + A::MAX_BRANCH_DISTANCE < frontier {
            retire_thunk(ctx, &thunks[a]);
            a += 1;
        }

        // Allocate the batch's thunk after the sections placed so far.
        offset = A::THUNK_ALIGNMENT.align_up(offset);
        let mut thunk = Thunk {
            thunk_idx: thunks.len() as i32,
            offset,
            symbols: Vec::new(),
        };

        // Collect the symbols that out-of-range branches in the batch need
        // routed through the new thunk.
        let thunk_symbols = Mutex::new(Vec::new());
        let batch = &members[b..c];
        let mut scanned: Vec<Vec<RangeExtensionRef>> = {
            let ctx = &*ctx;
            batch
                .par_iter()
                .map(|&isec_id| {
                    scan_relocations::<A>(ctx, isec_id, thunk.thunk_idx, &thunk_symbols)
                })
                .collect()
        };
        thunk.symbols = thunk_symbols.into_inner().unwrap();

        ensure!(
            thunk.size_bytes::<A>() < A::MAX_THUNK_SIZE,
            "Thunk at offset 0x{offset:x} grew to {} bytes, over the {} byte limit",
            thunk.size_bytes::<A>(),
            A::MAX_THUNK_SIZE,
        );
        offset += thunk.size_bytes::<A>();

        // Sort the symbol list so the output doesn't depend on how the scan
        // tasks interleaved, then hand out slots.
        thunk.symbols.sort_unstable_by_key(|&sym_id| {
            let sym = ctx.symbol(sym_id);
            (sym.file.map_or(u32::MAX, |f| ctx.file(f).priority), sym_id)
        });
        for (slot, &sym_id) in thunk.symbols.iter().enumerate() {
            let sym = ctx.symbol_mut(sym_id);
            // A symbol only gets enlisted after its claim flag's 0 -> 1
            // transition, and the flag is cleared together with the
            // registration on retirement.
            debug_assert_bail!(
                sym.thunk_idx == NO_THUNK,
                "Symbol {sym_id} was enlisted while still registered with thunk {}",
                sym.thunk_idx,
            );
            sym.thunk_idx = thunk.thunk_idx;
            sym.thunk_sym_idx = slot as i32;
        }

        // Slots are known now. Fill them in for the relocations that were
        // routed to this thunk.
        {
            let ctx = &*ctx;
            scanned
                .par_iter_mut()
                .zip(batch)
                .for_each(|(range_extension, &isec_id)| {
                    let isec = ctx.input_section(isec_id);
                    for (rel, extension) in isec.relocations.iter().zip(range_extension) {
                        if extension.thunk_idx == thunk.thunk_idx {
                            extension.sym_idx = ctx.symbol(rel.symbol).thunk_sym_idx;
                        }
                    }
                });
        }
        for (range_extension, &isec_id) in scanned.into_iter().zip(batch) {
            ctx.input_section_mut(isec_id).range_extension = range_extension;
        }

        thunks.push(thunk);
        b = c;
    }

    // The thunks that remain still hold registrations, but nothing is left
    // to enlist into them. Drop the registrations so the scratch state on
    // their symbols doesn't leak into other output sections.
    while a < thunks.len() {
        retire_thunk(ctx, &thunks[a]);
        a += 1;
    }

    let osec = ctx.output_section_mut(osec_id);
    osec.size = offset;
    osec.members = members;
    osec.thunks = thunks;

    if cfg!(debug_assertions) {
        crate::verification::verify_thunk_layout::<A>(ctx, osec_id)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aarch64::AArch64;
    use crate::alignment::Alignment;
    use crate::input_data::InputFile;
    use crate::value_flags::ValueFlags;

    fn simple_context(section_sizes: &[u64]) -> (Context, OutputSectionId, Vec<InputSectionId>) {
        let mut ctx = Context::new();
        let file = ctx.add_file(InputFile { priority: 1 });
        let osec = ctx.add_output_section(crate::section::OutputSection::new(0x10000));
        let sections = section_sizes
            .iter()
            .map(|&size| {
                ctx.add_input_section(InputSection::new(
                    file,
                    osec,
                    size,
                    Alignment::new(4).unwrap(),
                ))
            })
            .collect();
        (ctx, osec, sections)
    }

    #[test]
    fn oracle_rejects_unplaced_and_cross_section_targets() {
        let (mut ctx, _osec, sections) = simple_context(&[0x1000, 0x1000]);
        let other_osec = ctx.add_output_section(crate::section::OutputSection::new(0x900_0000));
        let file = ctx.add_file(InputFile { priority: 2 });
        let far_section = ctx.add_input_section(InputSection::new(
            file,
            other_osec,
            0x1000,
            Alignment::new(4).unwrap(),
        ));

        let local = ctx.add_symbol(Symbol::new(
            Some(file),
            Some(sections[1]),
            0,
            ValueFlags::empty(),
        ));
        let foreign = ctx.add_symbol(Symbol::new(
            Some(file),
            Some(far_section),
            0,
            ValueFlags::empty(),
        ));
        let rel = Relocation {
            r_offset: 0,
            r_type: object::elf::R_AARCH64_CALL26,
            symbol: local,
            addend: 0,
        };

        // Neither referring nor target section has been placed yet.
        let isec = ctx.input_section(sections[0]);
        assert!(!is_reachable::<AArch64>(
            &ctx,
            isec,
            ctx.symbol(local),
            &rel
        ));

        ctx.input_section_mut(sections[0]).offset = 0;
        ctx.input_section_mut(sections[1]).offset = 0x1000;
        ctx.input_section_mut(far_section).offset = 0;

        let isec = ctx.input_section(sections[0]);
        assert!(is_reachable::<AArch64>(&ctx, isec, ctx.symbol(local), &rel));

        // A different output section is never considered reachable, even
        // though the distance happens to be small.
        let rel = Relocation {
            symbol: foreign,
            ..rel
        };
        assert!(!is_reachable::<AArch64>(
            &ctx,
            isec,
            ctx.symbol(foreign),
            &rel
        ));
    }

    #[test]
    fn oracle_rejects_plt_targets() {
        let (mut ctx, _osec, sections) = simple_context(&[0x1000, 0x1000]);
        let file = ctx.add_file(InputFile { priority: 2 });
        let sym = ctx.add_symbol(Symbol::new(
            Some(file),
            Some(sections[1]),
            0,
            ValueFlags::PLT,
        ));
        ctx.input_section_mut(sections[0]).offset = 0;
        ctx.input_section_mut(sections[1]).offset = 0x1000;

        let rel = Relocation {
            r_offset: 0,
            r_type: object::elf::R_AARCH64_CALL26,
            symbol: sym,
            addend: 0,
        };
        let isec = ctx.input_section(sections[0]);
        assert!(!is_reachable::<AArch64>(&ctx, isec, ctx.symbol(sym), &rel));
    }

    #[test]
    fn oracle_distance_boundaries() {
        let (mut ctx, _osec, sections) = simple_context(&[4, 0x1000]);
        let file = ctx.add_file(InputFile { priority: 2 });
        ctx.input_section_mut(sections[0]).offset = 0;
        ctx.input_section_mut(sections[1]).offset = 4;

        let sym = ctx.add_symbol(Symbol::new(
            Some(file),
            Some(sections[1]),
            0,
            ValueFlags::empty(),
        ));

        // Forward reach is [P, P + MAX_BRANCH_DISTANCE). The symbol sits 4
        // bytes ahead of the relocated place, so an addend of distance - 4
        // puts the target exactly on the boundary.
        let max = AArch64::MAX_BRANCH_DISTANCE;
        let rel = |addend| Relocation {
            r_offset: 0,
            r_type: object::elf::R_AARCH64_CALL26,
            symbol: sym,
            addend,
        };
        let isec = ctx.input_section(sections[0]);
        assert!(is_reachable::<AArch64>(
            &ctx,
            isec,
            ctx.symbol(sym),
            &rel(max - 5)
        ));
        assert!(!is_reachable::<AArch64>(
            &ctx,
            isec,
            ctx.symbol(sym),
            &rel(max - 4)
        ));
        assert!(is_reachable::<AArch64>(
            &ctx,
            isec,
            ctx.symbol(sym),
            &rel(-max - 4)
        ));
        assert!(!is_reachable::<AArch64>(
            &ctx,
            isec,
            ctx.symbol(sym),
            &rel(-max - 5)
        ));
    }

    #[test]
    fn retiring_a_thunk_twice_is_harmless() {
        let (mut ctx, _osec, sections) = simple_context(&[0x1000]);
        let file = ctx.add_file(InputFile { priority: 2 });
        let sym = ctx.add_symbol(Symbol::new(
            Some(file),
            Some(sections[0]),
            0,
            ValueFlags::empty(),
        ));
        assert!(ctx.symbol(sym).claim_for_thunk());
        let thunk = Thunk {
            thunk_idx: 0,
            offset: 0,
            symbols: vec![sym],
        };
        ctx.symbol_mut(sym).thunk_idx = 0;
        ctx.symbol_mut(sym).thunk_sym_idx = 0;

        retire_thunk(&mut ctx, &thunk);
        assert_eq!(ctx.symbol(sym).thunk_idx, NO_THUNK);
        assert!(!ctx.symbol(sym).is_claimed_by_thunk());

        retire_thunk(&mut ctx, &thunk);
        assert_eq!(ctx.symbol(sym).thunk_idx, NO_THUNK);
        assert!(!ctx.symbol(sym).is_claimed_by_thunk());
    }
}
