use crate::alignment::Alignment;
use crate::input_data::FileId;
use crate::symbol::SymbolId;
use crate::thunks::Thunk;

/// Identifies an input section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InputSectionId(u32);

impl InputSectionId {
    pub(crate) fn from_usize(raw: usize) -> Self {
        InputSectionId(u32::try_from(raw).expect("Input section IDs overflowed 32 bits"))
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Identifies an output section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputSectionId(u32);

impl OutputSectionId {
    pub(crate) fn from_usize(raw: usize) -> Self {
        OutputSectionId(u32::try_from(raw).expect("Output section IDs overflowed 32 bits"))
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Offset value meaning a section hasn't been placed yet. Reads as -1 when
/// cast to i64, which the layout sweep's signed comparisons depend on.
pub(crate) const OFFSET_UNASSIGNED: u64 = u64::MAX;

/// A relocation, already decoded by the host linker. For REL-style sections
/// the addend has been read out of the section contents.
#[derive(Debug, Clone, Copy)]
pub struct Relocation {
    /// Offset of the relocated place within its section.
    pub r_offset: u64,

    /// Raw ELF relocation type.
    pub r_type: u32,

    /// The referenced symbol.
    pub symbol: SymbolId,

    pub addend: i64,
}

/// Where a branch relocation was routed: which trampoline serves it and
/// which slot within that trampoline holds its target. Left unset for
/// branches that reach directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeExtensionRef {
    pub thunk_idx: i32,
    pub sym_idx: i32,
}

impl Default for RangeExtensionRef {
    fn default() -> Self {
        RangeExtensionRef {
            thunk_idx: -1,
            sym_idx: -1,
        }
    }
}

impl RangeExtensionRef {
    /// Whether the relocation goes via a trampoline.
    pub fn has_thunk(self) -> bool {
        self.thunk_idx >= 0
    }
}

pub struct InputSection {
    pub file: FileId,
    pub output_section: OutputSectionId,

    /// Section size in bytes.
    pub size: u64,

    pub alignment: Alignment,

    /// Relocations in this section, in file order.
    pub relocations: Vec<Relocation>,

    /// Offset within the output section. `OFFSET_UNASSIGNED` until the
    /// layout sweep places the section.
    pub(crate) offset: u64,

    /// Routing decisions for `relocations`, index for index. Empty until the
    /// sweep has scanned the section.
    pub(crate) range_extension: Vec<RangeExtensionRef>,
}

impl InputSection {
    pub fn new(
        file: FileId,
        output_section: OutputSectionId,
        size: u64,
        alignment: Alignment,
    ) -> InputSection {
        InputSection {
            file,
            output_section,
            size,
            alignment,
            relocations: Vec::new(),
            offset: OFFSET_UNASSIGNED,
            range_extension: Vec::new(),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_placed(&self) -> bool {
        self.offset != OFFSET_UNASSIGNED
    }

    pub fn range_extension(&self) -> &[RangeExtensionRef] {
        &self.range_extension
    }
}

pub struct OutputSection {
    /// Tentative base address of the section. Branch distances are relative,
    /// so the sweep's decisions hold when the final address differs.
    pub address: u64,

    /// Input sections in output order.
    pub(crate) members: Vec<InputSectionId>,

    /// Trampolines placed by the layout sweep, ordered by offset.
    pub(crate) thunks: Vec<Thunk>,

    /// Total size in bytes, covering members and trampolines. Set when the
    /// sweep finishes.
    pub(crate) size: u64,
}

impl OutputSection {
    pub fn new(address: u64) -> OutputSection {
        OutputSection {
            address,
            members: Vec::new(),
            thunks: Vec::new(),
            size: 0,
        }
    }

    pub fn members(&self) -> &[InputSectionId] {
        &self.members
    }

    pub fn thunks(&self) -> &[Thunk] {
        &self.thunks
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}
