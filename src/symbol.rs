use crate::input_data::FileId;
use crate::section::InputSectionId;
use crate::value_flags::ValueFlags;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// Identifies a symbol. Symbols are numbered in the order their defining
/// files appear in link order, so sorting by `(file priority, SymbolId)`
/// gives a reproducible order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    pub(crate) fn from_usize(raw: usize) -> Self {
        SymbolId(u32::try_from(raw).expect("Symbol IDs overflowed 32 bits"))
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// No live trampoline registration. Used for both `thunk_idx` and
/// `thunk_sym_idx`.
pub(crate) const NO_THUNK: i32 = -1;

pub struct Symbol {
    /// The file that defined the symbol. `None` means the symbol is
    /// undefined; branches to it are left for relocation application to
    /// diagnose.
    pub(crate) file: Option<FileId>,

    /// The section the symbol is defined in. Absolute symbols have none.
    pub(crate) input_section: Option<InputSectionId>,

    /// Offset of the symbol within its defining section, or its absolute
    /// value if it has no section.
    pub(crate) value: u64,

    pub(crate) flags: ValueFlags,

    /// Whether the symbol is currently in some trampoline's symbol list.
    /// Claimed by whichever scan task gets there first, so that concurrent
    /// scans append each symbol at most once. Cleared when the trampoline is
    /// retired.
    claimed: AtomicBool,

    /// Which trampoline currently serves the symbol and the symbol's slot
    /// within it. `NO_THUNK` until the owning trampoline's slots are
    /// assigned, and again once it's retired.
    pub(crate) thunk_idx: i32,
    pub(crate) thunk_sym_idx: i32,
}

impl Symbol {
    pub fn new(
        file: Option<FileId>,
        input_section: Option<InputSectionId>,
        value: u64,
        flags: ValueFlags,
    ) -> Symbol {
        Symbol {
            file,
            input_section,
            value,
            flags,
            claimed: AtomicBool::new(false),
            thunk_idx: NO_THUNK,
            thunk_sym_idx: NO_THUNK,
        }
    }

    pub fn file(&self) -> Option<FileId> {
        self.file
    }

    pub fn input_section(&self) -> Option<InputSectionId> {
        self.input_section
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn flags(&self) -> ValueFlags {
        self.flags
    }

    /// Claims the symbol for the trampoline that's currently being filled.
    /// Returns true for exactly one caller until the claim is released.
    pub(crate) fn claim_for_thunk(&self) -> bool {
        !self.claimed.swap(true, Ordering::Relaxed)
    }

    pub(crate) fn release_thunk_claim(&self) {
        self.claimed.store(false, Ordering::Relaxed);
    }

    pub(crate) fn is_claimed_by_thunk(&self) -> bool {
        self.claimed.load(Ordering::Relaxed)
    }
}
