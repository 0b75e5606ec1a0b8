//! Range extension thunk layout for an ELF linker.
//!
//! The host linker describes one or more output sections, their input
//! sections, symbols and relocations, then calls
//! [`create_range_extension_thunks`] per output section. The sweep assigns
//! every input section its offset, synthesises the trampolines that
//! out-of-range branches need, and records which trampoline slot serves each
//! branch relocation. The module docs in `thunks.rs` cover how placement
//! works.

pub(crate) mod aarch64;
pub(crate) mod alignment;
pub(crate) mod arch;
pub(crate) mod arm;
pub mod error;
pub(crate) mod input_data;
pub(crate) mod ppc64;
pub(crate) mod section;
pub(crate) mod symbol;
#[cfg(not(feature = "single-threaded"))]
#[path = "threading_rayon.rs"]
pub(crate) mod threading;
#[cfg(feature = "single-threaded")]
#[path = "threading_none.rs"]
pub(crate) mod threading;
pub(crate) mod thunks;
pub(crate) mod value_flags;
pub(crate) mod verification;

pub use crate::aarch64::AArch64;
pub use crate::alignment::Alignment;
pub use crate::arch::Arch;
pub use crate::arch::Architecture;
pub use crate::arm::Arm;
pub use crate::input_data::FileId;
pub use crate::input_data::InputFile;
pub use crate::ppc64::PPC64;
pub use crate::section::InputSection;
pub use crate::section::InputSectionId;
pub use crate::section::OutputSection;
pub use crate::section::OutputSectionId;
pub use crate::section::RangeExtensionRef;
pub use crate::section::Relocation;
pub use crate::symbol::Symbol;
pub use crate::symbol::SymbolId;
pub use crate::thunks::Thunk;
pub use crate::thunks::create_range_extension_thunks;
pub use crate::value_flags::ValueFlags;
pub use crate::verification::verify_thunk_layout;

/// Everything the thunk layout needs to know about the link: input files,
/// symbols and sections, addressed by index rather than by reference so that
/// symbols, sections and thunks can refer to each other freely.
#[derive(Default)]
pub struct Context {
    files: Vec<InputFile>,
    symbols: Vec<Symbol>,
    input_sections: Vec<InputSection>,
    output_sections: Vec<OutputSection>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    pub fn add_file(&mut self, file: InputFile) -> FileId {
        let id = FileId::from_usize(self.files.len());
        self.files.push(file);
        id
    }

    pub fn add_symbol(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId::from_usize(self.symbols.len());
        self.symbols.push(symbol);
        id
    }

    pub fn add_output_section(&mut self, section: OutputSection) -> OutputSectionId {
        let id = OutputSectionId::from_usize(self.output_sections.len());
        self.output_sections.push(section);
        id
    }

    /// Adds an input section and appends it to its output section's member
    /// list. Members are laid out in the order they're added.
    pub fn add_input_section(&mut self, section: InputSection) -> InputSectionId {
        let id = InputSectionId::from_usize(self.input_sections.len());
        self.output_sections[section.output_section.as_usize()]
            .members
            .push(id);
        self.input_sections.push(section);
        id
    }

    /// Appends a relocation to an input section. Relocation order within a
    /// section is preserved; routing entries are produced index for index.
    pub fn add_relocation(&mut self, section: InputSectionId, relocation: Relocation) {
        self.input_sections[section.as_usize()]
            .relocations
            .push(relocation);
    }

    pub fn file(&self, id: FileId) -> &InputFile {
        &self.files[id.as_usize()]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.as_usize()]
    }

    pub(crate) fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.as_usize()]
    }

    pub(crate) fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn input_section(&self, id: InputSectionId) -> &InputSection {
        &self.input_sections[id.as_usize()]
    }

    pub(crate) fn input_section_mut(&mut self, id: InputSectionId) -> &mut InputSection {
        &mut self.input_sections[id.as_usize()]
    }

    pub fn output_section(&self, id: OutputSectionId) -> &OutputSection {
        &self.output_sections[id.as_usize()]
    }

    pub(crate) fn output_section_mut(&mut self, id: OutputSectionId) -> &mut OutputSection {
        &mut self.output_sections[id.as_usize()]
    }
}
