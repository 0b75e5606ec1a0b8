use bitflags::bitflags;

bitflags! {
    /// Information about a symbol's value. This comes from the object that
    /// defined the symbol and from decisions already made by symbol
    /// resolution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ValueFlags: u8 {
        /// A PLT entry has been allocated for the symbol. Branches to it
        /// land on the PLT stub, not on the definition, so for layout
        /// purposes the symbol behaves like an out-of-section target.
        const PLT = 1 << 0;

        /// The symbol is a Thumb-mode function. Only set on ARM.
        const THUMB = 1 << 1;
    }
}

impl ValueFlags {
    #[must_use]
    pub fn has_plt(self) -> bool {
        self.contains(ValueFlags::PLT)
    }

    #[must_use]
    pub fn is_thumb(self) -> bool {
        self.contains(ValueFlags::THUMB)
    }
}
