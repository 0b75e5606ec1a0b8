/// Identifies an input file. IDs are assigned in link order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(u32);

impl FileId {
    pub(crate) fn from_usize(raw: usize) -> Self {
        FileId(u32::try_from(raw).expect("File IDs overflowed 32 bits"))
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "file-{}", self.0)
    }
}

/// An input object file. Only the properties that section layout cares about
/// are represented; parsing and symbol resolution happen before we're called.
#[derive(Debug)]
pub struct InputFile {
    /// Position of the file in link order. Used to give sorts involving
    /// symbols from multiple files a reproducible order.
    pub priority: u32,
}
