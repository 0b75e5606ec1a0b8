use crate::alignment::Alignment;
use crate::error::Result;
use anyhow::bail;
use object::elf::EM_AARCH64;
use object::elf::EM_ARM;
use object::elf::EM_PPC64;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    AArch64,
    Arm,
    PPC64,
}

impl TryFrom<u16> for Architecture {
    type Error = crate::error::Error;

    fn try_from(arch: u16) -> Result<Self, Self::Error> {
        match arch {
            EM_AARCH64 => Ok(Self::AArch64),
            EM_ARM => Ok(Self::Arm),
            EM_PPC64 => Ok(Self::PPC64),
            _ => bail!("Unsupported architecture: 0x{:x}", arch),
        }
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arch = match self {
            Architecture::AArch64 => "aarch64",
            Architecture::Arm => "arm",
            Architecture::PPC64 => "ppc64",
        };
        write!(f, "{arch}")
    }
}

/// Per-architecture branch and trampoline parameters.
///
/// Direct branches on these architectures encode their target as a scaled
/// immediate, so they can only reach a limited distance from the program
/// counter. Everything the thunk layout needs to know about an architecture
/// comes through this trait.
pub trait Arch {
    const KIND: Architecture;

    /// Half-range of a direct branch in bytes. A branch at address `p` can
    /// reach targets in `[p - MAX_BRANCH_DISTANCE, p + MAX_BRANCH_DISTANCE)`.
    const MAX_BRANCH_DISTANCE: i64;

    /// How much code we lay out between two consecutive trampoline groups.
    /// Keeping this well under the branch range leaves room for sections
    /// placed ahead of the current batch.
    const THUNK_BATCH_SIZE: i64 = Self::MAX_BRANCH_DISTANCE / 10;

    /// Upper bound on the size of a single trampoline group. Exceeding this
    /// means the batch size is misconfigured or the input is pathological.
    const MAX_THUNK_SIZE: u64 = 102_400;

    /// Size in bytes of one trampoline entry.
    const THUNK_STUB_SIZE: u64;

    /// Trampolines hold instructions, so they get instruction alignment.
    const THUNK_ALIGNMENT: Alignment = Alignment { exponent: 2 };

    /// Whether the relocation is a direct call or jump that may need to be
    /// routed through a trampoline.
    fn is_branch_relocation(r_type: u32) -> bool;

    /// Whether a branch with the supplied relocation type needs a trampoline
    /// to switch instruction set, regardless of distance. Only meaningful on
    /// ARM, where plain B instructions cannot change processor mode.
    fn branch_requires_interworking(_r_type: u32, _target_is_thumb: bool) -> bool {
        false
    }
}
