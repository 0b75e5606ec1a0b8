use crate::arch::Arch;
use crate::arch::Architecture;

pub struct AArch64;

impl Arch for AArch64 {
    const KIND: Architecture = Architecture::AArch64;

    // B and BL have a 26 bit immediate that's scaled by 4, so they reach
    // PC ± 128 MiB.
    const MAX_BRANCH_DISTANCE: i64 = 1 << 27;

    // adrp x16, page(target); add x16, x16, lo12(target); br x16
    const THUNK_STUB_SIZE: u64 = 12;

    fn is_branch_relocation(r_type: u32) -> bool {
        r_type == object::elf::R_AARCH64_JUMP26 || r_type == object::elf::R_AARCH64_CALL26
    }
}
