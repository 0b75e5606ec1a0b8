use crate::arch::Arch;
use crate::arch::Architecture;

pub struct PPC64;

impl Arch for PPC64 {
    const KIND: Architecture = Architecture::PPC64;

    // Branches have a 24 bit immediate scaled by 4, so they reach PC ± 32 MiB.
    const MAX_BRANCH_DISTANCE: i64 = 1 << 25;

    // addis r12, r2, ha(target); addi r12, r12, lo(target); mtctr r12; bctr
    const THUNK_STUB_SIZE: u64 = 16;

    fn is_branch_relocation(r_type: u32) -> bool {
        r_type == object::elf::R_PPC64_REL24
    }
}
