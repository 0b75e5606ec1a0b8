use crate::arch::Arch;
use crate::arch::Architecture;

pub struct Arm;

impl Arch for Arm {
    const KIND: Architecture = Architecture::Arm;

    // Thumb B.W has a 24 bit immediate scaled by 2, so it reaches PC ± 16
    // MiB. ARM-mode branches reach twice as far, but we use the Thumb limit
    // for both rather than tracking the instruction set per branch site.
    const MAX_BRANCH_DISTANCE: i64 = 1 << 24;

    // Each entry opens with a Thumb entry point (bx pc; nop) that drops into
    // ARM state, then materialises the target address in ip with a movw/movt
    // pair and ends in bx: 2 + 2 + 4 + 4 + 4 bytes. The two entry points let
    // callers in either instruction set use the same trampoline.
    const THUNK_STUB_SIZE: u64 = 16;

    fn is_branch_relocation(r_type: u32) -> bool {
        matches!(
            r_type,
            object::elf::R_ARM_JUMP24
                | object::elf::R_ARM_THM_JUMP24
                | object::elf::R_ARM_CALL
                | object::elf::R_ARM_THM_PC22
        )
    }

    // BL can be fixed up to BLX, but plain B instructions have no
    // mode-switching form, so an interworking B must go via a trampoline
    // even when the destination is in range.
    fn branch_requires_interworking(r_type: u32, target_is_thumb: bool) -> bool {
        (r_type == object::elf::R_ARM_THM_JUMP24 && !target_is_thumb)
            || (r_type == object::elf::R_ARM_JUMP24 && target_is_thumb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interworking_only_affects_plain_jumps() {
        assert!(Arm::branch_requires_interworking(
            object::elf::R_ARM_JUMP24,
            true
        ));
        assert!(Arm::branch_requires_interworking(
            object::elf::R_ARM_THM_JUMP24,
            false
        ));
        assert!(!Arm::branch_requires_interworking(
            object::elf::R_ARM_JUMP24,
            false
        ));
        assert!(!Arm::branch_requires_interworking(
            object::elf::R_ARM_THM_JUMP24,
            true
        ));
        assert!(!Arm::branch_requires_interworking(
            object::elf::R_ARM_CALL,
            true
        ));
        assert!(!Arm::branch_requires_interworking(
            object::elf::R_ARM_THM_PC22,
            false
        ));
    }
}
