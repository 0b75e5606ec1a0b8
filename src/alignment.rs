use crate::error::Result;
use anyhow::bail;
use std::fmt::Display;

/// An alignment. Always a power of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct Alignment {
    pub(crate) exponent: u8,
}

/// The maximum alignment that we support.
pub(crate) const MAX: Alignment = Alignment { exponent: 15 };

impl Alignment {
    pub fn new(raw: u64) -> Result<Self> {
        if !raw.is_power_of_two() {
            bail!("Invalid alignment 0x{raw:x}");
        }
        let exponent = raw.trailing_zeros();
        if exponent > u32::from(MAX.exponent) {
            bail!("Unsupported alignment 0x{raw:x}");
        }
        Ok(Alignment {
            exponent: exponent as u8,
        })
    }

    pub fn value(self) -> u64 {
        1 << self.exponent
    }

    pub fn mask(self) -> u64 {
        self.value() - 1
    }

    pub fn align_up(self, value: u64) -> u64 {
        value.next_multiple_of(self.value())
    }

    pub fn align_down(self, value: u64) -> u64 {
        value & !self.mask()
    }
}

impl Display for Alignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.value(), f)
    }
}

#[test]
fn test_align_up() {
    assert_eq!(Alignment::new(16).unwrap().align_up(16), 16);
    assert_eq!(Alignment::new(16).unwrap().align_up(15), 16);
    assert_eq!(Alignment::new(16).unwrap().align_up(1), 16);
    assert_eq!(Alignment::new(16).unwrap().align_up(0), 0);
    assert_eq!(Alignment::new(16).unwrap().align_up(31), 32);
}

#[test]
fn test_align_down() {
    assert_eq!(Alignment::new(16).unwrap().align_down(16), 16);
    assert_eq!(Alignment::new(16).unwrap().align_down(17), 16);
    assert_eq!(Alignment::new(16).unwrap().align_down(32), 32);
    assert_eq!(Alignment::new(16).unwrap().align_down(0), 0);
    assert_eq!(Alignment::new(16).unwrap().align_down(1), 0);
}

#[test]
fn test_invalid_alignment() {
    assert!(Alignment::new(0).is_err());
    assert!(Alignment::new(3).is_err());
    assert!(Alignment::new(1 << 20).is_err());
}
