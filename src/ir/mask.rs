//! Operand Component Masks
//!
//! An operand touches a subset of the four lanes of its parameter. The mask
//! algebra is small: lanes combine with `|`, a mask can be shifted towards
//! `w` when a packed source lands at a nonzero lane offset, and
//! `float_count` reports how many lanes are selected.

use bitflags::bitflags;

bitflags! {
    /// Subset of the `{x, y, z, w}` lanes touched by an operand.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Mask: u8 {
        const X = 0b0001;
        const Y = 0b0010;
        const Z = 0b0100;
        const W = 0b1000;
        /// All four lanes; also used for "every lane the parameter has".
        const ALL = 0b1111;
    }
}

impl Mask {
    /// Mask selecting the first `width` lanes.
    ///
    /// `from_width(2)` is `X | Y`; `from_width(4)` is [`Mask::ALL`].
    #[must_use]
    pub fn from_width(width: u32) -> Mask {
        debug_assert!((1..=4).contains(&width), "lane width out of range: {width}");
        Mask::from_bits_truncate((1u8 << width) - 1)
    }

    /// Number of selected lanes.
    #[must_use]
    pub fn float_count(self) -> u32 {
        self.bits().count_ones()
    }

    /// Shift every selected lane `offset` places towards `w`.
    ///
    /// This is the rewrite applied when a packed varying places a source at
    /// a nonzero lane offset inside its float4 slot. Shifting a mask past
    /// lane `w` is a programmer error.
    #[must_use]
    pub fn shifted_left(self, offset: u32) -> Mask {
        let bits = self.bits() << offset;
        debug_assert!(
            bits & !Mask::ALL.bits() == 0,
            "mask {self:?} shifted by {offset} leaves the four-lane range"
        );
        Mask::from_bits_truncate(bits)
    }

    /// Lane index of the lowest selected lane (0 for `x`, 3 for `w`).
    #[must_use]
    pub fn first_lane(self) -> u32 {
        debug_assert!(!self.is_empty());
        self.bits().trailing_zeros()
    }

    /// True when the selected lanes form one contiguous run.
    ///
    /// Write operands must satisfy this; `x|z` is rejected while `y|z` and
    /// `w` alone are accepted.
    #[must_use]
    pub fn is_contiguous(self) -> bool {
        if self.is_empty() {
            return false;
        }
        let normalized = self.bits() >> self.bits().trailing_zeros();
        (normalized & (normalized + 1)) == 0
    }

    /// Swizzle suffix for source emission (`"xyz"`, `"w"`, …).
    #[must_use]
    pub fn swizzle(self) -> &'static str {
        match self.bits() {
            0b0001 => "x",
            0b0010 => "y",
            0b0100 => "z",
            0b1000 => "w",
            0b0011 => "xy",
            0b0110 => "yz",
            0b1100 => "zw",
            0b0111 => "xyz",
            0b1110 => "yzw",
            0b1111 => "xyzw",
            0b0101 => "xz",
            0b1001 => "xw",
            0b1010 => "yw",
            0b1011 => "xyw",
            0b1101 => "xzw",
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_width_selects_leading_lanes() {
        assert_eq!(Mask::from_width(1), Mask::X);
        assert_eq!(Mask::from_width(2), Mask::X | Mask::Y);
        assert_eq!(Mask::from_width(3), Mask::X | Mask::Y | Mask::Z);
        assert_eq!(Mask::from_width(4), Mask::ALL);
    }

    #[test]
    fn float_count_is_popcount() {
        assert_eq!(Mask::ALL.float_count(), 4);
        assert_eq!((Mask::X | Mask::W).float_count(), 2);
        assert_eq!(Mask::Z.float_count(), 1);
    }

    #[test]
    fn shift_moves_lanes_towards_w() {
        assert_eq!((Mask::X | Mask::Y).shifted_left(2), Mask::Z | Mask::W);
        assert_eq!(Mask::X.shifted_left(3), Mask::W);
        assert_eq!(Mask::X.shifted_left(0), Mask::X);
    }

    #[test]
    fn contiguity() {
        assert!((Mask::X | Mask::Y | Mask::Z).is_contiguous());
        assert!((Mask::Y | Mask::Z).is_contiguous());
        assert!(Mask::W.is_contiguous());
        assert!(!(Mask::X | Mask::Z).is_contiguous());
        assert!(!(Mask::X | Mask::W).is_contiguous());
        assert!(!Mask::empty().is_contiguous());
    }

    #[test]
    fn first_lane_offsets() {
        assert_eq!(Mask::X.first_lane(), 0);
        assert_eq!((Mask::Z | Mask::W).first_lane(), 2);
        assert_eq!(Mask::W.first_lane(), 3);
    }
}
