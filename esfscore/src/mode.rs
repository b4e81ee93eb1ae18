//! On-disk mode bitfield.

use bitflags::bitflags;

bitflags! {
    /// The 16-bit mode bitfield stored verbatim in every file header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeFlags: u16 {
        const USER_READ     = 0x0001;
        const USER_WRITE    = 0x0002;
        const USER_DELETE   = 0x0004;
        const USER_EXECUTE  = 0x0008;
        const OTHER_READ    = 0x0010;
        const OTHER_WRITE   = 0x0020;
        const OTHER_DELETE  = 0x0040;
        const OTHER_EXECUTE = 0x0080;
        const ENCRYPTED     = 0x0100;
        const FACTORY_VAL   = 0x0200;
        const EXTENDED_ACL  = 0x0400;
    }
}

impl ModeFlags {
    pub fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }

    pub fn is_factory(self) -> bool {
        self.contains(Self::FACTORY_VAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u16() {
        let mode = ModeFlags::USER_READ | ModeFlags::ENCRYPTED | ModeFlags::FACTORY_VAL;
        let bits = mode.bits();
        assert_eq!(ModeFlags::from_bits_truncate(bits), mode);
    }

    #[test]
    fn unrecognized_bits_are_preserved_by_truncate_only_when_expected() {
        // EXTENDED_ACL (0x0400) is the highest recognized bit; anything
        // above it is genuinely unknown and dropped by from_bits_truncate,
        // unused bits are reserved, not rejected.
        let raw: u16 = 0x8000 | ModeFlags::USER_READ.bits();
        let mode = ModeFlags::from_bits_truncate(raw);
        assert_eq!(mode, ModeFlags::USER_READ);
    }
}
