use serde::{Deserialize, Serialize};

/// ARM7TDMI operating modes, as encoded in CPSR bits 4..0.
///
/// User and System share the same register bank; every other mode banks at
/// least r13/r14 and carries its own SPSR. See
/// [`RegisterBank`](super::register_bank::RegisterBank).
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum Mode {
    User = 0x10,
    Fiq = 0x11,
    Irq = 0x12,
    Supervisor = 0x13,
    Abort = 0x17,
    Undefined = 0x1B,
    System = 0x1F,
}

impl TryFrom<u32> for Mode {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value & 0b11111 {
            0x10 => Ok(Self::User),
            0x11 => Ok(Self::Fiq),
            0x12 => Ok(Self::Irq),
            0x13 => Ok(Self::Supervisor),
            0x17 => Ok(Self::Abort),
            0x1B => Ok(Self::Undefined),
            0x1F => Ok(Self::System),
            other => Err(other),
        }
    }
}

impl Mode {
    /// True for every mode that has its own SPSR.
    pub const fn has_spsr(self) -> bool {
        !matches!(self, Self::User | Self::System)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_encoding_roundtrip() {
        for mode in [
            Mode::User,
            Mode::Fiq,
            Mode::Irq,
            Mode::Supervisor,
            Mode::Abort,
            Mode::Undefined,
            Mode::System,
        ] {
            assert_eq!(Mode::try_from(mode as u32), Ok(mode));
        }
    }

    #[test]
    fn invalid_mode_bits_are_rejected() {
        assert_eq!(Mode::try_from(0), Err(0));
        assert_eq!(Mode::try_from(0b01010), Err(0b01010));
    }

    #[test]
    fn spsr_presence() {
        assert!(!Mode::User.has_spsr());
        assert!(!Mode::System.has_spsr());
        assert!(Mode::Irq.has_spsr());
        assert!(Mode::Fiq.has_spsr());
    }
}
