/// In ARM state every instruction is conditionally executed according to the
/// CPSR condition flags and the instruction's condition field (bits 31:28).
/// If the flags fulfil the encoded condition the instruction runs, otherwise
/// it is skipped (still consuming one cycle).
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Condition {
    /// Z set (equal).
    EQ = 0x0,

    /// Z clear (not equal).
    NE = 0x1,

    /// C set (unsigned higher or same).
    CS = 0x2,

    /// C clear (unsigned lower).
    CC = 0x3,

    /// N set (negative).
    MI = 0x4,

    /// N clear (positive or zero).
    PL = 0x5,

    /// V set (overflow).
    VS = 0x6,

    /// V clear (no overflow).
    VC = 0x7,

    /// C set and Z clear (unsigned higher).
    HI = 0x8,

    /// C clear or Z set (unsigned lower or same).
    LS = 0x9,

    /// N equals V (greater or equal).
    GE = 0xA,

    /// N not equal to V (less than).
    LT = 0xB,

    /// Z clear and N equals V (greater than).
    GT = 0xC,

    /// Z set or N not equal to V (less than or equal).
    LE = 0xD,

    /// Always executed.
    AL = 0xE,

    /// Reserved (never executes on ARMv4).
    NV = 0xF,
}

impl From<u8> for Condition {
    fn from(value: u8) -> Self {
        match value {
            0x0 => Self::EQ,
            0x1 => Self::NE,
            0x2 => Self::CS,
            0x3 => Self::CC,
            0x4 => Self::MI,
            0x5 => Self::PL,
            0x6 => Self::VS,
            0x7 => Self::VC,
            0x8 => Self::HI,
            0x9 => Self::LS,
            0xA => Self::GE,
            0xB => Self::LT,
            0xC => Self::GT,
            0xD => Self::LE,
            0xE => Self::AL,
            0xF => Self::NV,
            _ => unreachable!(),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AL => Ok(()),
            Self::NV => f.write_str("NV"),
            _ => write!(f, "{self:?}"),
        }
    }
}
