//! The barrel shifter and the NZCV arithmetic helpers shared by the ARM and
//! Thumb executors.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// The four shift operations of the operand-2 stage.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl From<u32> for ShiftKind {
    fn from(op_code: u32) -> Self {
        match op_code & 0b11 {
            0b00 => Self::Lsl,
            0b01 => Self::Lsr,
            0b10 => Self::Asr,
            0b11 => Self::Ror,
            _ => unreachable!(),
        }
    }
}

impl std::fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lsl => f.write_str("LSL"),
            Self::Lsr => f.write_str("LSR"),
            Self::Asr => f.write_str("ASR"),
            Self::Ror => f.write_str("ROR"),
        }
    }
}

/// NZCV output of one ALU operation.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub sign: bool,
    pub zero: bool,
    pub carry: bool,
    pub overflow: bool,
}

/// Shift `value` by `amount`, producing the shifted value and the carry-out.
///
/// `by_immediate` distinguishes the immediate-amount encodings from
/// register-specified amounts, because the two differ in their zero cases:
/// a register amount of 0 leaves both value and carry untouched, while the
/// immediate encodings repurpose 0 as LSR #32 / ASR #32 / RRX.
///
/// A `None` carry means "leave the flag as it was".
pub fn barrel_shifter(
    kind: ShiftKind,
    value: u32,
    amount: u32,
    by_immediate: bool,
    carry_in: bool,
) -> (u32, Option<bool>) {
    if !by_immediate && amount == 0 {
        return (value, None);
    }

    match kind {
        ShiftKind::Lsl => match amount {
            0 => (value, None),
            1..=31 => (value << amount, Some((value << (amount - 1)).get_bit(31))),
            32 => (0, Some(value.get_bit(0))),
            _ => (0, Some(false)),
        },
        ShiftKind::Lsr => match amount {
            // LSR #0 encodes LSR #32.
            0 | 32 => (0, Some(value.get_bit(31))),
            1..=31 => (value >> amount, Some((value >> (amount - 1)).get_bit(0))),
            _ => (0, Some(false)),
        },
        ShiftKind::Asr => match amount {
            1..=31 => (
                ((value as i32) >> amount) as u32,
                Some((((value as i32) >> (amount - 1)) as u32).get_bit(0)),
            ),
            // ASR #0 encodes ASR #32: the sign bit fills the whole word.
            _ => {
                let sign = value.get_bit(31);
                (if sign { u32::MAX } else { 0 }, Some(sign))
            }
        },
        ShiftKind::Ror => {
            if by_immediate && amount == 0 {
                // ROR #0 encodes RRX.
                let result = ((carry_in as u32) << 31) | (value >> 1);
                (result, Some(value.get_bit(0)))
            } else {
                let result = value.rotate_right(amount & 31);
                (result, Some(result.get_bit(31)))
            }
        }
    }
}

fn nz(result: u32) -> (bool, bool) {
    (result.get_bit(31), result == 0)
}

pub fn add_flags(op1: u32, op2: u32) -> ArithmeticOpResult {
    let result = op1.wrapping_add(op2);
    let (sign, zero) = nz(result);

    ArithmeticOpResult {
        result,
        sign,
        zero,
        carry: (op1 as u64 + op2 as u64) > u32::MAX as u64,
        overflow: ((op1 ^ result) & (op2 ^ result)).get_bit(31),
    }
}

pub fn adc_flags(op1: u32, op2: u32, carry_in: bool) -> ArithmeticOpResult {
    let carry_in = carry_in as u32;
    let result = op1.wrapping_add(op2).wrapping_add(carry_in);
    let (sign, zero) = nz(result);

    ArithmeticOpResult {
        result,
        sign,
        zero,
        carry: (op1 as u64 + op2 as u64 + carry_in as u64) > u32::MAX as u64,
        overflow: ((op1 ^ result) & (op2 ^ result)).get_bit(31),
    }
}

pub fn sub_flags(op1: u32, op2: u32) -> ArithmeticOpResult {
    let result = op1.wrapping_sub(op2);
    let (sign, zero) = nz(result);

    ArithmeticOpResult {
        result,
        sign,
        zero,
        // C acts as "no borrow" on subtraction.
        carry: op1 >= op2,
        overflow: ((op1 ^ op2) & (op1 ^ result)).get_bit(31),
    }
}

pub fn sbc_flags(op1: u32, op2: u32, carry_in: bool) -> ArithmeticOpResult {
    let borrow = !carry_in as u32;
    let result = op1.wrapping_sub(op2).wrapping_sub(borrow);
    let (sign, zero) = nz(result);

    ArithmeticOpResult {
        result,
        sign,
        zero,
        carry: (op1 as u64) >= (op2 as u64 + borrow as u64),
        overflow: ((op1 ^ op2) & (op1 ^ result)).get_bit(31),
    }
}

/// Array-multiplier cycle count: the number of 8-bit multiplier chunks that
/// are neither an all-zero nor an all-one sign prefix, clamped to 1..=4.
pub fn multiplier_cycles(multiplier: u32) -> u64 {
    if multiplier.get_bits(8..=31) == 0 || multiplier.get_bits(8..=31) == 0xFF_FFFF {
        1
    } else if multiplier.get_bits(16..=31) == 0 || multiplier.get_bits(16..=31) == 0xFFFF {
        2
    } else if multiplier.get_bits(24..=31) == 0 || multiplier.get_bits(24..=31) == 0xFF {
        3
    } else {
        4
    }
}
