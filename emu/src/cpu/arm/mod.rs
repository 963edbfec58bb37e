pub mod alu;
pub mod instructions;
mod operations;

use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::{EmulatorError, InstructionMode};

use instructions::ArmInstruction;

/// A fetched ARM opcode together with its decoded form and condition field.
pub struct ArmModeOpcode {
    pub instruction: ArmInstruction,
    pub condition: Condition,
    pub raw: u32,
}

impl TryFrom<u32> for ArmModeOpcode {
    type Error = EmulatorError;

    fn try_from(op_code: u32) -> Result<Self, Self::Error> {
        let instruction = ArmInstruction::decode(op_code).ok_or(EmulatorError::Decode {
            mode: InstructionMode::Arm,
            opcode: op_code,
        })?;

        Ok(Self {
            instruction,
            condition: Condition::from(op_code.get_bits(28..=31) as u8),
            raw: op_code,
        })
    }
}
