pub mod instructions;
mod operations;

use crate::cpu::{EmulatorError, InstructionMode};

use instructions::ThumbInstruction;

/// A fetched Thumb opcode together with its decoded form.
pub struct ThumbModeOpcode {
    pub instruction: ThumbInstruction,
    pub raw: u16,
}

impl TryFrom<u16> for ThumbModeOpcode {
    type Error = EmulatorError;

    fn try_from(op_code: u16) -> Result<Self, Self::Error> {
        let instruction = ThumbInstruction::decode(op_code).ok_or(EmulatorError::Decode {
            mode: InstructionMode::Thumb,
            opcode: op_code as u32,
        })?;

        Ok(Self {
            instruction,
            raw: op_code,
        })
    }
}
