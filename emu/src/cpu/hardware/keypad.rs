use serde::{Deserialize, Serialize};

/// Button bit positions in KEYINPUT. The register is active-low: a pressed
/// button reads 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GbaButton {
    A = 1 << 0,
    B = 1 << 1,
    Select = 1 << 2,
    Start = 1 << 3,
    Right = 1 << 4,
    Left = 1 << 5,
    Up = 1 << 6,
    Down = 1 << 7,
    R = 1 << 8,
    L = 1 << 9,
}

#[derive(Serialize, Deserialize)]
pub struct Keypad {
    /// KEYINPUT, 0x04000130. Written directly by the host.
    pub key_input: u16,

    /// KEYCNT, 0x04000132. Stored only; keypad IRQs are not evaluated.
    pub key_interrupt_control: u16,
}

impl Default for Keypad {
    fn default() -> Self {
        Self {
            // All ten buttons released.
            key_input: 0x03FF,
            key_interrupt_control: 0,
        }
    }
}

impl Keypad {
    pub fn set_button(&mut self, button: GbaButton, pressed: bool) {
        if pressed {
            self.key_input &= !(button as u16);
        } else {
            self.key_input |= button as u16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_are_active_low() {
        let mut keypad = Keypad::default();
        assert_eq!(keypad.key_input, 0x03FF);

        keypad.set_button(GbaButton::A, true);
        keypad.set_button(GbaButton::Down, true);
        assert_eq!(keypad.key_input, 0x03FF & !0x81);

        keypad.set_button(GbaButton::A, false);
        assert_eq!(keypad.key_input, 0x03FF & !0x80);
    }
}
