//! Banked register storage for the privileged modes.
//!
//! FIQ shadows r8..r14; IRQ, Supervisor, Abort and Undefined each shadow
//! r13/r14. The `*_old` slots keep the User/System values of the banked
//! registers while another bank is live. Each privileged mode also holds one
//! SPSR, loaded into the live `spsr` view on mode entry.

use serde::{Deserialize, Serialize};

use crate::cpu::psr::Psr;

#[derive(Default, Serialize, Deserialize)]
pub struct RegisterBank {
    // User/System values parked while another bank is live.
    pub r8_old: u32,
    pub r9_old: u32,
    pub r10_old: u32,
    pub r11_old: u32,
    pub r12_old: u32,
    pub r13_old: u32,
    pub r14_old: u32,

    // FIQ bank (r8..r14).
    pub r8_fiq: u32,
    pub r9_fiq: u32,
    pub r10_fiq: u32,
    pub r11_fiq: u32,
    pub r12_fiq: u32,
    pub r13_fiq: u32,
    pub r14_fiq: u32,

    pub r13_svc: u32,
    pub r14_svc: u32,

    pub r13_abt: u32,
    pub r14_abt: u32,

    pub r13_irq: u32,
    pub r14_irq: u32,

    pub r13_und: u32,
    pub r14_und: u32,

    pub spsr_fiq: Psr,
    pub spsr_svc: Psr,
    pub spsr_abt: Psr,
    pub spsr_irq: Psr,
    pub spsr_und: Psr,
}
