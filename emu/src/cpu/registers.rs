//! # Register File
//!
//! Sixteen 32-bit registers are visible at any time, though some indices
//! resolve to different physical registers depending on the mode (see
//! [`RegisterBank`](super::register_bank::RegisterBank)).
//!
//! ```text
//! ┌──────────┬──────────────────────────────────────────────────────────┐
//! │ Register │ Purpose                                                  │
//! ├──────────┼──────────────────────────────────────────────────────────┤
//! │ R0-R7    │ General purpose. Never banked.                           │
//! │ R8-R12   │ General purpose. Banked only in FIQ mode.                │
//! │ R13 (SP) │ Stack pointer by convention. Banked per exception mode.  │
//! │ R14 (LR) │ Link register (return address). Banked per mode.         │
//! │ R15 (PC) │ Program counter. On real hardware the 26-bit PC shares   │
//! │          │ R15 with the PSR bits; this core stores only the PC here │
//! │          │ and keeps the PSR in its own register.                   │
//! └──────────┴──────────────────────────────────────────────────────────┘
//! ```
//!
//! Reading R15 as an instruction operand returns the fetch address + 8
//! (prefetch); that adjustment lives in the operand helpers, not here.

/// Stack Pointer register index.
pub const REG_SP: usize = 0xD;

/// Link Register index (return address for subroutines).
pub const REG_LR: usize = 0xE;

/// Program Counter register index.
pub const REG_PROGRAM_COUNTER: u32 = 0xF;

#[derive(Default)]
pub struct Registers([u32; 16]);

impl Registers {
    pub fn program_counter(&self) -> usize {
        self.0[15].try_into().unwrap()
    }

    pub const fn set_program_counter(&mut self, new_value: u32) {
        self.0[15] = new_value;
    }

    pub fn advance_program_counter(&mut self, bytes: u32) {
        self.0[15] = self.0[15].wrapping_add(bytes);
    }

    pub fn set_register_at(&mut self, reg: usize, new_value: u32) {
        assert!(reg <= 15, "Invalid register index: {reg} (0x{reg:X})");
        self.0[reg] = new_value;
    }

    pub const fn register_at(&self, reg: usize) -> u32 {
        self.0[reg]
    }
}
