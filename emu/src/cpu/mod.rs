//! # ARMv2/v3 CPU Emulation
//!
//! The Archimedes core is a 26-bit ARM: 16 registers visible at a time,
//! condition codes on every instruction, and PC sharing R15 with the PSR
//! on real silicon (kept separate here, see [`arm3`]).
//!
//! ## How a frame executes
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ 1. Machine ticks the IOC (timers, VFLY)                        │
//! │ 2. Arm3::step samples pending FIQ/IRQ against CPSR masks       │
//! │ 3. Fetch at PC & 0x03FF_FFFC through the Bus                   │
//! │ 4. Decode (arm::instructions), test condition, execute         │
//! │ 5. Repeat up to the per-frame instruction budget               │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`arm3`] - CPU struct: step loop, exception entry, mode switching
//! - [`registers`] - register file
//! - [`register_bank`] - banked registers for exception modes
//! - [`psr`] - program status register (flags, mode, I/F bits)
//! - [`condition`] - condition codes
//! - [`cpu_modes`] - operating modes
//! - [`arm`] - instruction decode and execution
//! - [`hardware`] - memory-mapped peripherals (IOC, VIDC)

pub mod arm;

#[allow(clippy::cast_lossless)]
#[allow(clippy::cast_possible_truncation)]
pub mod arm3;
pub mod condition;
pub mod cpu_modes;

#[allow(clippy::cast_possible_truncation)]
pub mod flags;

#[allow(clippy::cast_possible_truncation)]
pub mod hardware;
pub mod psr;
pub mod register_bank;
pub mod registers;
