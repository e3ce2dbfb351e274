//! # Archimedes Emulation Core
//!
//! This crate contains all Acorn Archimedes hardware emulation - no UI
//! code. A frontend owns one [`machine::Machine`], feeds it a firmware
//! image, and drives it one 50 Hz frame at a time.
//!
//! ## Module Overview
//!
//! | Module      | Description                                     |
//! |-------------|-------------------------------------------------|
//! | [`machine`] | Top-level system and host interface (start here)|
//! | [`cpu`]     | ARMv2/v3 processor and instruction set          |
//! | [`bus`]     | 26-bit address decoder: RAM, ROM, MMIO          |
//!
//! ## Quick Start
//!
//! ```ignore
//! use emu::machine::{Machine, MachineConfig};
//!
//! let mut machine = Machine::new(MachineConfig::default());
//! machine.load_rom(std::path::Path::new("riscos.rom"))?;
//! machine.reset();
//! loop { machine.run_frame(&mut host); }
//! ```
//!
//! ## Architecture
//!
//! See [`machine`] for the frame loop and [`cpu`] for processor details.

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
mod bitwise;

#[allow(clippy::missing_panics_doc)]
#[allow(clippy::cast_lossless)]
pub mod bus;

pub mod cpu;
pub mod machine;
