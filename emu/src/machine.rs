//! # Machine — the assembled Archimedes
//!
//! Owns the [`Bus`] (which owns RAM, ROM, IOC and VIDC) and the [`Arm3`]
//! core, and exposes the frame-at-a-time surface the frontend drives:
//! reset, run one frame, deliver input, hand back video.
//!
//! The strict order within a frame is: input drain, IOC tick, CPU steps
//! (which sample pending interrupts between retirements), VIDC scan-out,
//! `video_refresh`. Nothing in here blocks; once `run_frame` is entered it
//! runs to completion or until the instruction budget is spent.

use std::io;
use std::path::Path;

use logger::log;

use crate::bus::Bus;
use crate::cpu::arm3::Arm3;

/// 8 MHz machine driven at 50 Hz.
pub const CYCLES_PER_FRAME: u32 = 8_000_000 / 50;

/// Instructions retired per frame unless configured otherwise.
pub const DEFAULT_INSTRUCTION_BUDGET: usize = 160_000;

/// Keyboard device id, as the frontend numbers devices.
pub const DEVICE_KEYBOARD: u32 = 3;

/// Escape key id; pressing it stops emulation.
pub const KEY_ESCAPE: u32 = 27;

/// Frontend callbacks the core calls back into.
///
/// The `frame` slice passed to `video_refresh` is little-endian RGB565 and
/// only valid for the duration of the call.
pub trait Host {
    fn poll_input(&mut self);
    fn input_state(&mut self, port: u32, device: u32, index: u32, id: u32) -> i16;
    fn video_refresh(&mut self, frame: &[u16], width: u32, height: u32, pitch_bytes: usize);
    fn message(&mut self, text: &str, frames: u32);
}

/// Main RAM fitted to the machine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RamSize {
    FourMiB,
    #[default]
    EightMiB,
    SixteenMiB,
}

impl RamSize {
    pub const fn bytes(self) -> usize {
        match self {
            Self::FourMiB => 4 * 1024 * 1024,
            Self::EightMiB => 8 * 1024 * 1024,
            Self::SixteenMiB => 16 * 1024 * 1024,
        }
    }
}

pub struct MachineConfig {
    pub ram_size: RamSize,
    pub rom_base: u32,
    pub instruction_budget: usize,
    pub display_width: u32,
    pub display_height: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ram_size: RamSize::default(),
            rom_base: crate::bus::ROM_DEFAULT_BASE,
            instruction_budget: DEFAULT_INSTRUCTION_BUDGET,
            display_width: 640,
            display_height: 480,
        }
    }
}

pub struct Machine {
    pub cpu: Arm3,
    pub bus: Bus,

    frame: Vec<u16>,
    instruction_budget: usize,
    halt_reported: bool,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            cpu: Arm3::new(),
            bus: Bus::new(
                config.ram_size.bytes(),
                config.rom_base,
                config.display_width,
                config.display_height,
            ),
            frame: Vec::new(),
            instruction_budget: config.instruction_budget,
            halt_reported: false,
        }
    }

    /// Loads a firmware image from disk. On failure the error is logged and
    /// returned; the machine stays usable with a zero-filled ROM (fetches
    /// will fault at run time instead).
    pub fn load_rom(&mut self, path: &Path) -> io::Result<usize> {
        match std::fs::read(path) {
            Ok(data) => Ok(self.bus.load_rom(&data)),
            Err(e) => {
                log(format!("failed to load ROM {}: {e}", path.display()));
                Err(e)
            }
        }
    }

    pub fn load_rom_bytes(&mut self, data: &[u8]) -> usize {
        self.bus.load_rom(data)
    }

    /// Back to the power-on state: boot alias live, CPU at the reset
    /// vector. RAM and the loaded ROM survive.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset();
        self.halt_reported = false;
    }

    /// Advances the machine by one 50 Hz frame.
    pub fn run_frame(&mut self, host: &mut dyn Host) {
        host.poll_input();
        if host.input_state(0, DEVICE_KEYBOARD, 0, KEY_ESCAPE) != 0 {
            log("escape pressed, stopping emulation");
            host.message("Emulation stopped", 240);
            self.cpu.running = false;
            self.halt_reported = true;
        }

        self.bus.ioc.update_timers(CYCLES_PER_FRAME);

        for _ in 0..self.instruction_budget {
            if !self.cpu.running {
                break;
            }
            self.cpu.step(&mut self.bus);
        }

        if !self.cpu.running && !self.halt_reported {
            self.halt_reported = true;
            host.message("Emulation halted: invalid fetch", 240);
        }

        self.bus.render_frame(&mut self.frame);
        let width = self.bus.vidc.frame_width;
        let height = self.bus.vidc.frame_height;
        host.video_refresh(&self.frame, width, height, width as usize * 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MEMC_BASE;
    use crate::cpu::cpu_modes::Mode;
    use crate::cpu::registers::REG_LR;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct TestHost {
        frames: usize,
        last_dims: (u32, u32, usize),
        messages: Vec<String>,
        escape_down: bool,
    }

    impl Host for TestHost {
        fn poll_input(&mut self) {}

        fn input_state(&mut self, _port: u32, device: u32, _index: u32, id: u32) -> i16 {
            i16::from(device == DEVICE_KEYBOARD && id == KEY_ESCAPE && self.escape_down)
        }

        fn video_refresh(&mut self, frame: &[u16], width: u32, height: u32, pitch_bytes: usize) {
            assert_eq!(frame.len(), (width * height) as usize);
            self.frames += 1;
            self.last_dims = (width, height, pitch_bytes);
        }

        fn message(&mut self, text: &str, _frames: u32) {
            self.messages.push(text.to_string());
        }
    }

    fn rom_words(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn small_machine() -> Machine {
        Machine::new(MachineConfig {
            instruction_budget: 16,
            ..MachineConfig::default()
        })
    }

    #[test]
    fn run_frame_delivers_video() {
        let mut machine = small_machine();
        // An idle loop: B .
        machine.load_rom_bytes(&rom_words(&[0xEAFF_FFFE]));

        let mut host = TestHost::default();
        machine.run_frame(&mut host);

        assert_eq!(host.frames, 1);
        assert_eq!(host.last_dims, (640, 480, 640 * 2));
        assert!(machine.bus.ioc.vfly_asserted());
    }

    #[test]
    fn invalid_fetch_halts_frame_and_reports_once() {
        // No ROM: the very first fetch returns the sentinel.
        let mut machine = small_machine();
        let mut host = TestHost::default();

        machine.run_frame(&mut host);
        machine.run_frame(&mut host);

        assert!(!machine.cpu.running);
        assert_eq!(
            host.messages,
            vec!["Emulation halted: invalid fetch".to_string()]
        );
        // Video still comes out every frame.
        assert_eq!(host.frames, 2);
    }

    #[test]
    fn reset_recovers_from_halt() {
        let mut machine = small_machine();
        let mut host = TestHost::default();
        machine.run_frame(&mut host);
        assert!(!machine.cpu.running);

        machine.load_rom_bytes(&rom_words(&[0xEAFF_FFFE]));
        machine.reset();
        assert!(machine.cpu.running);
        assert!(machine.bus.boot_mode());

        machine.run_frame(&mut host);
        assert!(machine.cpu.running);
    }

    #[test]
    fn escape_stops_emulation() {
        let mut machine = small_machine();
        machine.load_rom_bytes(&rom_words(&[0xEAFF_FFFE]));

        let mut host = TestHost {
            escape_down: true,
            ..TestHost::default()
        };
        machine.run_frame(&mut host);

        assert!(!machine.cpu.running);
        assert_eq!(host.messages, vec!["Emulation stopped".to_string()]);
    }

    #[test]
    fn timer_irq_reaches_the_cpu() {
        let mut machine = small_machine();
        machine.load_rom_bytes(&rom_words(&[0xE3A0_0000]));

        // Timer 0 wraps on the first tick; unmask it and open CPSR.I.
        machine.bus.ioc.write_register(5, 1000);
        machine.bus.ioc.write_register(9, 1 << 5);
        machine.cpu.cpsr.set_irq_disable(false);

        let mut host = TestHost::default();
        machine.run_frame(&mut host);

        // The first step after the tick vectored to 0x18.
        assert_eq!(machine.cpu.cpsr.mode(), Mode::Irq);
        assert!(machine.cpu.cpsr.irq_disable());
        assert_eq!(machine.cpu.registers.register_at(REG_LR), 4);
        assert!(machine.bus.ioc.irq_request_a & (1 << 5) != 0);
    }

    #[test]
    fn boot_alias_exit_scenario() {
        let mut machine = small_machine();
        machine.load_rom_bytes(&rom_words(&[0x1234_5678]));

        assert_eq!(machine.bus.read_word(0), 0x1234_5678);

        machine.bus.write_word(MEMC_BASE, 0);

        assert_eq!(machine.bus.read_word(0), 0);
    }

    #[test]
    fn derived_dimensions_flow_to_video_refresh() {
        let mut machine = small_machine();
        machine.load_rom_bytes(&rom_words(&[0xEAFF_FFFE]));

        // Program a 320x256 mode.
        machine.bus.vidc.write_register(263, 0);
        machine.bus.vidc.write_register(264, 320);
        machine.bus.vidc.write_register(270, 0);
        machine.bus.vidc.write_register(271, 256);

        let mut host = TestHost::default();
        machine.run_frame(&mut host);

        assert_eq!(host.last_dims, (320, 256, 320 * 2));
    }
}
