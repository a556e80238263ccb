use crate::error::EngineError;
use crate::gameboy::bus::Bus;
use crate::gameboy::cpu::Cpu;
use crate::gameboy::ppu::{Ppu, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::options::Options;
use std::fmt::Write as _;
use std::io::Write as _;
use tracing::info;

/// Game-Boy-Doctor initial register state, matched on start-up whenever no boot ROM is
/// supplied so that blargg-style test ROM logs can be diffed directly.
const INITIAL_A: u8 = 0x01;
const INITIAL_F: u8 = 0xB0;
const INITIAL_B: u8 = 0x00;
const INITIAL_C: u8 = 0x13;
const INITIAL_D: u8 = 0x00;
const INITIAL_E: u8 = 0xD8;
const INITIAL_H: u8 = 0x01;
const INITIAL_L: u8 = 0x4D;
const INITIAL_SP: u16 = 0xFFFE;
const INITIAL_PC: u16 = 0x0100;

/// The Game Boy embedding surface: owns the bus, CPU and PPU, drives them together one frame
/// at a time, and optionally emits Game-Boy-Doctor-style debug log lines.
pub struct Engine {
    bus: Bus,
    cpu: Cpu,
    ppu: Ppu,
    debug_mode: bool,
    debug_log: Option<Box<dyn std::io::Write>>,
}

impl Engine {
    /// Constructs an [Engine] with the cartridge loaded and registers reset to the
    /// Game-Boy-Doctor initial state (used whenever no boot ROM is mounted).
    pub fn initialize_cartridge(cartridge: &[u8], options: &Options) -> Self {
        let mut bus = Bus::new(options.debug_mode);
        bus.initialize_cartridge(cartridge);
        let mut cpu = Cpu::new();
        cpu.registers.a = INITIAL_A;
        cpu.registers.f = INITIAL_F;
        cpu.registers.b = INITIAL_B;
        cpu.registers.c = INITIAL_C;
        cpu.registers.d = INITIAL_D;
        cpu.registers.e = INITIAL_E;
        cpu.registers.h = INITIAL_H;
        cpu.registers.l = INITIAL_L;
        cpu.registers.sp = INITIAL_SP;
        cpu.set_pc(INITIAL_PC);

        info!(debug_mode = options.debug_mode, "gameboy engine initialized");
        Self {
            bus,
            cpu,
            ppu: Ppu::new(),
            debug_mode: options.debug_mode,
            debug_log: None,
        }
    }

    /// Mounts a boot ROM, which takes over execution from address 0x0000 until it writes to
    /// 0xFF50; the Game-Boy-Doctor register preset is not applied in this case, since the
    /// boot ROM itself is responsible for establishing post-boot register state.
    pub fn initialize_boot_rom(&mut self, boot_rom: &[u8]) {
        self.bus.initialize_boot_rom(boot_rom);
        self.cpu.set_pc(0x0000);
    }

    /// Directs subsequent per-instruction debug log lines at `writer`, Game-Boy-Doctor style.
    pub fn set_debug_log(&mut self, writer: Box<dyn std::io::Write>) {
        self.debug_log = Some(writer);
    }

    fn emit_debug_log_line(&mut self, r: &crate::gameboy::registers::Registers, pcmem: [u8; 4]) {
        if self.debug_log.is_none() {
            return;
        }
        let mut line = String::new();
        let _ = write!(
            line,
            "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} SP:{:04X} PC:{:04X} PCMEM:{:02X},{:02X},{:02X},{:02X}\n",
            r.a, r.f, r.b, r.c, r.d, r.e, r.h, r.l, r.sp, r.pc, pcmem[0], pcmem[1], pcmem[2], pcmem[3]
        );
        if let Some(writer) = self.debug_log.as_mut() {
            let _ = writer.write_all(line.as_bytes());
        }
    }

    /// Advances the emulator by one CPU M-cycle and two PPU dot-ticks, returning a completed
    /// frame buffer if the PPU finished one during this tick. The debug log line, when enabled,
    /// is emitted once per executed instruction rather than once per M-cycle: the register and
    /// PC-relative memory snapshot is taken before ticking the CPU, and written out only if the
    /// CPU actually fetched a new opcode on this tick (as opposed to an idle or HALT cycle).
    fn tick(&mut self) -> Result<Option<[[u8; SCREEN_WIDTH]; SCREEN_HEIGHT]>, EngineError> {
        let snapshot = self.debug_mode.then(|| {
            let r = self.cpu.registers.clone();
            let pcmem = [
                self.bus.read(crate::gameboy::bus::Requester::Core, r.pc),
                self.bus.read(crate::gameboy::bus::Requester::Core, r.pc.wrapping_add(1)),
                self.bus.read(crate::gameboy::bus::Requester::Core, r.pc.wrapping_add(2)),
                self.bus.read(crate::gameboy::bus::Requester::Core, r.pc.wrapping_add(3)),
            ];
            (r, pcmem)
        });

        let fetched = self.cpu.tick(&mut self.bus)?;
        if fetched {
            if let Some((r, pcmem)) = snapshot {
                self.emit_debug_log_line(&r, pcmem);
            }
        }
        self.ppu.tick(&mut self.bus);
        self.ppu.tick(&mut self.bus);
        if self.ppu.take_frame_ready() {
            Ok(Some(*self.ppu.screen()))
        } else {
            Ok(None)
        }
    }

    /// Runs CPU/PPU ticks until a complete frame has been produced, and returns it.
    pub fn fetch_next_frame(&mut self) -> Result<[[u8; SCREEN_WIDTH]; SCREEN_HEIGHT], EngineError> {
        loop {
            if let Some(frame) = self.tick()? {
                return Ok(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_register_state_matches_game_boy_doctor() {
        let engine = Engine::initialize_cartridge(&[0x00; 0x200], &Options::default());
        assert_eq!(engine.cpu.registers.a, INITIAL_A);
        assert_eq!(engine.cpu.registers.sp, INITIAL_SP);
        assert_eq!(engine.cpu.registers.pc, INITIAL_PC);
    }

    #[test]
    fn test_boot_rom_overrides_entry_point() {
        let mut engine = Engine::initialize_cartridge(&[0x00; 0x200], &Options::default());
        engine.initialize_boot_rom(&[0x00; 0x100]);
        assert_eq!(engine.cpu.registers.pc, 0x0000);
    }
}
