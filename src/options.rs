use serde::{Deserialize, Serialize};

/// The default CHIP-8 processor speed in hertz.
pub const DEFAULT_PROCESSOR_SPEED_HERTZ: u64 = 720;
/// The default CHIP-8 program start address within memory.
const DEFAULT_CHIP8_PROGRAM_START_ADDRESS: u16 = 0x200;

/// Start-up configuration shared by both emulator cores, `serde`-derived so it can be
/// deserialized from a config file or overridden piecemeal from CLI flags.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// How many CHIP-8 cycles to execute per second of wall-clock time.
    pub processor_speed_hertz: u64,
    /// Memory address at which CHIP-8 ROMs are loaded and execution begins.
    pub chip8_program_start_address: u16,
    /// When set, the Game Boy core emits one Game-Boy-Doctor-style log line per CPU
    /// instruction and overrides the PPU's LY register to a fixed value, matching the
    /// behaviour test ROM suites expect.
    pub debug_mode: bool,
}

impl Default for Options {
    /// Constructor that returns an [Options] instance using typical default settings.
    fn default() -> Self {
        Options {
            processor_speed_hertz: DEFAULT_PROCESSOR_SPEED_HERTZ,
            chip8_program_start_address: DEFAULT_CHIP8_PROGRAM_START_ADDRESS,
            debug_mode: false,
        }
    }
}
