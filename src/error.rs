use crate::chip8::StateSnapshot;
use std::collections::HashMap;
use std::error;
use std::fmt;

/// Error detail for the CHIP-8 engine, bubbled up through [ChipolataError].
#[derive(Debug, PartialEq)]
pub enum ErrorDetail {
    /// An unrecognised opcode was read from memory
    UnknownInstruction { opcode: u16 },
    /// One or more operands fall outside expected ranges and cannot be safely used.
    /// The HashMap field holds the name of each potential faulty operand and its value
    OperandsOutOfBounds { operands: HashMap<String, usize> },
    /// An attempt was made to pop an item off the CHIP-8 call stack while it is empty
    PopEmptyStack,
    /// An attempt was made to push an item on to the CHIP-8 call stack while it is full
    PushFullStack,
    /// An attempt was made to read/write from an address outside the addressable range
    MemoryAddressOutOfBounds { address: u16 },
    /// A key ordinal was referenced that is outside the valid CHIP-8 keypad range (0x0 to 0xF)
    InvalidKey { key: u8 },
}

impl error::Error for ErrorDetail {}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDetail::UnknownInstruction { opcode } => {
                write!(f, "an unrecognised opcode {:#06X} was decoded", opcode)
            }
            ErrorDetail::OperandsOutOfBounds { operands } => {
                write!(f, "an opcode contains invalid operands: {:?}", operands)
            }
            ErrorDetail::PopEmptyStack => {
                write!(f, "an attempt was made to pop the stack while empty")
            }
            ErrorDetail::PushFullStack => {
                write!(f, "an attempt was made to push to the stack while full")
            }
            ErrorDetail::MemoryAddressOutOfBounds { address } => {
                write!(f, "invalid memory address {:#06X} was accessed", address)
            }
            ErrorDetail::InvalidKey { key } => {
                write!(f, "invalid key {} was specified", key)
            }
        }
    }
}

/// Error struct used to bubble up CHIP-8 errors to the hosting application.  Wraps the
/// more specific [ErrorDetail] error enum, and provides processor state context at the
/// point of failure.
#[derive(Debug, PartialEq)]
pub struct ChipolataError {
    pub state_snapshot_dump: StateSnapshot,
    pub inner_error: ErrorDetail,
}

impl error::Error for ChipolataError {}

impl fmt::Display for ChipolataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "an error occurred on cycle {}, with program_counter {:#06X}: ",
            self.state_snapshot_dump.cycles, self.state_snapshot_dump.program_counter
        )?;
        self.inner_error.fmt(f)
    }
}

/// Error detail for the Game Boy engine, bubbled up through [EngineError].
#[derive(Debug, PartialEq)]
pub enum EngineErrorDetail {
    /// An unsupported or unimplemented SM83 opcode was decoded (including the permanently
    /// fatal STOP instruction and the documented illegal-opcode holes in the map)
    UnsupportedOpcode { opcode: u8, prefixed: bool },
    /// A write targeted the cartridge ROM region; no memory bank controller is implemented
    CartridgeWrite { address: u16 },
    /// The window rendering path was reached; windows are not implemented
    WindowRenderingUnsupported,
    /// The background scroll register SCX held an out-of-range value during a pixel-discard
    /// computation (should never happen, since SCX mod 8 is always taken)
    InvalidScrollState { scx: u8 },
}

impl error::Error for EngineErrorDetail {}

impl fmt::Display for EngineErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineErrorDetail::UnsupportedOpcode { opcode, prefixed } => {
                write!(
                    f,
                    "unsupported opcode {:#04X} (prefixed: {})",
                    opcode, prefixed
                )
            }
            EngineErrorDetail::CartridgeWrite { address } => {
                write!(f, "write to cartridge ROM at {:#06X}", address)
            }
            EngineErrorDetail::WindowRenderingUnsupported => {
                write!(f, "window rendering was requested but is not supported")
            }
            EngineErrorDetail::InvalidScrollState { scx } => {
                write!(f, "invalid SCX value {:#04X} during pixel discard", scx)
            }
        }
    }
}

/// Error struct used to bubble up Game Boy engine errors to the hosting application.
#[derive(Debug, PartialEq)]
pub struct EngineError {
    pub program_counter: u16,
    pub inner_error: EngineErrorDetail,
}

impl error::Error for EngineError {}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine error at PC {:#06X}: ", self.program_counter)?;
        self.inner_error.fmt(f)
    }
}
