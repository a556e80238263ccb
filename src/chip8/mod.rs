//! The CHIP-8 interpreter: a self-contained fetch-decode-execute VM operating on a flat 4KiB
//! memory space, a 64x32 boolean display, and a 16-key keypad.

mod display;
mod font;
mod instruction;
mod keystate;
mod memory;
mod processor;
mod stack;

pub use display::{Display, DISPLAY_HEIGHT, DISPLAY_WIDTH};
pub use keystate::KeyState;
pub use memory::Memory;
pub use processor::{Processor, StateSnapshot};
pub use stack::Stack;
