/// Number of CPU M-cycle ticks that make up one full frame. Each CPU tick is paired with two
/// PPU dot-ticks, giving 70,224 PPU dots per frame (matching the DMG's 154 scanlines of 456
/// dots each), distinct from the 69,905-cycle constant used to approximate timing elsewhere;
/// see the design notes for why the literal per-scanline figure was chosen here instead.
pub const CPU_TICKS_PER_FRAME: u32 = 17_556;
