/// Byte-oriented transport consumed by the framing layer.
///
/// SBMP is transport-agnostic: a serial line, a pipe or a socket all work,
/// as long as single bytes can be pushed out. The engine calls `tx_byte`
/// synchronously, once per byte; if it blocks, the engine blocks.
pub trait Interface {
    /// Send one byte on the wire. Returns `false` if the byte was lost.
    fn tx_byte(&self, byte: u8) -> bool;
}
