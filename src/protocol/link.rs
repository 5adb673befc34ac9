/// Byte-stream side of the serial link as seen by the control loop.
pub trait SerialLink {
    /// Next received byte if one is already buffered. Never waits.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue one line for the host; the link appends the terminator.
    /// Best effort: a line that cannot be queued is dropped whole.
    fn write_line(&mut self, line: &str);
}
