use crate::config::LINE_CAPACITY;

/// One complete inbound line, terminator stripped.
pub type Line = heapless::Vec<u8, LINE_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    #[error("Command too long")]
    TooLong,
}

/// Fixed-capacity accumulator for inbound command lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Line,
    /// Set after an overflow until the overlong line's terminator arrives.
    discarding: bool,
}

impl LineBuffer {
    pub const CAPACITY: usize = LINE_CAPACITY;

    pub fn new() -> Self {
        Self {
            buf: Line::new(),
            discarding: false,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Whether the rest of an overlong line is still being skipped.
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    /// Feed one byte.
    ///
    /// CR or LF completes the pending line and hands it out; a terminator
    /// with nothing pending is swallowed, so CRLF counts once. A byte that
    /// does not fit discards the whole line: `TooLong` is reported once and
    /// everything up to and including its terminator is dropped.
    pub fn push(&mut self, byte: u8) -> Result<Option<Line>, LineError> {
        if self.discarding {
            if matches!(byte, b'\r' | b'\n') {
                self.discarding = false;
            }
            return Ok(None);
        }

        match byte {
            b'\r' | b'\n' => {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                Ok(Some(core::mem::take(&mut self.buf)))
            }
            _ => {
                if self.buf.push(byte).is_err() {
                    self.buf.clear();
                    self.discarding = true;
                    return Err(LineError::TooLong);
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(
        buffer: &mut LineBuffer,
        bytes: &[u8],
    ) -> Vec<Result<Option<Line>, LineError>> {
        bytes.iter().map(|&b| buffer.push(b)).collect()
    }

    #[test]
    fn line_completes_on_lf() {
        let mut buffer = LineBuffer::new();
        let events = feed(&mut buffer, b"45,135\n");
        assert!(events[..6].iter().all(|e| *e == Ok(None)));
        assert_eq!(events[6].as_ref().unwrap().as_deref(), Some(&b"45,135"[..]));
        assert!(buffer.is_empty());
    }

    #[test]
    fn crlf_is_a_single_terminator() {
        let mut buffer = LineBuffer::new();
        let events = feed(&mut buffer, b"7\r\n");
        assert_eq!(events[1].as_ref().unwrap().as_deref(), Some(&b"7"[..]));
        assert_eq!(events[2], Ok(None));
    }

    #[test]
    fn bare_terminators_are_discarded() {
        let mut buffer = LineBuffer::new();
        assert!(feed(&mut buffer, b"\n\r\n\r").iter().all(|e| *e == Ok(None)));
    }

    #[test]
    fn full_capacity_line_is_accepted() {
        let mut buffer = LineBuffer::new();
        for _ in 0..LineBuffer::CAPACITY {
            assert_eq!(buffer.push(b'1'), Ok(None));
        }
        assert_eq!(buffer.len(), LineBuffer::CAPACITY);
        let line = buffer.push(b'\n').unwrap().unwrap();
        assert_eq!(line.len(), LineBuffer::CAPACITY);
    }

    #[test]
    fn overflow_discards_and_restarts() {
        let mut buffer = LineBuffer::new();
        for _ in 0..LineBuffer::CAPACITY {
            buffer.push(b'a').unwrap();
        }
        assert_eq!(buffer.push(b'a'), Err(LineError::TooLong));
        assert!(buffer.is_empty());
        assert!(buffer.is_discarding());

        let events = feed(&mut buffer, b"12\n34\n");
        assert!(events[..3].iter().all(|e| *e == Ok(None)));
        assert!(!buffer.is_discarding());
        assert_eq!(events[5].as_ref().unwrap().as_deref(), Some(&b"34"[..]));
    }

    #[test]
    fn overlong_line_reports_once() {
        let mut buffer = LineBuffer::new();
        let events = feed(&mut buffer, &[b'9'; 45]);
        let errors = events.iter().filter(|e| e.is_err()).count();
        assert_eq!(errors, 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn crlf_after_overflow_ends_discard_once() {
        let mut buffer = LineBuffer::new();
        feed(&mut buffer, &[b'1'; 21]);
        // CR ends the discard, LF is then a bare terminator
        let events = feed(&mut buffer, b"\r\n5\n");
        assert_eq!(events[3].as_ref().unwrap().as_deref(), Some(&b"5"[..]));
    }
}
