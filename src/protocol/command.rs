//! Command grammar.
//!
//! ```text
//! command := int | int ',' int
//! int     := ['-'] digit+
//! ```
//!
//! Whitespace around the whole line and around each integer is ignored.
//! Values are not clamped here; the axis does that when applying them.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Single-integer form kept for older hosts: moves yaw only.
    Yaw(i32),
    PitchYaw { pitch: i32, yaw: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    #[error("Empty line")]
    Blank,
    #[error("Comment line")]
    Comment,
    #[error("Line is not valid text")]
    NotText,
    #[error("Field is not an integer")]
    BadInteger,
    #[error("Too many fields")]
    TooManyFields,
}

impl Command {
    /// Parse one line with its terminator already stripped.
    pub fn parse(line: &[u8]) -> Result<Self, CommandError> {
        let text = core::str::from_utf8(line).map_err(|_| CommandError::NotText)?;
        Self::try_from(text)
    }
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let text = value.trim();
        if text.is_empty() {
            return Err(CommandError::Blank);
        }
        // '#' lines are our own diagnostics echoed back
        if text.starts_with('#') {
            return Err(CommandError::Comment);
        }

        let mut fields = text.split(',');
        let first = fields.next().unwrap_or_default();
        match (fields.next(), fields.next()) {
            (None, _) => Ok(Command::Yaw(parse_int(first)?)),
            (Some(second), None) => Ok(Command::PitchYaw {
                pitch: parse_int(first)?,
                yaw: parse_int(second)?,
            }),
            (Some(_), Some(_)) => Err(CommandError::TooManyFields),
        }
    }
}

/// Strict decimal integer; saturates instead of overflowing.
fn parse_int(field: &str) -> Result<i32, CommandError> {
    let field = field.trim();
    let (negative, digits) = match field.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, field),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::BadInteger);
    }

    let magnitude = digits.bytes().fold(0i32, |acc, b| {
        acc.saturating_mul(10).saturating_add(i32::from(b - b'0'))
    });
    Ok(if negative { -magnitude } else { magnitude })
}
