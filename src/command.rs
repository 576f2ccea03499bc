//! Textual command grammar of the control channels.
//!
//! A command is `<op> <id> <arg1> <arg2>`, whitespace separated. Parsing is
//! deliberately permissive:
//!
//! - missing trailing arguments read as zero (`"r 3"` is `"r 3 0 0"`);
//! - extra fields are ignored;
//! - a field that is present but not an unsigned decimal, or an op that is
//!   not a single character, makes the whole command a no-op.
//!
//! Unknown op characters still parse; the dispatcher validates the id first
//! and then ignores them.

use arrayvec::ArrayVec;

/// Operation selected by the first field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `i`: create / export.
    Init,
    /// `r`: refresh the read cache (or select for read).
    Read,
    /// `w`: set value (or duty cycle and period).
    Write,
    /// `f`: free.
    Free,
    /// Any other character. Accepted and ignored.
    Unknown(char),
}

impl From<char> for Op {
    fn from(c: char) -> Self {
        match c {
            'i' => Self::Init,
            'r' => Self::Read,
            'w' => Self::Write,
            'f' => Self::Free,
            other => Self::Unknown(other),
        }
    }
}

/// One parsed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub op: Op,
    pub id: u32,
    /// Direction or value for lines; duty cycle for PWM.
    pub arg1: u32,
    /// Recipient or poll mask (or initial level) for lines; period for PWM.
    pub arg2: u32,
}

impl Command {
    /// Parses one command. `None` means the input is absorbed silently.
    pub fn parse(input: &str) -> Option<Self> {
        let fields: ArrayVec<&str, 4> = input.split_whitespace().take(4).collect();

        let mut chars = fields.first()?.chars();
        let op = chars.next()?;
        if chars.next().is_some() {
            return None;
        }

        let id: u32 = fields.get(1)?.parse().ok()?;
        let arg = |index: usize| -> Option<u32> {
            match fields.get(index) {
                Some(field) => field.parse().ok(),
                None => Some(0),
            }
        };

        Some(Self {
            op: op.into(),
            id,
            arg1: arg(2)?,
            arg2: arg(3)?,
        })
    }

    /// Parses raw bytes; non UTF-8 input is absorbed like any other
    /// malformed command. Trailing NULs are tolerated.
    pub fn parse_bytes(bytes: &[u8]) -> Option<Self> {
        let text = core::str::from_utf8(bytes).ok()?;
        Self::parse(text.trim_end_matches('\0'))
    }
}
