use serde::{Deserialize, Serialize};
use std::fmt;

const EXHAUSTED: &str = "exhausted";

/// Per-chain backward scan position.
///
/// `Next(n)` means block `n` is the newest block not yet scanned. Serialized
/// as a decimal string, or `"exhausted"` once the deployment block has been
/// covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Cursor {
    Next(u64),
    Exhausted,
}

impl Cursor {
    /// Cursor for a chain whose newest block is `head`.
    pub fn at_head(head: u64, deployment_block: u64) -> Self {
        Self::Next(head).clamped(deployment_block)
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// A cursor below the scan floor has nothing left to scan.
    pub fn clamped(self, deployment_block: u64) -> Self {
        match self {
            Self::Next(block) if block < deployment_block => Self::Exhausted,
            other => other,
        }
    }

    /// Move to `next`, never forward. A scanner result newer than the current
    /// position is ignored.
    pub fn retreat_to(self, next: Cursor, deployment_block: u64) -> Self {
        let next = next.clamped(deployment_block);
        match (self, next) {
            (Self::Exhausted, _) | (_, Self::Exhausted) => Self::Exhausted,
            (Self::Next(current), Self::Next(candidate)) => Self::Next(current.min(candidate)),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next(block) => write!(f, "{}", block),
            Self::Exhausted => f.write_str(EXHAUSTED),
        }
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.to_string()
    }
}

impl TryFrom<String> for Cursor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == EXHAUSTED {
            return Ok(Self::Exhausted);
        }
        value
            .parse::<u64>()
            .map(Self::Next)
            .map_err(|e| format!("invalid cursor '{}': {}", value, e))
    }
}
